//! Helper functions for parsing ELF files

use object::elf;
use object::read::elf::{FileHeader, ProgramHeader, Sym};
use object::read::Result;

pub type ELFReaderType = elf::FileHeader32<object::Endianness>;
pub type Segment = elf::ProgramHeader32<object::Endianness>;

/// Parses the ELF header at the start of `data`
pub fn parse_elf_header(data: &[u8]) -> Result<&ELFReaderType> {
    ELFReaderType::parse(data)
}

/// Returns the program entry address
pub fn get_elf_entry(elf_reader: &ELFReaderType) -> Result<u32> {
    let endian = get_elf_endian(elf_reader)?;
    Ok(elf_reader.e_entry(endian))
}

/// Returns the endianness
pub fn get_elf_endian(elf_reader: &ELFReaderType) -> Result<object::Endianness> {
    elf_reader.endian()
}

/// Returns the machine type
pub fn get_elf_machine(elf_reader: &ELFReaderType) -> Result<u16> {
    Ok(elf_reader.e_machine(get_elf_endian(elf_reader)?))
}

/// Returns the loadable segments
pub fn get_elf_segments(elf_reader: &ELFReaderType, elf_data: &[u8]) -> Result<Vec<Segment>> {
    let endian = get_elf_endian(elf_reader)?;
    Ok(elf_reader
        .program_headers(endian, elf_data)?
        .iter()
        .filter(|segment| segment.p_type(endian) == elf::PT_LOAD)
        .copied()
        .collect())
}

/// Returns the value of a named symbol from the static symbol table
pub fn find_elf_symbol(
    elf_reader: &ELFReaderType,
    elf_data: &[u8],
    name: &str,
) -> Result<Option<u32>> {
    let endian = get_elf_endian(elf_reader)?;
    let sections = elf_reader.sections(endian, elf_data)?;
    let symbols = sections.symbols(endian, elf_data, elf::SHT_SYMTAB)?;
    for symbol in symbols.iter() {
        if symbols.symbol_name(endian, symbol)? == name.as_bytes() {
            return Ok(Some(symbol.st_value(endian)));
        }
    }
    Ok(None)
}
