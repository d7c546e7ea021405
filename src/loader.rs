//! Utility functions for putting a program image into memory

use std::fs;
use std::path::Path;

use object::read::elf::ProgramHeader;
use tracing::{debug, info};

use crate::elf_helper::*;
use crate::error::LoadError;
use crate::memory::StorageInterface;

/// What the loader learned about an image
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadedImage {
    /// ELF entry point; `None` for hex images
    pub entry: Option<u32>,
    /// Address of the `tohost` symbol, if the image has one
    pub tohost: Option<u32>,
    /// Bytes written to memory
    pub bytes: usize,
}

/// Loads a hex or ELF file, picked by the ELF magic
pub fn load_image(
    mem: &mut impl StorageInterface,
    path: &Path,
    hex_base: u32,
) -> Result<LoadedImage, LoadError> {
    let data = fs::read(path).map_err(|e| LoadError::FileReadError(path.to_path_buf(), e))?;
    if data.starts_with(&object::elf::ELFMAG) {
        load_elf(mem, path, &data)
    } else {
        let text = String::from_utf8_lossy(&data);
        let bytes = load_hex(mem, &text, hex_base)?;
        info!(
            "Loaded hex image {}: {bytes} bytes, {} pages mapped",
            path.display(),
            mem.mmu().allocated_pages()
        );
        Ok(LoadedImage { entry: None, tohost: None, bytes })
    }
}

/// Loads a `$readmemh`-style word stream.
///
/// Whitespace separated 32-bit hex words, `//` and `#` line comments,
/// `_` digit separators, and `@<word index>` address directives.
/// Returns the number of bytes written.
pub fn load_hex(
    mem: &mut impl StorageInterface,
    text: &str,
    base: u32,
) -> Result<usize, LoadError> {
    let mut index: u32 = 0;
    let mut bytes = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.split("//").next().unwrap_or("");
        let line = line.split('#').next().unwrap_or("");

        for token in line.split_whitespace() {
            let invalid = || LoadError::InvalidHexToken { line: line_no + 1, token: token.to_string() };

            if let Some(addr) = token.strip_prefix('@') {
                index = parse_hex_word(addr).ok_or_else(invalid)?;
                continue;
            }

            let word = parse_hex_word(token).ok_or_else(invalid)?;
            let address = index
                .checked_mul(4)
                .and_then(|offset| base.checked_add(offset))
                .ok_or(LoadError::AddressOutOfBounds(base))?;
            mem.set32(address, word);
            index = index.wrapping_add(1);
            bytes += 4;
        }
    }

    Ok(bytes)
}

fn parse_hex_word(token: &str) -> Option<u32> {
    let digits: String = token.chars().filter(|c| *c != '_').collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Loads the PT_LOAD segments of a RISC-V ELF32 executable
pub fn load_elf(
    mem: &mut impl StorageInterface,
    path: &Path,
    elf_data: &[u8],
) -> Result<LoadedImage, LoadError> {
    let parse_err = |e: object::read::Error| LoadError::ParseError(path.to_path_buf(), e.to_string());

    let elf_reader = parse_elf_header(elf_data).map_err(parse_err)?;
    let endian = get_elf_endian(elf_reader).map_err(parse_err)?;

    let machine = get_elf_machine(elf_reader).map_err(parse_err)?;
    if machine != object::elf::EM_RISCV {
        return Err(LoadError::InvalidMachine(machine));
    }

    let entry = get_elf_entry(elf_reader).map_err(parse_err)?;
    let mut bytes = 0;

    for segment in get_elf_segments(elf_reader, elf_data).map_err(parse_err)? {
        let virtual_address = segment.p_vaddr(endian);
        let memory_size = segment.p_memsz(endian);
        let file_size = segment.p_filesz(endian);

        // Can't handle with 32b memory
        if virtual_address.checked_add(memory_size).is_none() {
            return Err(LoadError::AddressOutOfBounds(virtual_address));
        }

        debug!(
            "Loading segment at {virtual_address:#010x}: memsz {memory_size:#x}, filesz {file_size:#x}"
        );

        let data = segment.data(endian, elf_data).map_err(|()| {
            LoadError::ParseError(path.to_path_buf(), "segment data out of range".to_string())
        })?;
        mem.load_bytes(virtual_address, data);

        // The bss part is zero filled
        for address in virtual_address.saturating_add(file_size)..virtual_address + memory_size {
            mem.set8(address, 0);
        }
        bytes += memory_size as usize;
    }

    let tohost = find_elf_symbol(elf_reader, elf_data, "tohost").map_err(parse_err)?;
    info!(
        "Loaded ELF image {}: {bytes} bytes, entry {entry:#010x}, tohost {tohost:#x?}",
        path.display()
    );

    Ok(LoadedImage { entry: Some(entry), tohost, bytes })
}
