//! Control and status registers

/// Machine trap vector base address
pub const MTVEC: u16 = 0x305;
/// Machine scratch register
pub const MSCRATCH: u16 = 0x340;
/// Machine exception program counter
pub const MEPC: u16 = 0x341;
/// Machine trap cause
pub const MCAUSE: u16 = 0x342;

/// Environment call from M-mode
pub const CAUSE_ECALL_M: u32 = 11;

/// Number of addressable CSRs
pub const CSR_COUNT: usize = 4096;

/// Flat 12-bit CSR space
#[derive(Clone)]
pub struct CsrFile {
    regs: Box<[u32; CSR_COUNT]>,
}

impl Default for CsrFile {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrFile {
    pub fn new() -> Self {
        Self { regs: Box::new([0; CSR_COUNT]) }
    }

    pub fn read(&self, addr: u16) -> u32 {
        self.regs[addr as usize & (CSR_COUNT - 1)]
    }

    pub fn write(&mut self, addr: u16, value: u32) {
        self.regs[addr as usize & (CSR_COUNT - 1)] = value;
    }
}

impl std::fmt::Debug for CsrFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (addr, value) in self.regs.iter().enumerate().filter(|(_, v)| **v != 0) {
            map.entry(&format_args!("{addr:#05x}"), &format_args!("{value:#010x}"));
        }
        map.finish()
    }
}
