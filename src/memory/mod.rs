//! Memory structure

pub mod htif;
pub mod mmu;

use mmu::MMU;

use crate::error::{MemoryError, MemoryErrorKind};

/// Memory interface implementation.
/// Little-endian, byte addressed, addresses wrap at 2^32.
pub trait StorageInterface {
    fn mmu(&self) -> &MMU;
    fn mmu_mut(&mut self) -> &mut MMU;

    fn get8(&self, address: u32) -> Result<u8, MemoryError> {
        self.mmu().get8(address).ok_or(MemoryError::AccessError {
            address,
            kind: MemoryErrorKind::ReadUnallocated,
        })
    }
    fn set8(&mut self, address: u32, value: u8) {
        self.mmu_mut().set8(address, value);
    }

    fn get16(&self, address: u32) -> Result<u16, MemoryError> {
        Ok(self.get8(address)? as u16 | ((self.get8(address.wrapping_add(1))? as u16) << 8))
    }
    fn get32(&self, address: u32) -> Result<u32, MemoryError> {
        Ok(self.get16(address)? as u32 | ((self.get16(address.wrapping_add(2))? as u32) << 16))
    }

    fn set16(&mut self, address: u32, value: u16) {
        self.set8(address, value as u8);
        self.set8(address.wrapping_add(1), (value >> 8) as u8);
    }
    fn set32(&mut self, address: u32, value: u32) {
        self.set16(address, value as u16);
        self.set16(address.wrapping_add(2), (value >> 16) as u16);
    }

    /// Reads `step` bytes, zero-extended
    fn get(&self, address: u32, step: u32) -> Result<u32, MemoryError> {
        match step {
            1 => self.get8(address).map(u32::from),
            2 => self.get16(address).map(u32::from),
            4 => self.get32(address),
            _ => Err(MemoryError::AccessError {
                address,
                kind: MemoryErrorKind::InvalidSize(step),
            }),
        }
    }

    /// Writes the low `step` bytes of `value`
    fn set(&mut self, address: u32, step: u32, value: u32) -> Result<(), MemoryError> {
        match step {
            1 => self.set8(address, value as u8),
            2 => self.set16(address, value as u16),
            4 => self.set32(address, value),
            _ => {
                return Err(MemoryError::AccessError {
                    address,
                    kind: MemoryErrorKind::InvalidSize(step),
                })
            }
        }
        Ok(())
    }

    /// Instruction fetch: word aligned and mapped
    fn fetch(&self, pc: u32) -> Result<u32, MemoryError> {
        if pc & 3 != 0 {
            return Err(MemoryError::AlignmentError(pc, 4));
        }
        self.get32(pc)
    }

    /// Copies a byte image into memory
    fn load_bytes(&mut self, base: u32, bytes: &[u8]) {
        for (offset, byte) in bytes.iter().enumerate() {
            self.set8(base.wrapping_add(offset as u32), *byte);
        }
    }
}

/// Flat main memory backed by the paged MMU
#[derive(Clone, Debug, Default)]
pub struct Memory {
    mmu: MMU,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageInterface for Memory {
    fn mmu(&self) -> &MMU {
        &self.mmu
    }

    fn mmu_mut(&mut self) -> &mut MMU {
        &mut self.mmu
    }
}
