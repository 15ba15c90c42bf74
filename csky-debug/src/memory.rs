use crate::architecture::Endian;

/// Memory access to {length} bytes at address {address:#010x} failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub struct MemoryAccessError {
    /// The first address of the failed access.
    pub address: u64,
    /// The number of bytes in the failed access.
    pub length: usize,
}

/// Access to the memory of the debuggee.
///
/// Only byte-granular accesses have to be implemented. The word helpers
/// interpret the bytes in the byte order of the target.
pub trait MemoryInterface {
    /// Read `data.len()` bytes starting at `address`.
    fn read_8(&mut self, address: u64, data: &mut [u8]) -> Result<(), MemoryAccessError>;

    /// Write `data` to memory starting at `address`.
    fn write_8(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryAccessError>;

    /// Read a 16-bit value at `address`.
    fn read_word_16(&mut self, address: u64, endian: Endian) -> Result<u16, MemoryAccessError> {
        let mut buffer = [0; 2];
        self.read_8(address, &mut buffer)?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(buffer),
            Endian::Big => u16::from_be_bytes(buffer),
        })
    }

    /// Read a 32-bit value at `address`.
    fn read_word_32(&mut self, address: u64, endian: Endian) -> Result<u32, MemoryAccessError> {
        let mut buffer = [0; 4];
        self.read_8(address, &mut buffer)?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(buffer),
            Endian::Big => u32::from_be_bytes(buffer),
        })
    }

    /// Write a 32-bit value at `address`.
    fn write_word_32(
        &mut self,
        address: u64,
        value: u32,
        endian: Endian,
    ) -> Result<(), MemoryAccessError> {
        self.write_8(address, &endian.u32_bytes(value))
    }
}
