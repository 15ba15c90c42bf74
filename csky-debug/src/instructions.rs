//! Instruction fetch and length determination.
//!
//! ABI revision 1 only has 16-bit instructions. On ABI revision 2 a first
//! halfword with both top bits set starts a 32-bit instruction, which is
//! formed from the two halfwords, first halfword in the upper half.

use crate::{
    architecture::{ArchitectureVariant, LengthRule},
    memory::{MemoryAccessError, MemoryInterface},
};

mod patterns;

pub use patterns::{decode, Adjustment, Op, PushList};

/// A fetched instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the first halfword.
    pub address: u64,
    /// The instruction bits. 16-bit instructions occupy the low half.
    pub word: u32,
    /// Length in bytes, 2 or 4.
    pub length: u8,
}

impl Instruction {
    /// Address of the following instruction.
    pub fn next_address(&self) -> u64 {
        self.address + u64::from(self.length)
    }

    /// Whether this is a 32-bit instruction.
    pub fn is_32bit(&self) -> bool {
        self.length == 4
    }
}

/// Fetch the instruction at `address`.
pub fn fetch(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<Instruction, MemoryAccessError> {
    let endian = variant.endian();
    let first = memory.read_word_16(address, endian)?;

    if variant.length_rule().is_32bit_start(first) {
        let second = memory.read_word_16(address + 2, endian)?;

        Ok(Instruction {
            address,
            word: (u32::from(first) << 16) | u32::from(second),
            length: 4,
        })
    } else {
        Ok(Instruction {
            address,
            word: u32::from(first),
            length: 2,
        })
    }
}

/// Whether a breakpoint at `address` has to be 2 bytes wide.
///
/// This is false for 32-bit instructions and for the all-zero 32-bit
/// breakpoint marker.
pub fn is_two_byte_at(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<bool, MemoryAccessError> {
    let rule = variant.length_rule();
    if rule == LengthRule::SixteenBitOnly {
        return Ok(true);
    }

    let endian = variant.endian();
    let first = memory.read_word_16(address, endian)?;

    if rule.is_32bit_start(first) {
        return Ok(false);
    }

    if first == 0 {
        let second = memory.read_word_16(address + 2, endian)?;
        return Ok(second != 0);
    }

    Ok(true)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::{
        architecture::{CpuFamily, Endian},
        test::MockMemory,
    };

    #[test_case(Endian::Little; "little endian")]
    #[test_case(Endian::Big; "big endian")]
    fn fetch_32bit_high_half_first(endian: Endian) {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, endian);
        let mut memory = MockMemory::new();
        memory.add_instructions(0x1000, endian, &[0xe5ce_100f, 0x1423]);

        let first = fetch(&mut memory, &variant, 0x1000).unwrap();
        assert_eq!(
            first,
            Instruction {
                address: 0x1000,
                word: 0xe5ce_100f,
                length: 4
            }
        );

        let second = fetch(&mut memory, &variant, first.next_address()).unwrap();
        assert_eq!(second.word, 0x1423);
        assert_eq!(second.length, 2);
    }

    #[test]
    fn abiv1_is_always_16bit() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck610, Endian::Big);
        let mut memory = MockMemory::new();
        memory.add_instructions(0x2000, Endian::Big, &[0xf800, 0xc000]);

        assert_eq!(fetch(&mut memory, &variant, 0x2000).unwrap().length, 2);
        assert_eq!(fetch(&mut memory, &variant, 0x2002).unwrap().word, 0xc000);
        assert!(is_two_byte_at(&mut memory, &variant, 0x2002).unwrap());
    }

    #[test]
    fn fetch_reports_faulting_address() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        // Only the first half of a 32-bit instruction is readable.
        memory.add_instructions(0x3000, Endian::Little, &[0xe5ce]);

        let error = fetch(&mut memory, &variant, 0x3000).unwrap_err();

        assert_eq!(
            error,
            MemoryAccessError {
                address: 0x3002,
                length: 2
            }
        );
    }

    #[test_case(&[0x6e3b, 0x0000], true; "16-bit instruction")]
    #[test_case(&[0xe5ce_100f], false; "32-bit instruction")]
    #[test_case(&[0x0000, 0x0000], false; "all-zero 32-bit marker")]
    #[test_case(&[0x0000, 0x6e3b], true; "all-zero 16-bit marker")]
    fn breakpoint_width(instructions: &[u32], two_bytes: bool) {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        memory.add_instructions(0x4000, Endian::Little, instructions);

        assert_eq!(
            is_two_byte_at(&mut memory, &variant, 0x4000).unwrap(),
            two_bytes
        );
    }
}
