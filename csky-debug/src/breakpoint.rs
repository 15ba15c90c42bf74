//! Software breakpoints.
//!
//! Instructions are 2 or 4 bytes long and only 2-byte aligned, but memory is
//! written in aligned 32-bit words. A breakpoint is therefore spliced into
//! every aligned word it overlaps, and the displaced bytes are kept in the
//! [`BreakpointPlacement`].

use crate::{
    architecture::{AbiRevision, ArchitectureVariant, Endian},
    config::KernelGeneration,
    error::Error,
    instructions::is_two_byte_at,
    memory::MemoryInterface,
    target::RegisterInterface,
};

const TRAP: u16 = 0x0008;
const ILLEGAL: u16 = 0x1464;

/// The instruction used as a software breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointEncoding {
    /// 2-byte `trap`, ABI revision 1 on newer kernels.
    Trap,
    /// Permanently illegal 2-byte instruction, repeated for 4-byte breakpoints.
    /// ABI revision 2 on newer kernels.
    Illegal,
    /// All-zero instruction of either width, older kernels.
    Zero,
}

impl BreakpointEncoding {
    /// The encoding used on a target.
    pub fn for_variant(variant: &ArchitectureVariant) -> Self {
        match (variant.abi(), variant.kernel()) {
            (_, KernelGeneration::Legacy) => BreakpointEncoding::Zero,
            (AbiRevision::V1, KernelGeneration::Modern) => BreakpointEncoding::Trap,
            (AbiRevision::V2, KernelGeneration::Modern) => BreakpointEncoding::Illegal,
        }
    }

    /// The 2-byte form of the encoding.
    pub fn halfword(self) -> u16 {
        match self {
            BreakpointEncoding::Trap => TRAP,
            BreakpointEncoding::Illegal => ILLEGAL,
            BreakpointEncoding::Zero => 0,
        }
    }

    /// The breakpoint bytes in memory order.
    pub fn bytes(self, length: u8, endian: Endian) -> Vec<u8> {
        let halfword = endian.u16_bytes(self.halfword());
        halfword
            .iter()
            .copied()
            .cycle()
            .take(usize::from(length))
            .collect()
    }
}

/// An inserted breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointPlacement {
    address: u64,
    placed_address: u64,
    length: u8,
    shadow: Vec<u8>,
    unaligned: bool,
}

impl BreakpointPlacement {
    /// The address the breakpoint was requested at.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The first aligned word that was rewritten.
    pub fn placed_address(&self) -> u64 {
        self.placed_address
    }

    /// Breakpoint length, 2 or 4.
    pub fn length(&self) -> u8 {
        self.length
    }

    /// The original bytes at `address..address + length`.
    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    /// The address was not 2-byte aligned.
    pub fn is_unaligned(&self) -> bool {
        self.unaligned
    }

    fn words(&self) -> std::ops::Range<u64> {
        let end = (self.address + u64::from(self.length) + 3) & !3;
        self.placed_address..end
    }

    /// Position of the breakpoint within the rewritten words.
    fn span(&self) -> std::ops::Range<usize> {
        let offset = (self.address - self.placed_address) as usize;
        offset..offset + usize::from(self.length)
    }
}

/// The breakpoint length needed at `address`.
pub fn breakpoint_length(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<u8, Error> {
    Ok(if is_two_byte_at(memory, variant, address)? {
        2
    } else {
        4
    })
}

/// Whether the halfword at `address` is the configured 2-byte breakpoint.
pub fn is_breakpoint_at(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<bool, Error> {
    let encoding = BreakpointEncoding::for_variant(variant);
    let mut halfword = [0; 2];
    memory.read_8(address, &mut halfword)?;

    Ok(halfword[..] == encoding.bytes(2, variant.endian())[..])
}

/// Insert a breakpoint at `address`.
///
/// Every written word is read back. If a word reads back differently, the
/// words written so far are restored where possible and
/// [`Error::WriteVerification`] is returned. Memory errors are returned
/// without restoring anything.
pub fn insert(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<BreakpointPlacement, Error> {
    let unaligned = address % 2 != 0;
    if unaligned {
        tracing::warn!("Breakpoint at odd address {:#010x}", address);
    }

    let length = if unaligned && is_breakpoint_at(memory, variant, address)? {
        2
    } else {
        breakpoint_length(memory, variant, address)?
    };

    let mut placement = BreakpointPlacement {
        address,
        placed_address: address & !3,
        length,
        shadow: Vec::new(),
        unaligned,
    };

    let original = read_words(memory, &placement)?;
    placement.shadow = original[placement.span()].to_vec();

    let pattern = BreakpointEncoding::for_variant(variant).bytes(length, variant.endian());
    if placement.shadow == pattern {
        tracing::debug!("{:#010x} already contains a breakpoint", address);
        return Ok(placement);
    }

    let mut image = original.clone();
    image[placement.span()].copy_from_slice(&pattern);

    if let Err(error) = write_words(memory, &placement, &image) {
        if matches!(error, Error::WriteVerification { .. }) {
            restore_words(memory, &placement, &original);
        }
        return Err(error);
    }

    tracing::debug!(
        "Inserted {}-byte breakpoint at {:#010x}, shadow {:02x?}",
        length,
        address,
        placement.shadow
    );

    Ok(placement)
}

/// Remove a breakpoint, restoring the displaced bytes.
///
/// The bytes around the breakpoint are read again, so changes made to them
/// while the breakpoint was inserted are kept. Written words are verified
/// like in [`insert`].
pub fn remove(
    memory: &mut dyn MemoryInterface,
    placement: &BreakpointPlacement,
) -> Result<(), Error> {
    let mut image = read_words(memory, placement)?;
    image[placement.span()].copy_from_slice(&placement.shadow);

    write_words(memory, placement, &image)?;

    tracing::debug!("Removed breakpoint at {:#010x}", placement.address);

    Ok(())
}

fn read_words(
    memory: &mut dyn MemoryInterface,
    placement: &BreakpointPlacement,
) -> Result<Vec<u8>, Error> {
    let mut image = Vec::new();

    for word in placement.words().step_by(4) {
        let mut buffer = [0; 4];
        memory.read_8(word, &mut buffer)?;
        image.extend_from_slice(&buffer);
    }

    Ok(image)
}

/// Write `image` one aligned word at a time, reading each word back.
fn write_words(
    memory: &mut dyn MemoryInterface,
    placement: &BreakpointPlacement,
    image: &[u8],
) -> Result<(), Error> {
    for (word, bytes) in placement.words().step_by(4).zip(image.chunks_exact(4)) {
        memory.write_8(word, bytes)?;

        let mut readback = [0; 4];
        memory.read_8(word, &mut readback)?;

        if readback[..] != bytes[..] {
            return Err(Error::WriteVerification {
                address: word,
                expected: bytes.to_vec(),
                actual: readback.to_vec(),
            });
        }
    }

    Ok(())
}

fn restore_words(
    memory: &mut dyn MemoryInterface,
    placement: &BreakpointPlacement,
    original: &[u8],
) {
    for (word, bytes) in placement.words().step_by(4).zip(original.chunks_exact(4)) {
        if let Err(error) = memory.write_8(word, bytes) {
            tracing::warn!(
                "Failed to restore {:#010x} after a failed breakpoint write: {}",
                word,
                error
            );
        }
    }
}

/// The length of a breakpoint instruction compiled into the program at `address`.
///
/// Recognizes the all-zero 32-bit marker and the configured 2-byte encoding.
pub fn permanent_breakpoint_length(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<Option<u8>, Error> {
    let endian = variant.endian();
    let encoding = BreakpointEncoding::for_variant(variant);

    if variant.abi() == AbiRevision::V2 {
        let mut word = [0; 4];
        match memory.read_8(address, &mut word) {
            Ok(()) if word == [0; 4] || word[..] == encoding.bytes(4, endian)[..] => {
                return Ok(Some(4));
            }
            Ok(()) => {}
            Err(error) => {
                tracing::warn!("Only checking for a 2-byte breakpoint: {}", error);
            }
        }
    }

    Ok(is_breakpoint_at(memory, variant, address)?.then_some(2))
}

/// Whether a breakpoint instruction is compiled into the program at `address`.
pub fn is_permanent_breakpoint(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    address: u64,
) -> Result<bool, Error> {
    Ok(permanent_breakpoint_length(memory, variant, address)?.is_some())
}

/// Step the program counter over a breakpoint compiled into the program.
///
/// Returns `false` if there is no such breakpoint at the program counter.
pub fn skip_permanent_breakpoint(
    memory: &mut dyn MemoryInterface,
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
) -> Result<bool, Error> {
    let pc_register = variant.register_file().program_counter();
    let mut pc = registers.read_core_reg(pc_register)?;
    let address = u64::try_from(pc)?;

    let Some(length) = permanent_breakpoint_length(memory, variant, address)? else {
        return Ok(false);
    };

    pc.increment_address(usize::from(length))?;
    registers.write_core_reg(pc_register, pc)?;

    tracing::debug!(
        "Skipped {}-byte permanent breakpoint at {:#010x}",
        length,
        address
    );

    Ok(true)
}
