//! Register set images.
//!
//! Core files and ptrace transfer registers as fixed layouts of 32-bit
//! words. Each layout is a table mapping word indices to registers; a
//! register wider than a word occupies consecutive words.

use crate::{
    architecture::{AbiRevision, ArchitectureVariant},
    error::Error,
    registers::{RegisterDataType, RegisterId, RegisterValue},
    target::RegisterInterface,
};

/// The kind of a register set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegsetKind {
    /// General purpose and status registers.
    General,
    /// Floating point and vector registers.
    Float,
}

/// The layout of a register set image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegsetLayout {
    /// Size of the image in bytes.
    pub size: usize,
    slots: &'static [(usize, RegisterId)],
}

impl RegsetLayout {
    /// The layout of a register set of `variant`.
    pub fn for_variant(variant: &ArchitectureVariant, kind: RegsetKind) -> Self {
        match (variant.abi(), kind) {
            (AbiRevision::V2, RegsetKind::General) => Self {
                size: 152,
                slots: &ABIV2_GENERAL,
            },
            (AbiRevision::V1, RegsetKind::General) => Self {
                size: 80,
                slots: &ABIV1_GENERAL,
            },
            (AbiRevision::V2, RegsetKind::Float) => Self {
                size: 400,
                slots: &ABIV2_FLOAT,
            },
            (AbiRevision::V1, RegsetKind::Float) => Self {
                size: 144,
                slots: &ABIV1_FLOAT,
            },
        }
    }

    /// The byte offset of a register in the image.
    pub fn offset_of(&self, register: RegisterId) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, id)| *id == register)
            .map(|(word, _)| word * 4)
    }

    /// Mapped registers with their byte offsets.
    pub fn registers(&self) -> impl Iterator<Item = (usize, RegisterId)> + '_ {
        self.slots.iter().map(|&(word, id)| (word * 4, id))
    }
}

fn slot_type(variant: &ArchitectureVariant, register: RegisterId) -> RegisterDataType {
    variant
        .register_file()
        .data_type(register)
        .unwrap_or(RegisterDataType::Int32)
}

/// Write every register mapped by the layout from `image`.
pub fn supply_regset(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
    kind: RegsetKind,
    image: &[u8],
) -> Result<(), Error> {
    let layout = RegsetLayout::for_variant(variant, kind);
    if image.len() < layout.size {
        return Err(Error::RegsetSize {
            expected: layout.size,
            actual: image.len(),
        });
    }

    let endian = variant.endian();
    for (offset, register) in layout.registers() {
        let data_type = slot_type(variant, register);
        let bytes = &image[offset..offset + data_type.size_in_bytes()];

        registers.write_core_reg(
            register,
            RegisterValue::for_type(data_type, endian.read_unsigned(bytes)),
        )?;
    }

    Ok(())
}

/// Build a register set image from the current register values.
///
/// Unmapped words and registers that cannot be read are zero.
pub fn collect_regset(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
    kind: RegsetKind,
) -> Vec<u8> {
    let layout = RegsetLayout::for_variant(variant, kind);
    let endian = variant.endian();
    let mut image = vec![0; layout.size];

    for (offset, register) in layout.registers() {
        let width = slot_type(variant, register).size_in_bytes();

        match registers.read_core_reg(register) {
            Ok(value) => {
                image[offset..offset + width]
                    .copy_from_slice(&endian.write_unsigned(value.as_u128(), width));
            }
            Err(error) => {
                tracing::warn!(
                    "Register {} is not available for the register set: {}",
                    variant.register_file().name(register),
                    error
                );
            }
        }
    }

    image
}

// (word index, register)
static ABIV2_GENERAL: [(usize, RegisterId); 36] = [
    (0, RegisterId(31)), (1, RegisterId(15)), (2, RegisterId(72)), (3, RegisterId(89)),
    (4, RegisterId(14)), (6, RegisterId(0)), (7, RegisterId(1)), (8, RegisterId(2)),
    (9, RegisterId(3)), (10, RegisterId(4)), (11, RegisterId(5)), (12, RegisterId(6)),
    (13, RegisterId(7)), (14, RegisterId(8)), (15, RegisterId(9)), (16, RegisterId(10)),
    (17, RegisterId(11)), (18, RegisterId(12)), (19, RegisterId(13)), (20, RegisterId(16)),
    (21, RegisterId(17)), (22, RegisterId(18)), (23, RegisterId(19)), (24, RegisterId(20)),
    (25, RegisterId(21)), (26, RegisterId(22)), (27, RegisterId(23)), (28, RegisterId(24)),
    (29, RegisterId(25)), (30, RegisterId(26)), (31, RegisterId(27)), (32, RegisterId(28)),
    (33, RegisterId(29)), (34, RegisterId(30)), (35, RegisterId(36)), (36, RegisterId(37)),
];

static ABIV1_GENERAL: [(usize, RegisterId); 18] = [
    (1, RegisterId(15)), (2, RegisterId(64)), (3, RegisterId(65)), (4, RegisterId(0)),
    (6, RegisterId(2)), (7, RegisterId(3)), (8, RegisterId(4)), (9, RegisterId(5)),
    (10, RegisterId(6)), (11, RegisterId(7)), (12, RegisterId(8)), (13, RegisterId(9)),
    (14, RegisterId(10)), (15, RegisterId(11)), (16, RegisterId(12)), (17, RegisterId(13)),
    (18, RegisterId(14)), (19, RegisterId(1)),
];

static ABIV2_FLOAT: [(usize, RegisterId); 35] = [
    (0, RegisterId(40)), (2, RegisterId(41)), (4, RegisterId(42)), (6, RegisterId(43)),
    (8, RegisterId(44)), (10, RegisterId(45)), (12, RegisterId(46)), (14, RegisterId(47)),
    (16, RegisterId(48)), (18, RegisterId(49)), (20, RegisterId(50)), (22, RegisterId(51)),
    (24, RegisterId(52)), (26, RegisterId(53)), (28, RegisterId(54)), (30, RegisterId(55)),
    (32, RegisterId(56)), (36, RegisterId(57)), (40, RegisterId(58)), (44, RegisterId(59)),
    (48, RegisterId(60)), (52, RegisterId(61)), (56, RegisterId(62)), (60, RegisterId(63)),
    (64, RegisterId(64)), (68, RegisterId(65)), (72, RegisterId(66)), (76, RegisterId(67)),
    (80, RegisterId(68)), (84, RegisterId(69)), (88, RegisterId(70)), (92, RegisterId(71)),
    (96, RegisterId(122)), (97, RegisterId(123)), (98, RegisterId(121)),
];

static ABIV1_FLOAT: [(usize, RegisterId); 19] = [
    (0, RegisterId(32)), (2, RegisterId(33)), (4, RegisterId(34)), (6, RegisterId(35)),
    (8, RegisterId(36)), (10, RegisterId(37)), (12, RegisterId(38)), (14, RegisterId(39)),
    (16, RegisterId(40)), (18, RegisterId(41)), (20, RegisterId(42)), (22, RegisterId(43)),
    (24, RegisterId(44)), (26, RegisterId(45)), (28, RegisterId(46)), (30, RegisterId(47)),
    (32, RegisterId(98)), (33, RegisterId(99)), (34, RegisterId(97)),
];
