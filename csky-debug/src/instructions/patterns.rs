//! Opcode patterns relevant to prologue and epilogue recognition.
//!
//! Each table is matched in order, the first pattern whose mask and value
//! match and whose operand constraints hold decides the operation.

use crate::architecture::{AbiRevision, ArchitectureVariant};

use super::Instruction;

/// An operation relevant to frame analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `subi sp, sp, imm`
    StackAdjust(u32),
    /// `subu sp, sp, rx`
    StackAdjustRegister {
        /// Register holding the decrement.
        source: u16,
    },
    /// `stm rf-rl, (sp)`
    StoreMultiple {
        /// First stored register.
        first: u16,
        /// Number of consecutive registers stored.
        count: u16,
    },
    /// `st.w rz, (sp, offset)`
    StoreWord {
        /// The stored register.
        source: u16,
        /// Offset from the stack pointer in bytes.
        offset: u32,
    },
    /// `push` with a register list.
    Push(PushList),
    /// `mov fp, sp`
    MoveFpSp,
    /// `mfcr rz, crN`
    MoveFromControl {
        /// General register receiving the value.
        destination: u16,
        /// Control register number in bank 0.
        control: u16,
    },
    /// `bsr` to the directly following instruction.
    BranchToNext,
    /// Any other subroutine call.
    Call,
    /// `addu rz, r15`
    AddLinkRegister {
        /// Register the link register is added to.
        destination: u16,
    },
    /// `lrw rz, [literal]`
    LoadLiteral {
        /// Register receiving the literal.
        destination: u16,
        /// Address of the literal.
        address: u64,
    },
    /// `movi`, `movih`, `bgeni` or `bmaski`.
    LoadImmediate {
        /// Register receiving the constant.
        destination: u16,
        /// The constant.
        value: u32,
    },
    /// Arithmetic on a single register.
    Adjust {
        /// The modified register.
        register: u16,
        /// The operation applied.
        adjustment: Adjustment,
    },
    /// `jmp rx`, including `rts`.
    Jump {
        /// The jump target register.
        register: u16,
    },
    /// Unconditional branch.
    Branch,
    /// `rte`
    ReturnFromException,
    /// `rfi`
    ReturnFromInterrupt,
}

/// In-place arithmetic performed on a register while computing a large frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// `addi`
    Add(u32),
    /// `subi`
    Subtract(u32),
    /// `rsubi`
    ReverseSubtract(u32),
    /// `not`
    Not,
    /// `rotli`
    RotateLeft(u32),
    /// `lsli`
    ShiftLeft(u32),
    /// `bseti`
    BitSet(u32),
    /// `bclri`
    BitClear(u32),
    /// `ixh rz, rz, rz`
    TimesThree,
    /// `ixw rz, rz, rz`
    TimesFive,
}

impl Adjustment {
    /// Apply the operation to `value`.
    pub fn apply(self, value: u32) -> u32 {
        match self {
            Adjustment::Add(imm) => value.wrapping_add(imm),
            Adjustment::Subtract(imm) => value.wrapping_sub(imm),
            Adjustment::ReverseSubtract(imm) => imm.wrapping_sub(value),
            Adjustment::Not => !value,
            Adjustment::RotateLeft(amount) => value.rotate_left(amount),
            Adjustment::ShiftLeft(amount) => value.checked_shl(amount).unwrap_or(0),
            Adjustment::BitSet(bit) => value | (1u32.checked_shl(bit).unwrap_or(0)),
            Adjustment::BitClear(bit) => value & !(1u32.checked_shl(bit).unwrap_or(0)),
            Adjustment::TimesThree => value.wrapping_mul(3),
            Adjustment::TimesFive => value.wrapping_mul(5),
        }
    }
}

bitfield::bitfield! {
    /// Register list of the ABI revision 2 `push` instructions.
    ///
    /// The 16-bit form only has the `r4` range and `r15`.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct PushList(u32);
    impl Debug;
    /// Number of registers pushed from `r4` on.
    pub u16, low_count, _: 3, 0;
    /// `r15` is pushed.
    pub r15, _: 4;
    /// Number of registers pushed from `r16` on.
    pub u16, high_count, _: 7, 5;
    /// `r29` is pushed.
    pub r29, _: 8;
}

impl PushList {
    /// The pushed registers, highest address first.
    pub fn push_order(&self) -> Vec<u16> {
        let mut registers = Vec::new();

        if self.r29() {
            registers.push(29);
        }
        registers.extend((16..16 + self.high_count()).rev());
        if self.r15() {
            registers.push(15);
        }
        registers.extend((4..4 + self.low_count()).rev());

        registers
    }
}

struct Pattern {
    name: &'static str,
    mask: u32,
    value: u32,
    length: u8,
    build: fn(&Instruction) -> Option<Op>,
}

/// Extract `width` bits starting at `lsb`.
fn field(word: u32, lsb: u32, width: u32) -> u16 {
    ((word >> lsb) & ((1 << width) - 1)) as u16
}

fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    (i64::from(value) << shift) >> shift
}

fn low_mask(bits: u32) -> u32 {
    match bits {
        1..=31 => (1 << bits) - 1,
        _ => u32::MAX,
    }
}

fn adjust(register: u16, adjustment: Adjustment) -> Option<Op> {
    Some(Op::Adjust {
        register,
        adjustment,
    })
}

/// `rz, rx` operands of the 32-bit immediate forms, required to be the same register.
fn same_register_32(word: u32) -> Option<u16> {
    let rz = field(word, 0, 5);
    (rz == field(word, 16, 5)).then_some(rz)
}

static ABIV2_PATTERNS: &[Pattern] = &[
    Pattern {
        name: "subi16 sp, sp",
        mask: 0xfce0,
        value: 0x1420,
        length: 2,
        build: |i| Some(Op::StackAdjust((((i.word >> 3) & 0x60) | (i.word & 0x1f)) << 2)),
    },
    Pattern {
        name: "push16",
        mask: 0xffe0,
        value: 0x14c0,
        length: 2,
        build: |i| Some(Op::Push(PushList(i.word & 0x1f))),
    },
    Pattern {
        name: "st16.w rz, (sp, disp)",
        mask: 0xf800,
        value: 0xb800,
        length: 2,
        build: |i| {
            Some(Op::StoreWord {
                source: field(i.word, 5, 3),
                offset: (((i.word >> 3) & 0xe0) | (i.word & 0x1f)) << 2,
            })
        },
    },
    Pattern {
        name: "mov16 fp, sp",
        mask: 0xffff,
        value: 0x6e3b,
        length: 2,
        build: |_| Some(Op::MoveFpSp),
    },
    Pattern {
        name: "subu16 sp, rx",
        mask: 0xffc3,
        value: 0x6382,
        length: 2,
        build: |i| {
            Some(Op::StackAdjustRegister {
                source: field(i.word, 2, 4),
            })
        },
    },
    Pattern {
        name: "addu16 rz, r15",
        mask: 0xfc3f,
        value: 0x603c,
        length: 2,
        build: |i| {
            Some(Op::AddLinkRegister {
                destination: field(i.word, 6, 4),
            })
        },
    },
    Pattern {
        name: "jmp16",
        mask: 0xffc3,
        value: 0x7800,
        length: 2,
        build: |i| {
            Some(Op::Jump {
                register: field(i.word, 2, 4),
            })
        },
    },
    Pattern {
        name: "br16",
        mask: 0xfc00,
        value: 0x0400,
        length: 2,
        build: |_| Some(Op::Branch),
    },
    Pattern {
        name: "lrw16",
        mask: 0xfc00,
        value: 0x1000,
        length: 2,
        build: |i| {
            let offset = u64::from((((i.word >> 3) & 0x60) | (i.word & 0x1f)) << 2);
            Some(Op::LoadLiteral {
                destination: field(i.word, 5, 3),
                address: (i.address + offset) & !3,
            })
        },
    },
    Pattern {
        name: "movi16",
        mask: 0xf800,
        value: 0x3000,
        length: 2,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 8, 3),
                value: i.word & 0xff,
            })
        },
    },
    Pattern {
        name: "addi16",
        mask: 0xf800,
        value: 0x2000,
        length: 2,
        build: |i| adjust(field(i.word, 8, 3), Adjustment::Add((i.word & 0xff) + 1)),
    },
    Pattern {
        name: "subi16",
        mask: 0xf800,
        value: 0x2800,
        length: 2,
        build: |i| adjust(field(i.word, 8, 3), Adjustment::Subtract((i.word & 0xff) + 1)),
    },
    Pattern {
        name: "lsli16",
        mask: 0xf800,
        value: 0x4000,
        length: 2,
        build: |i| {
            let rz = field(i.word, 8, 3);
            (rz == field(i.word, 5, 3))
                .then(|| adjust(rz, Adjustment::ShiftLeft(i.word & 0x1f)))
                .flatten()
        },
    },
    Pattern {
        name: "bseti16",
        mask: 0xf8e0,
        value: 0x38a0,
        length: 2,
        build: |i| adjust(field(i.word, 8, 3), Adjustment::BitSet(i.word & 0x1f)),
    },
    Pattern {
        name: "bclri16",
        mask: 0xf8e0,
        value: 0x3880,
        length: 2,
        build: |i| adjust(field(i.word, 8, 3), Adjustment::BitClear(i.word & 0x1f)),
    },
    Pattern {
        name: "not16",
        mask: 0xfc03,
        value: 0x6c02,
        length: 2,
        build: |i| {
            let rz = field(i.word, 6, 4);
            (rz == field(i.word, 2, 4))
                .then(|| adjust(rz, Adjustment::Not))
                .flatten()
        },
    },
    Pattern {
        name: "subi32 sp, sp",
        mask: 0xffff_f000,
        value: 0xe5ce_1000,
        length: 4,
        build: |i| Some(Op::StackAdjust((i.word & 0xfff) + 1)),
    },
    Pattern {
        name: "st32.w rz, (sp, disp)",
        mask: 0xfc1f_f000,
        value: 0xdc0e_2000,
        length: 4,
        build: |i| {
            Some(Op::StoreWord {
                source: field(i.word, 21, 5),
                offset: (i.word & 0xfff) << 2,
            })
        },
    },
    Pattern {
        name: "stm32 (sp)",
        mask: 0xfc1f_ffe0,
        value: 0xd40e_1c20,
        length: 4,
        build: |i| {
            Some(Op::StoreMultiple {
                first: field(i.word, 21, 5),
                count: field(i.word, 0, 5) + 1,
            })
        },
    },
    Pattern {
        name: "mov32 fp, sp",
        mask: 0xffff_ffff,
        value: 0xc40e_4828,
        length: 4,
        build: |_| Some(Op::MoveFpSp),
    },
    Pattern {
        name: "subu32 sp, sp, ry",
        mask: 0xfc1f_ffff,
        value: 0xc40e_008e,
        length: 4,
        build: |i| {
            Some(Op::StackAdjustRegister {
                source: field(i.word, 21, 5),
            })
        },
    },
    Pattern {
        name: "addu32 rz, rz, r15",
        mask: 0xffe0_ffe0,
        value: 0xc5e0_0020,
        length: 4,
        build: |i| {
            same_register_32(i.word).map(|destination| Op::AddLinkRegister { destination })
        },
    },
    Pattern {
        name: "mfcr32",
        mask: 0xffe0_ffe0,
        value: 0xc000_6020,
        length: 4,
        build: |i| {
            Some(Op::MoveFromControl {
                destination: field(i.word, 0, 5),
                control: field(i.word, 16, 5),
            })
        },
    },
    Pattern {
        name: "rte32",
        mask: 0xffff_ffff,
        value: 0xc000_4020,
        length: 4,
        build: |_| Some(Op::ReturnFromException),
    },
    Pattern {
        name: "rfi32",
        mask: 0xffff_ffff,
        value: 0xc000_4420,
        length: 4,
        build: |_| Some(Op::ReturnFromInterrupt),
    },
    Pattern {
        name: "jmp32",
        mask: 0xffe0_ffff,
        value: 0xe8c0_0000,
        length: 4,
        build: |i| {
            Some(Op::Jump {
                register: field(i.word, 16, 5),
            })
        },
    },
    Pattern {
        name: "br32",
        mask: 0xffff_0000,
        value: 0xe800_0000,
        length: 4,
        build: |_| Some(Op::Branch),
    },
    Pattern {
        name: "jmpi32",
        mask: 0xffff_0000,
        value: 0xeac0_0000,
        length: 4,
        build: |_| Some(Op::Branch),
    },
    Pattern {
        name: "push32",
        mask: 0xffff_fe00,
        value: 0xebe0_0000,
        length: 4,
        build: |i| Some(Op::Push(PushList(i.word & 0x1ff))),
    },
    Pattern {
        name: "bsr32",
        mask: 0xfc00_0000,
        value: 0xe000_0000,
        length: 4,
        build: |i| {
            if sign_extend(i.word & 0x03ff_ffff, 26) << 1 == 4 {
                Some(Op::BranchToNext)
            } else {
                Some(Op::Call)
            }
        },
    },
    Pattern {
        name: "lrw32",
        mask: 0xffe0_0000,
        value: 0xea80_0000,
        length: 4,
        build: |i| {
            Some(Op::LoadLiteral {
                destination: field(i.word, 16, 5),
                address: (i.address + (u64::from(i.word & 0xffff) << 2)) & !3,
            })
        },
    },
    Pattern {
        name: "movi32",
        mask: 0xffe0_0000,
        value: 0xea00_0000,
        length: 4,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 16, 5),
                value: i.word & 0xffff,
            })
        },
    },
    Pattern {
        name: "movih32",
        mask: 0xffe0_0000,
        value: 0xea20_0000,
        length: 4,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 16, 5),
                value: (i.word & 0xffff) << 16,
            })
        },
    },
    Pattern {
        name: "bmaski32",
        mask: 0xfc1f_ffe0,
        value: 0xc400_5020,
        length: 4,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 0, 5),
                value: low_mask(u32::from(field(i.word, 21, 5)) + 1),
            })
        },
    },
    Pattern {
        name: "bgeni32",
        mask: 0xfc1f_ffe0,
        value: 0xc400_5040,
        length: 4,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 0, 5),
                value: 1 << field(i.word, 21, 5),
            })
        },
    },
    Pattern {
        name: "addi32",
        mask: 0xfc00_f000,
        value: 0xe400_0000,
        length: 4,
        build: |i| {
            let rz = field(i.word, 21, 5);
            (rz == field(i.word, 16, 5))
                .then(|| adjust(rz, Adjustment::Add((i.word & 0xfff) + 1)))
                .flatten()
        },
    },
    Pattern {
        name: "subi32",
        mask: 0xfc00_f000,
        value: 0xe400_1000,
        length: 4,
        build: |i| {
            let rz = field(i.word, 21, 5);
            (rz == field(i.word, 16, 5))
                .then(|| adjust(rz, Adjustment::Subtract((i.word & 0xfff) + 1)))
                .flatten()
        },
    },
    Pattern {
        name: "lsli32",
        mask: 0xfc00_ffe0,
        value: 0xc400_4820,
        length: 4,
        build: |i| {
            same_register_32(i.word).and_then(|rz| {
                adjust(rz, Adjustment::ShiftLeft(u32::from(field(i.word, 21, 5))))
            })
        },
    },
    Pattern {
        name: "rotli32",
        mask: 0xfc00_ffe0,
        value: 0xc400_4900,
        length: 4,
        build: |i| {
            same_register_32(i.word).and_then(|rz| {
                adjust(rz, Adjustment::RotateLeft(u32::from(field(i.word, 21, 5))))
            })
        },
    },
    Pattern {
        name: "bseti32",
        mask: 0xfc00_ffe0,
        value: 0xc400_2840,
        length: 4,
        build: |i| {
            same_register_32(i.word)
                .and_then(|rz| adjust(rz, Adjustment::BitSet(u32::from(field(i.word, 21, 5)))))
        },
    },
    Pattern {
        name: "bclri32",
        mask: 0xfc00_ffe0,
        value: 0xc400_2820,
        length: 4,
        build: |i| {
            same_register_32(i.word).and_then(|rz| {
                adjust(rz, Adjustment::BitClear(u32::from(field(i.word, 21, 5))))
            })
        },
    },
    Pattern {
        name: "not32",
        mask: 0xfc00_ffe0,
        value: 0xc400_2480,
        length: 4,
        build: |i| {
            same_register_32(i.word)
                .filter(|rz| *rz == field(i.word, 21, 5))
                .and_then(|rz| adjust(rz, Adjustment::Not))
        },
    },
    Pattern {
        name: "ixh32",
        mask: 0xfc00_ffe0,
        value: 0xc400_0820,
        length: 4,
        build: |i| {
            same_register_32(i.word)
                .filter(|rz| *rz == field(i.word, 21, 5))
                .and_then(|rz| adjust(rz, Adjustment::TimesThree))
        },
    },
    Pattern {
        name: "ixw32",
        mask: 0xfc00_ffe0,
        value: 0xc400_0840,
        length: 4,
        build: |i| {
            same_register_32(i.word)
                .filter(|rz| *rz == field(i.word, 21, 5))
                .and_then(|rz| adjust(rz, Adjustment::TimesFive))
        },
    },
];

static ABIV1_PATTERNS: &[Pattern] = &[
    Pattern {
        name: "subi r0",
        mask: 0xfe0f,
        value: 0x2400,
        length: 2,
        build: |i| Some(Op::StackAdjust(u32::from(field(i.word, 4, 5)) + 1)),
    },
    Pattern {
        name: "st.w rz, (r0, disp)",
        mask: 0xf00f,
        value: 0x9000,
        length: 2,
        build: |i| {
            Some(Op::StoreWord {
                source: field(i.word, 8, 4),
                offset: u32::from(field(i.word, 4, 4)) << 2,
            })
        },
    },
    Pattern {
        name: "stm rf-r15, (r0)",
        mask: 0xfff0,
        value: 0x0070,
        length: 2,
        build: |i| {
            let first = field(i.word, 0, 4);
            (first != 0).then_some(Op::StoreMultiple {
                first,
                count: 16 - first,
            })
        },
    },
    Pattern {
        name: "mov r8, r0",
        mask: 0xffff,
        value: 0x1208,
        length: 2,
        build: |_| Some(Op::MoveFpSp),
    },
    Pattern {
        name: "subu r0, rx",
        mask: 0xff0f,
        value: 0x0500,
        length: 2,
        build: |i| {
            Some(Op::StackAdjustRegister {
                source: field(i.word, 4, 4),
            })
        },
    },
    Pattern {
        name: "addu rz, r15",
        mask: 0xfff0,
        value: 0x1cf0,
        length: 2,
        build: |i| {
            Some(Op::AddLinkRegister {
                destination: field(i.word, 0, 4),
            })
        },
    },
    Pattern {
        name: "mfcr",
        mask: 0xfe00,
        value: 0x1000,
        length: 2,
        build: |i| {
            Some(Op::MoveFromControl {
                destination: field(i.word, 0, 4),
                control: field(i.word, 4, 5),
            })
        },
    },
    Pattern {
        name: "rte",
        mask: 0xffff,
        value: 0x0002,
        length: 2,
        build: |_| Some(Op::ReturnFromException),
    },
    Pattern {
        name: "rfi",
        mask: 0xffff,
        value: 0x0003,
        length: 2,
        build: |_| Some(Op::ReturnFromInterrupt),
    },
    Pattern {
        name: "jmp",
        mask: 0xfff0,
        value: 0x00c0,
        length: 2,
        build: |i| {
            Some(Op::Jump {
                register: field(i.word, 0, 4),
            })
        },
    },
    Pattern {
        name: "br",
        mask: 0xf800,
        value: 0xf000,
        length: 2,
        build: |_| Some(Op::Branch),
    },
    Pattern {
        name: "bsr",
        mask: 0xf800,
        value: 0xf800,
        length: 2,
        build: |i| {
            if sign_extend(i.word & 0x7ff, 11) == 0 {
                Some(Op::BranchToNext)
            } else {
                Some(Op::Call)
            }
        },
    },
    Pattern {
        name: "jmpi",
        mask: 0xff00,
        value: 0x7000,
        length: 2,
        build: |_| Some(Op::Branch),
    },
    Pattern {
        name: "jsri",
        mask: 0xff00,
        value: 0x7f00,
        length: 2,
        build: |_| Some(Op::Call),
    },
    Pattern {
        name: "lrw",
        mask: 0xf000,
        value: 0x7000,
        length: 2,
        build: |i| {
            Some(Op::LoadLiteral {
                destination: field(i.word, 8, 4),
                address: (i.address + 2 + (u64::from(i.word & 0xff) << 2)) & !3,
            })
        },
    },
    Pattern {
        name: "movi",
        mask: 0xf800,
        value: 0x6000,
        length: 2,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 0, 4),
                value: u32::from(field(i.word, 4, 7)),
            })
        },
    },
    Pattern {
        name: "bgeni",
        mask: 0xfe00,
        value: 0x3200,
        length: 2,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 0, 4),
                value: 1 << field(i.word, 4, 5),
            })
        },
    },
    Pattern {
        name: "bmaski",
        mask: 0xfe00,
        value: 0x2c00,
        length: 2,
        build: |i| {
            Some(Op::LoadImmediate {
                destination: field(i.word, 0, 4),
                value: low_mask(u32::from(field(i.word, 4, 5))),
            })
        },
    },
    Pattern {
        name: "addi",
        mask: 0xfe00,
        value: 0x2000,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::Add(u32::from(field(i.word, 4, 5)) + 1),
            )
        },
    },
    Pattern {
        name: "subi",
        mask: 0xfe00,
        value: 0x2400,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::Subtract(u32::from(field(i.word, 4, 5)) + 1),
            )
        },
    },
    Pattern {
        name: "rsubi",
        mask: 0xfe00,
        value: 0x2800,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::ReverseSubtract(u32::from(field(i.word, 4, 5))),
            )
        },
    },
    Pattern {
        name: "not",
        mask: 0xfff0,
        value: 0x01f0,
        length: 2,
        build: |i| adjust(field(i.word, 0, 4), Adjustment::Not),
    },
    Pattern {
        name: "rotli",
        mask: 0xfe00,
        value: 0x3800,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::RotateLeft(u32::from(field(i.word, 4, 5))),
            )
        },
    },
    Pattern {
        name: "lsli",
        mask: 0xfe00,
        value: 0x3c00,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::ShiftLeft(u32::from(field(i.word, 4, 5))),
            )
        },
    },
    Pattern {
        name: "bseti",
        mask: 0xfe00,
        value: 0x3400,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::BitSet(u32::from(field(i.word, 4, 5))),
            )
        },
    },
    Pattern {
        name: "bclri",
        mask: 0xfe00,
        value: 0x3000,
        length: 2,
        build: |i| {
            adjust(
                field(i.word, 0, 4),
                Adjustment::BitClear(u32::from(field(i.word, 4, 5))),
            )
        },
    },
    Pattern {
        name: "ixh",
        mask: 0xff00,
        value: 0x1d00,
        length: 2,
        build: |i| {
            let rd = field(i.word, 0, 4);
            (rd == field(i.word, 4, 4))
                .then(|| adjust(rd, Adjustment::TimesThree))
                .flatten()
        },
    },
    Pattern {
        name: "ixw",
        mask: 0xff00,
        value: 0x1500,
        length: 2,
        build: |i| {
            let rd = field(i.word, 0, 4);
            (rd == field(i.word, 4, 4))
                .then(|| adjust(rd, Adjustment::TimesFive))
                .flatten()
        },
    },
];

/// Decode the operation performed by `instruction`.
///
/// Returns `None` for instructions that play no role in frame analysis.
pub fn decode(variant: &ArchitectureVariant, instruction: &Instruction) -> Option<Op> {
    let table = match variant.abi() {
        AbiRevision::V1 => ABIV1_PATTERNS,
        AbiRevision::V2 => ABIV2_PATTERNS,
    };

    table
        .iter()
        .filter(|pattern| {
            pattern.length == instruction.length && instruction.word & pattern.mask == pattern.value
        })
        .find_map(|pattern| {
            let op = (pattern.build)(instruction)?;
            tracing::trace!(
                "{:#010x}: {} -> {:?}",
                instruction.address,
                pattern.name,
                op
            );
            Some(op)
        })
}
