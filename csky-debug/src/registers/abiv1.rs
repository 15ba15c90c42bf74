//! Register numbering of ABI revision 1 (CK510 and CK610).

use super::{RegisterFile, RegisterId, RegisterRange};
use crate::{
    architecture::AbiRevision,
    registers::{RegisterDataType as Type, RegisterGroup as Group},
};

/// Stack pointer.
pub const SP: RegisterId = RegisterId(0);
/// General purpose register 1.
pub const R1: RegisterId = RegisterId(1);
/// First argument and result register.
pub const R2: RegisterId = RegisterId(2);
/// Second argument and result register.
pub const R3: RegisterId = RegisterId(3);
/// Third argument register.
pub const R4: RegisterId = RegisterId(4);
/// Fourth argument register.
pub const R5: RegisterId = RegisterId(5);
/// Fifth argument register.
pub const R6: RegisterId = RegisterId(6);
/// Last argument register.
pub const R7: RegisterId = RegisterId(7);
/// Frame pointer.
pub const FP: RegisterId = RegisterId(8);
/// Global base register used by PIC code.
pub const GB: RegisterId = RegisterId(14);
/// Link register.
pub const LR: RegisterId = RegisterId(15);
/// First floating point register.
pub const FR0: RegisterId = RegisterId(32);
/// High word of multiply results.
pub const HI: RegisterId = RegisterId(48);
/// Low word of multiply results.
pub const LO: RegisterId = RegisterId(49);
/// Program counter.
pub const PC: RegisterId = RegisterId(64);
/// Processor status register.
pub const PSR: RegisterId = RegisterId(65);
/// Status register saved on exception entry.
pub const EPSR: RegisterId = RegisterId(67);
/// Status register saved on fast interrupt entry.
pub const FPSR: RegisterId = RegisterId(68);
/// Return address saved on exception entry.
pub const EPC: RegisterId = RegisterId(69);
/// Return address saved on fast interrupt entry.
pub const FPC: RegisterId = RegisterId(70);
/// Floating point unit identification.
pub const FID: RegisterId = RegisterId(97);
/// Floating point control register.
pub const FCR: RegisterId = RegisterId(98);
/// Floating point exception status register.
pub const FESR: RegisterId = RegisterId(99);

static NAMES: [&str; 244] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
    "ar0", "ar1", "ar2", "ar3", "ar4", "ar5", "ar6", "ar7",
    "ar8", "ar9", "ar10", "ar11", "ar12", "ar13", "ar14", "ar15",
    "fr0", "fr1", "fr2", "fr3", "fr4", "fr5", "fr6", "fr7",
    "fr8", "fr9", "fr10", "fr11", "fr12", "fr13", "fr14", "fr15",
    "hi", "lo", "", "", "", "", "", "",
    "", "", "", "", "", "", "", "",
    "pc", "psr", "vbr", "epsr", "fpsr", "epc", "fpc", "ss0",
    "ss1", "ss2", "ss3", "ss4", "gcr", "gsr", "cpuid", "dcsr",
    "cwr", "dcr", "cfr", "ccr", "capr", "pacr", "prsr", "cr22",
    "cr23", "cr24", "cr25", "cr26", "cr27", "cr28", "cr29", "cr30",
    "cr31", "fid", "fcr", "fesr", "mir", "mrr", "mel0", "mel1",
    "meh", "mcr", "mpr", "mwr", "mcir", "mpgd", "msa0", "msa1",
    "profcr0", "profcr1", "profcr2", "profcr3", "profgr0", "profgr1", "profgr2", "profgr3",
    "profgr4", "profgr5", "profgr6", "profgr7", "profgr8", "profgr9", "profgr10", "profgr11",
    "profgr12", "profgr13", "profgr14", "profgr15", "profar0", "profar1", "profar2", "profar3",
    "profar4", "profar5", "profar6", "profar7", "profar8", "profar9", "profar10", "profar11",
    "profar12", "profar13", "profar14", "profar15", "cr0_b1", "cr1_b1", "cr2_b1", "cr3_b1",
    "cr4_b1", "cr5_b1", "cr6_b1", "cr7_b1", "cr8_b1", "cr9_b1", "cr10_b1", "cr11_b1",
    "cr12_b1", "cr13_b1", "cr14_b1", "cr15_b1", "cr16_b1", "cr17_b1", "cr18_b1", "cr19_b1",
    "cr20_b1", "cr21_b1", "cr22_b1", "cr23_b1", "cr24_b1", "cr25_b1", "cr26_b1", "cr27_b1",
    "cr28_b1", "cr29_b1", "cr30_b1", "cr31_b1", "cr0_b2", "cr1_b2", "cr2_b2", "cr3_b2",
    "cr4_b2", "cr5_b2", "cr6_b2", "cr7_b2", "cr8_b2", "cr9_b2", "cr10_b2", "cr11_b2",
    "cr12_b2", "cr13_b2", "cr14_b2", "cr15_b2", "cr16_b2", "cr17_b2", "cr18_b2", "cr19_b2",
    "cr20_b2", "cr21_b2", "cr22_b2", "cr23_b2", "cr24_b2", "cr25_b2", "cr26_b2", "cr27_b2",
    "cr28_b2", "cr29_b2", "cr30_b2", "cr31_b2", "cr0_b3", "cr1_b3", "cr2_b3", "cr3_b3",
    "cr4_b3", "cr5_b3", "cr6_b3", "cr7_b3", "cr8_b3", "cr9_b3", "cr10_b3", "cr11_b3",
    "cr12_b3", "cr13_b3", "cr14_b3", "cr15_b3", "cr16_b3", "cr17_b3", "cr18_b3", "cr19_b3",
    "cr20_b3", "cr21_b3", "cr22_b3", "cr23_b3", "cr24_b3", "cr25_b3", "cr26_b3", "cr27_b3",
    "cr28_b3", "cr29_b3", "cr30_b3", "cr31_b3",];

pub(crate) static REGISTER_FILE: RegisterFile = RegisterFile {
    abi: AbiRevision::V1,
    names: &NAMES,
    base_count: 148,
    layout: &[
        RegisterRange::new(0, 32, Type::Int32, Group::General),
        RegisterRange::new(32, 16, Type::Float64, Group::Float),
        RegisterRange::new(48, 16, Type::Int32, Group::General),
        RegisterRange::new(64, 1, Type::CodePointer, Group::General),
        RegisterRange::new(65, 32, Type::Int32, Group::Control),
        RegisterRange::new(97, 3, Type::Int32, Group::Float),
        RegisterRange::new(100, 12, Type::Int32, Group::Mmu),
        RegisterRange::new(112, 4, Type::Int32, Group::Profiling),
        RegisterRange::new(116, 16, Type::Counter48, Group::Profiling),
        RegisterRange::new(132, 16, Type::Counter64, Group::Profiling),
    ],
    program_counter: PC,
    stack_pointer: SP,
    return_address: LR,
    frame_pointer: FP,
    argument_registers: &[R2, R3, R4, R5, R6, R7],
    result_registers: &[R2, R3],
    control_base: 65,
    hi: HI,
    lo: LO,
};
