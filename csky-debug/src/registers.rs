//! Core registers are described by [`CoreRegister`] and collected in a
//! [`RegisterModel`]. The fixed roles of each ABI revision (stack pointer,
//! argument registers, ...) live in a [`RegisterFile`].

use std::{borrow::Cow, cmp::Ordering};

use serde::{Deserialize, Serialize};

use crate::{
    architecture::{AbiRevision, ArchitectureVariant},
    error::Error,
};

pub mod abiv1;
pub mod abiv2;

/// Number of registers in each of the control register banks 1 to 3.
pub(crate) const EXTENDED_BANK_SIZE: usize = 96;

/// The location of a CPU register. This is not an address, but the dense
/// register number used throughout the debugger.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterId(pub u16);

impl From<RegisterId> for u32 {
    fn from(value: RegisterId) -> Self {
        u32::from(value.0)
    }
}

impl From<u16> for RegisterId {
    fn from(value: u16) -> Self {
        RegisterId(value)
    }
}

/// The type of data stored in a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterDataType {
    /// 32-bit integer.
    Int32,
    /// Address of code.
    CodePointer,
    /// Address of data.
    DataPointer,
    /// 64-bit floating point.
    Float64,
    /// 128-bit vector.
    Vector128,
    /// 48-bit profiling counter.
    Counter48,
    /// 64-bit profiling counter.
    Counter64,
}

impl RegisterDataType {
    /// Size of the register, in bits.
    pub fn size_in_bits(self) -> usize {
        match self {
            RegisterDataType::Int32
            | RegisterDataType::CodePointer
            | RegisterDataType::DataPointer => 32,
            RegisterDataType::Float64 | RegisterDataType::Counter64 => 64,
            RegisterDataType::Counter48 => 48,
            RegisterDataType::Vector128 => 128,
        }
    }

    /// Size of the register, in bytes.
    pub fn size_in_bytes(self) -> usize {
        self.size_in_bits().div_ceil(8)
    }

    /// A zero value of the matching width.
    pub fn zero(self) -> RegisterValue {
        match self.size_in_bits() {
            32 => RegisterValue::U32(0),
            128 => RegisterValue::U128(0),
            _ => RegisterValue::U64(0),
        }
    }
}

/// Register groups used when listing or saving registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterGroup {
    /// General purpose registers, hi/lo and the program counter.
    General,
    /// Control registers.
    Control,
    /// Floating point registers and their control registers.
    Float,
    /// Vector registers.
    Vector,
    /// Memory management unit registers.
    Mmu,
    /// Profiling counters.
    Profiling,
    /// Every named register.
    All,
    /// Registers saved across an injected call.
    Save,
    /// Registers restored after an injected call.
    Restore,
}

/// Describes a register with its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreRegister {
    /// Display name. Reserved slots have an empty name.
    pub name: Cow<'static, str>,
    /// Register number.
    pub id: RegisterId,
    /// Type of the value.
    pub data_type: RegisterDataType,
    /// The group the register belongs to.
    pub group: RegisterGroup,
}

impl CoreRegister {
    /// Get the display name of this register.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this slot is reserved.
    pub fn is_reserved(&self) -> bool {
        self.name.is_empty()
    }

    /// Get the size, in bytes, of this register.
    pub fn size_in_bytes(&self) -> usize {
        self.data_type.size_in_bytes()
    }
}

impl From<&CoreRegister> for RegisterId {
    fn from(register: &CoreRegister) -> RegisterId {
        register.id
    }
}

/// A value of a core register
///
/// Creating a new `RegisterValue` should be done using From or Into.
/// Converting a value back to a primitive type can be done with either
/// a match arm or TryFrom.
#[derive(Debug, Clone, Copy)]
pub enum RegisterValue {
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer, used for 48 and 64-bit counters and doubles
    U64(u64),
    /// 128-bit unsigned integer, used for vector registers
    U128(u128),
}

impl RegisterValue {
    /// A helper function to increment an address by a fixed number of bytes.
    pub fn increment_address(&mut self, bytes: usize) -> Result<(), Error> {
        let current = self.to_string();
        let overflow = || {
            Error::Register(format!(
                "Overflow error: Attempting to add {bytes} bytes to register value {current}"
            ))
        };

        match self {
            RegisterValue::U32(value) => {
                *value = u32::try_from(bytes)
                    .ok()
                    .and_then(|bytes| value.checked_add(bytes))
                    .ok_or_else(overflow)?;
            }
            RegisterValue::U64(value) => {
                *value = value.checked_add(bytes as u64).ok_or_else(overflow)?;
            }
            RegisterValue::U128(value) => {
                *value = value.checked_add(bytes as u128).ok_or_else(overflow)?;
            }
        }

        Ok(())
    }

    /// A helper function to determine if the contained register value is zero.
    pub fn is_zero(&self) -> bool {
        matches!(
            self,
            RegisterValue::U32(0) | RegisterValue::U64(0) | RegisterValue::U128(0)
        )
    }

    /// The value widened to 128 bits.
    pub fn as_u128(&self) -> u128 {
        match self {
            RegisterValue::U32(value) => u128::from(*value),
            RegisterValue::U64(value) => u128::from(*value),
            RegisterValue::U128(value) => *value,
        }
    }

    /// Build a value of the width of `data_type`, truncating wider input.
    pub fn for_type(data_type: RegisterDataType, value: u128) -> Self {
        match data_type.size_in_bits() {
            32 => RegisterValue::U32(value as u32),
            128 => RegisterValue::U128(value),
            48 => RegisterValue::U64(value as u64 & 0xffff_ffff_ffff),
            _ => RegisterValue::U64(value as u64),
        }
    }
}

impl Default for RegisterValue {
    fn default() -> Self {
        // Smallest data storage as default.
        RegisterValue::U32(0_u32)
    }
}

impl PartialOrd for RegisterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_u128().partial_cmp(&other.as_u128())
    }
}

impl PartialEq for RegisterValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_u128() == other.as_u128()
    }
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RegisterValue::U32(register_value) => write!(f, "{register_value:#010x}"),
            RegisterValue::U64(register_value) => write!(f, "{register_value:#018x}"),
            RegisterValue::U128(register_value) => write!(f, "{register_value:#034x}"),
        }
    }
}

impl From<u32> for RegisterValue {
    fn from(val: u32) -> Self {
        Self::U32(val)
    }
}

impl From<u64> for RegisterValue {
    fn from(val: u64) -> Self {
        Self::U64(val)
    }
}

impl From<u128> for RegisterValue {
    fn from(val: u128) -> Self {
        Self::U128(val)
    }
}

impl TryFrom<RegisterValue> for u32 {
    type Error = Error;

    fn try_from(value: RegisterValue) -> Result<Self, Self::Error> {
        u32::try_from(value.as_u128())
            .map_err(|_| Error::Register(format!("Value '{value}' too large for u32")))
    }
}

impl TryFrom<RegisterValue> for u64 {
    type Error = Error;

    fn try_from(value: RegisterValue) -> Result<Self, Self::Error> {
        u64::try_from(value.as_u128())
            .map_err(|_| Error::Register(format!("Value '{value}' too large for u64")))
    }
}

impl From<RegisterValue> for u128 {
    fn from(value: RegisterValue) -> Self {
        value.as_u128()
    }
}

/// A contiguous run of register numbers sharing type and group.
#[derive(Debug, PartialEq)]
pub(crate) struct RegisterRange {
    pub(crate) first: u16,
    pub(crate) count: u16,
    pub(crate) data_type: RegisterDataType,
    pub(crate) group: RegisterGroup,
}

impl RegisterRange {
    pub(crate) const fn new(
        first: u16,
        count: u16,
        data_type: RegisterDataType,
        group: RegisterGroup,
    ) -> Self {
        Self {
            first,
            count,
            data_type,
            group,
        }
    }

    fn contains(&self, id: RegisterId) -> bool {
        id.0 >= self.first && id.0 - self.first < self.count
    }
}

/// Register numbering and fixed register roles of one ABI revision.
#[derive(Debug, PartialEq)]
pub struct RegisterFile {
    pub(crate) abi: AbiRevision,

    /// Names of every slot, including the extended control register banks.
    pub(crate) names: &'static [&'static str],

    /// Number of registers without the extended control register banks.
    pub(crate) base_count: usize,

    pub(crate) layout: &'static [RegisterRange],

    pub(crate) program_counter: RegisterId,

    pub(crate) stack_pointer: RegisterId,

    pub(crate) return_address: RegisterId,

    pub(crate) frame_pointer: RegisterId,

    pub(crate) argument_registers: &'static [RegisterId],

    pub(crate) result_registers: &'static [RegisterId],

    /// Register number of `cr0`.
    pub(crate) control_base: u16,

    pub(crate) hi: RegisterId,

    pub(crate) lo: RegisterId,
}

impl RegisterFile {
    /// The register file of an ABI revision.
    pub fn for_abi(abi: AbiRevision) -> &'static RegisterFile {
        match abi {
            AbiRevision::V1 => &abiv1::REGISTER_FILE,
            AbiRevision::V2 => &abiv2::REGISTER_FILE,
        }
    }

    /// The ABI revision.
    pub fn abi(&self) -> AbiRevision {
        self.abi
    }

    /// Number of register slots.
    pub fn register_count(&self, extended_control_bank: bool) -> usize {
        if extended_control_bank {
            self.base_count + EXTENDED_BANK_SIZE
        } else {
            self.base_count
        }
    }

    /// The program counter.
    pub fn program_counter(&self) -> RegisterId {
        self.program_counter
    }

    /// The stack pointer.
    pub fn stack_pointer(&self) -> RegisterId {
        self.stack_pointer
    }

    /// The link register.
    pub fn return_address(&self) -> RegisterId {
        self.return_address
    }

    /// The frame pointer.
    pub fn frame_pointer(&self) -> RegisterId {
        self.frame_pointer
    }

    /// The registers used to pass arguments, in order.
    pub fn argument_registers(&self) -> &'static [RegisterId] {
        self.argument_registers
    }

    /// The registers holding return values, in order.
    pub fn result_registers(&self) -> &'static [RegisterId] {
        self.result_registers
    }

    /// The register number of control register `crN` in bank 0.
    pub fn control_register(&self, index: u16) -> RegisterId {
        RegisterId(self.control_base + index)
    }

    /// The processor status register.
    pub fn psr(&self) -> RegisterId {
        self.control_register(CR_PSR)
    }

    /// The exception PSR save register.
    pub fn epsr(&self) -> RegisterId {
        self.control_register(CR_EPSR)
    }

    /// The fast interrupt PSR save register.
    pub fn fpsr(&self) -> RegisterId {
        self.control_register(CR_FPSR)
    }

    /// The exception PC save register.
    pub fn epc(&self) -> RegisterId {
        self.control_register(CR_EPC)
    }

    /// The fast interrupt PC save register.
    pub fn fpc(&self) -> RegisterId {
        self.control_register(CR_FPC)
    }

    /// The multiply/divide high result register.
    pub fn hi(&self) -> RegisterId {
        self.hi
    }

    /// The multiply/divide low result register.
    pub fn lo(&self) -> RegisterId {
        self.lo
    }

    /// The name of a slot, empty for reserved slots.
    pub fn name(&self, id: RegisterId) -> &'static str {
        self.names.get(usize::from(id.0)).copied().unwrap_or("")
    }

    /// The type of a slot in the built-in layout.
    pub fn data_type(&self, id: RegisterId) -> Option<RegisterDataType> {
        self.describe(id).map(|register| register.data_type)
    }

    fn describe(&self, id: RegisterId) -> Option<CoreRegister> {
        let name = self.names.get(usize::from(id.0))?;

        let (data_type, group) = if usize::from(id.0) >= self.base_count {
            (RegisterDataType::Int32, RegisterGroup::Control)
        } else {
            self.layout
                .iter()
                .find(|range| range.contains(id))
                .map(|range| (range.data_type, range.group))?
        };

        let data_type = if id == self.program_counter || id == self.return_address {
            RegisterDataType::CodePointer
        } else if id == self.stack_pointer || id == self.frame_pointer {
            RegisterDataType::DataPointer
        } else {
            data_type
        };

        Some(CoreRegister {
            name: Cow::Borrowed(*name),
            id,
            data_type,
            group,
        })
    }
}

/// Control register numbers within bank 0.
pub(crate) const CR_PSR: u16 = 0;
pub(crate) const CR_EPSR: u16 = 2;
pub(crate) const CR_FPSR: u16 = 3;
pub(crate) const CR_EPC: u16 = 4;
pub(crate) const CR_FPC: u16 = 5;

bitfield::bitfield! {
    /// The processor status register.
    #[derive(Copy, Clone)]
    pub struct Psr(u32);
    impl Debug;
    /// Supervisor mode.
    pub s, _: 31;
    /// Trace mode.
    pub tm, _: 15, 14;
    /// Exception vector number of the active exception.
    pub vec, _: 23, 16;
    /// Condition flag.
    pub c, _: 0;
    /// Interrupts enabled.
    pub ie, _: 6;
    /// Fast interrupts enabled.
    pub fe, _: 4;
    /// Exceptions enabled.
    pub ee, _: 8;
}

/// The registers of one target, with names, types and groups.
#[derive(Debug, Clone)]
pub struct RegisterModel {
    /// Sorted by register number.
    registers: Vec<CoreRegister>,
    file: &'static RegisterFile,
    from_target: bool,
}

impl RegisterModel {
    /// The built-in register model of the variant.
    pub fn new(variant: &ArchitectureVariant) -> Self {
        let file = variant.register_file();
        let registers = (0..variant.register_count())
            .filter_map(|index| u16::try_from(index).ok())
            .filter_map(|index| file.describe(RegisterId(index)))
            .collect();

        Self {
            registers,
            file,
            from_target: false,
        }
    }

    /// A register model supplied by the target.
    ///
    /// Names, types and groups come entirely from the description; only
    /// the fixed register roles are taken from the ABI revision.
    pub fn from_target_description(
        variant: &ArchitectureVariant,
        mut registers: Vec<CoreRegister>,
    ) -> Self {
        registers.sort_by_key(|register| register.id);
        registers.dedup_by_key(|register| register.id);

        tracing::debug!(
            "Using target supplied description with {} registers",
            registers.len()
        );

        Self {
            registers,
            file: variant.register_file(),
            from_target: true,
        }
    }

    /// Whether the model came from a target description.
    pub fn is_from_target(&self) -> bool {
        self.from_target
    }

    /// The fixed register roles.
    pub fn file(&self) -> &'static RegisterFile {
        self.file
    }

    /// Number of register slots.
    pub fn len(&self) -> usize {
        self.registers
            .last()
            .map(|register| usize::from(register.id.0) + 1)
            .unwrap_or(0)
    }

    /// Whether the model has no registers.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// All register descriptors, sorted by number.
    pub fn registers(&self) -> impl Iterator<Item = &CoreRegister> {
        self.registers.iter()
    }

    /// Look up a register by number.
    pub fn register(&self, id: RegisterId) -> Option<&CoreRegister> {
        self.registers
            .binary_search_by_key(&id, |register| register.id)
            .ok()
            .map(|index| &self.registers[index])
    }

    /// Look up a register by name.
    pub fn register_by_name(&self, name: &str) -> Option<&CoreRegister> {
        if name.is_empty() {
            return None;
        }
        self.registers.iter().find(|register| register.name == name)
    }

    /// The display name of a register, empty for reserved and unknown slots.
    pub fn name(&self, id: RegisterId) -> &str {
        self.register(id).map(CoreRegister::name).unwrap_or("")
    }

    /// The type of a register.
    pub fn data_type(&self, id: RegisterId) -> Result<RegisterDataType, Error> {
        self.register(id)
            .map(|register| register.data_type)
            .ok_or(Error::UnknownRegister(id))
    }

    /// Whether a register belongs to a group.
    pub fn in_group(&self, id: RegisterId, group: RegisterGroup) -> bool {
        let Some(register) = self.register(id) else {
            return false;
        };

        if register.is_reserved() {
            return false;
        }

        match group {
            RegisterGroup::All => true,
            RegisterGroup::Save | RegisterGroup::Restore => {
                register.group != RegisterGroup::Profiling
            }
            group => register.group == group,
        }
    }

    /// Map a DWARF register number to a register.
    ///
    /// DWARF numbers coincide with register numbers up to the program counter.
    pub fn dwarf_to_register(&self, dwarf: u16) -> Option<RegisterId> {
        let id = RegisterId(dwarf);
        if id > self.file.program_counter {
            return None;
        }

        self.register(id)
            .filter(|register| !register.is_reserved())
            .map(|register| register.id)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::architecture::{CpuFamily, Endian};

    fn model(family: CpuFamily) -> RegisterModel {
        RegisterModel::new(&ArchitectureVariant::new(family, Endian::Little))
    }

    #[test_case(CpuFamily::Ck8xx, 176; "abiv2")]
    #[test_case(CpuFamily::Ck610, 148; "abiv1")]
    fn register_count(family: CpuFamily, expected: usize) {
        assert_eq!(model(family).len(), expected);
    }

    #[test]
    fn extended_bank_appends_control_registers() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little)
            .with_extended_control_bank(true);
        let model = RegisterModel::new(&variant);

        assert_eq!(model.len(), 272);
        assert_eq!(model.name(RegisterId(176)), "cr0_b1");
        assert_eq!(model.name(RegisterId(271)), "cr31_b3");
        assert!(model.in_group(RegisterId(200), RegisterGroup::Control));
    }

    #[test_case(CpuFamily::Ck8xx, 14, "r14", RegisterDataType::DataPointer; "abiv2 sp")]
    #[test_case(CpuFamily::Ck8xx, 15, "r15", RegisterDataType::CodePointer; "abiv2 lr")]
    #[test_case(CpuFamily::Ck8xx, 72, "pc", RegisterDataType::CodePointer; "abiv2 pc")]
    #[test_case(CpuFamily::Ck8xx, 40, "fr0", RegisterDataType::Float64; "abiv2 fr0")]
    #[test_case(CpuFamily::Ck8xx, 71, "vr15", RegisterDataType::Vector128; "abiv2 vr15")]
    #[test_case(CpuFamily::Ck8xx, 93, "epc", RegisterDataType::Int32; "abiv2 epc")]
    #[test_case(CpuFamily::Ck8xx, 150, "profgr6", RegisterDataType::Counter48; "abiv2 profgr")]
    #[test_case(CpuFamily::Ck8xx, 175, "profar15", RegisterDataType::Counter64; "abiv2 profar")]
    #[test_case(CpuFamily::Ck610, 0, "r0", RegisterDataType::DataPointer; "abiv1 sp")]
    #[test_case(CpuFamily::Ck610, 64, "pc", RegisterDataType::CodePointer; "abiv1 pc")]
    #[test_case(CpuFamily::Ck610, 69, "epc", RegisterDataType::Int32; "abiv1 epc")]
    fn descriptors(family: CpuFamily, id: u16, name: &str, data_type: RegisterDataType) {
        let model = model(family);
        let register = model.register(RegisterId(id)).unwrap();

        assert_eq!(register.name(), name);
        assert_eq!(register.data_type, data_type);
    }

    #[test]
    fn reserved_slots_have_no_name() {
        let model = model(CpuFamily::Ck8xx);

        assert_eq!(model.name(RegisterId(32)), "");
        assert!(!model.in_group(RegisterId(32), RegisterGroup::All));
        assert!(model.register_by_name("").is_none());
    }

    #[test]
    fn derived_groups() {
        let model = model(CpuFamily::Ck8xx);
        let profgr0 = model.register_by_name("profgr0").unwrap().id;

        assert!(model.in_group(profgr0, RegisterGroup::All));
        assert!(model.in_group(profgr0, RegisterGroup::Profiling));
        assert!(!model.in_group(profgr0, RegisterGroup::Save));
        assert!(model.in_group(abiv2::R4, RegisterGroup::Save));
        assert!(model.in_group(abiv2::R4, RegisterGroup::Restore));
        assert!(!model.in_group(abiv2::R4, RegisterGroup::Float));
    }

    #[test_case(0, Some(0); "r0")]
    #[test_case(37, Some(37); "lo")]
    #[test_case(33, None; "reserved")]
    #[test_case(72, Some(72); "pc")]
    #[test_case(89, None; "beyond pc")]
    fn dwarf_mapping(dwarf: u16, expected: Option<u16>) {
        assert_eq!(
            model(CpuFamily::Ck8xx).dwarf_to_register(dwarf),
            expected.map(RegisterId)
        );
    }

    #[test]
    fn target_description_replaces_tables() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let model = RegisterModel::from_target_description(
            &variant,
            vec![
                CoreRegister {
                    name: "pc".into(),
                    id: RegisterId(72),
                    data_type: RegisterDataType::CodePointer,
                    group: RegisterGroup::General,
                },
                CoreRegister {
                    name: "a0".into(),
                    id: RegisterId(0),
                    data_type: RegisterDataType::Int32,
                    group: RegisterGroup::General,
                },
            ],
        );

        assert!(model.is_from_target());
        assert_eq!(model.name(RegisterId(0)), "a0");
        assert_eq!(model.name(RegisterId(1)), "");
        assert_eq!(model.len(), 73);
        assert!(matches!(
            model.data_type(RegisterId(5)),
            Err(Error::UnknownRegister(RegisterId(5)))
        ));
    }

    #[test]
    fn register_value_conversions() {
        let value = RegisterValue::U64(0x1_0000_0000);
        assert!(u32::try_from(value).is_err());
        assert_eq!(u64::try_from(value).unwrap(), 0x1_0000_0000);
        assert_eq!(RegisterValue::U32(5), RegisterValue::U128(5));

        let mut address = RegisterValue::U32(u32::MAX - 1);
        assert!(address.increment_address(1).is_ok());
        assert!(address.increment_address(1).is_err());
    }

    #[test]
    fn psr_fields() {
        let psr = Psr(0x8000_0141);

        assert!(psr.s());
        assert!(psr.ie());
        assert!(psr.ee());
        assert!(psr.c());
        assert!(!psr.fe());
    }
}
