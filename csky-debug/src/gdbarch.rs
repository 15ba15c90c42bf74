//! The architecture descriptor handed to the debugger core.

use crate::{
    architecture::ArchitectureVariant,
    breakpoint::{self, BreakpointEncoding, BreakpointPlacement},
    calling_convention::{self, CallSetup, ReturnValueConvention},
    config::ArchConfig,
    error::Error,
    frame::{self, FrameCache},
    memory::MemoryInterface,
    prologue,
    registers::{CoreRegister, RegisterId, RegisterModel},
    regset::{self, RegsetKind},
    target::{RegisterInterface, SymbolLookup},
};

/// Everything a debugger needs to know about one C-SKY target.
///
/// Built once per binary or target; every operation is parameterized by the
/// [`ArchitectureVariant`] it holds.
#[derive(Debug, Clone)]
pub struct ArchDescriptor {
    variant: ArchitectureVariant,
    registers: RegisterModel,
    breakpoint: BreakpointEncoding,
}

impl ArchDescriptor {
    /// The descriptor of a variant, using the built-in register model.
    pub fn new(variant: ArchitectureVariant) -> Self {
        let registers = RegisterModel::new(&variant);

        Self::with_registers(variant, registers)
    }

    /// The descriptor of a variant whose registers are described by the target.
    pub fn with_target_description(
        variant: ArchitectureVariant,
        registers: Vec<CoreRegister>,
    ) -> Self {
        let registers = RegisterModel::from_target_description(&variant, registers);

        Self::with_registers(variant, registers)
    }

    fn with_registers(variant: ArchitectureVariant, registers: RegisterModel) -> Self {
        let breakpoint = BreakpointEncoding::for_variant(&variant);

        tracing::info!(
            "Using {:?} ({}), {:?} endian, {} registers, {:?} breakpoints",
            variant.family(),
            variant.abi(),
            variant.endian(),
            registers.len(),
            breakpoint
        );

        Self {
            variant,
            registers,
            breakpoint,
        }
    }

    /// The descriptor for an ELF binary.
    pub fn for_binary(elf: &[u8], config: &ArchConfig) -> Result<Self, Error> {
        Ok(Self::new(ArchitectureVariant::from_elf(elf, config)?))
    }

    /// The descriptor for a target without a binary.
    pub fn for_raw_target(config: &ArchConfig) -> Result<Self, Error> {
        Ok(Self::new(ArchitectureVariant::for_raw_target(config)?))
    }

    /// The architecture variant.
    pub fn variant(&self) -> &ArchitectureVariant {
        &self.variant
    }

    /// The register model.
    pub fn registers(&self) -> &RegisterModel {
        &self.registers
    }

    /// The number of register slots.
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// The program counter.
    pub fn pc_register(&self) -> RegisterId {
        self.registers.file().program_counter()
    }

    /// The stack pointer.
    pub fn sp_register(&self) -> RegisterId {
        self.registers.file().stack_pointer()
    }

    /// Instructions start on 2-byte boundaries.
    pub fn instruction_alignment(&self) -> u64 {
        2
    }

    /// The software breakpoint encoding.
    pub fn breakpoint_encoding(&self) -> BreakpointEncoding {
        self.breakpoint
    }

    /// Map a DWARF register number to a register.
    pub fn dwarf_to_register(&self, dwarf: u16) -> Option<RegisterId> {
        self.registers.dwarf_to_register(dwarf)
    }

    /// Align a stack pointer for a dummy frame.
    pub fn frame_align(&self, sp: u64) -> u64 {
        calling_convention::frame_align(&self.variant, sp)
    }

    /// The breakpoint length needed at `address`.
    pub fn breakpoint_length(
        &self,
        memory: &mut dyn MemoryInterface,
        address: u64,
    ) -> Result<u8, Error> {
        breakpoint::breakpoint_length(memory, &self.variant, address)
    }

    /// Insert a software breakpoint.
    pub fn insert_breakpoint(
        &self,
        memory: &mut dyn MemoryInterface,
        address: u64,
    ) -> Result<BreakpointPlacement, Error> {
        breakpoint::insert(memory, &self.variant, address)
    }

    /// Remove a software breakpoint.
    pub fn remove_breakpoint(
        &self,
        memory: &mut dyn MemoryInterface,
        placement: &BreakpointPlacement,
    ) -> Result<(), Error> {
        breakpoint::remove(memory, placement)
    }

    /// Step over a breakpoint compiled into the program at the program counter.
    pub fn skip_permanent_breakpoint(
        &self,
        memory: &mut dyn MemoryInterface,
        registers: &mut dyn RegisterInterface,
    ) -> Result<bool, Error> {
        breakpoint::skip_permanent_breakpoint(memory, registers, &self.variant)
    }

    /// Build the unwind information of the frame executing at `pc`.
    pub fn frame_cache(
        &self,
        memory: &mut dyn MemoryInterface,
        registers: &mut dyn RegisterInterface,
        symbols: &dyn SymbolLookup,
        pc: u64,
    ) -> Result<FrameCache, Error> {
        FrameCache::analyze(memory, registers, symbols, &self.variant, pc)
    }

    /// The first address after the prologue of a function.
    pub fn skip_prologue(
        &self,
        memory: &mut dyn MemoryInterface,
        symbols: &dyn SymbolLookup,
        function_start: u64,
    ) -> Result<u64, Error> {
        prologue::skip_prologue(memory, &self.variant, symbols, function_start)
    }

    /// Whether the instruction at `pc` leaves the function.
    pub fn stack_frame_destroyed(
        &self,
        memory: &mut dyn MemoryInterface,
        pc: u64,
    ) -> Result<bool, Error> {
        frame::stack_frame_destroyed(memory, &self.variant, pc)
    }

    /// Place the arguments of an injected call, returning the new stack pointer.
    pub fn prepare_call(
        &self,
        memory: &mut dyn MemoryInterface,
        registers: &mut dyn RegisterInterface,
        setup: &CallSetup,
    ) -> Result<u64, Error> {
        calling_convention::prepare_call(memory, registers, &self.variant, setup)
    }

    /// How a value of `length` bytes is returned.
    pub fn return_value_convention(&self, length: usize) -> ReturnValueConvention {
        calling_convention::return_value_convention(length)
    }

    /// Read a value returned in registers.
    pub fn read_return_value(
        &self,
        registers: &mut dyn RegisterInterface,
        length: usize,
    ) -> Result<Option<Vec<u8>>, Error> {
        calling_convention::read_return_value(registers, &self.variant, length)
    }

    /// Store a value to be returned.
    pub fn write_return_value(
        &self,
        registers: &mut dyn RegisterInterface,
        value: &[u8],
    ) -> Result<ReturnValueConvention, Error> {
        calling_convention::write_return_value(registers, &self.variant, value)
    }

    /// Load registers from a register set image.
    pub fn supply_regset(
        &self,
        registers: &mut dyn RegisterInterface,
        kind: RegsetKind,
        image: &[u8],
    ) -> Result<(), Error> {
        regset::supply_regset(registers, &self.variant, kind, image)
    }

    /// Build a register set image.
    pub fn collect_regset(
        &self,
        registers: &mut dyn RegisterInterface,
        kind: RegsetKind,
    ) -> Vec<u8> {
        regset::collect_regset(registers, &self.variant, kind)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        architecture::{AbiRevision, CpuFamily, Endian},
        registers::{abiv1, abiv2, RegisterDataType, RegisterGroup},
    };

    #[test]
    fn raw_target_defaults_to_modern_abi() {
        let arch = ArchDescriptor::for_raw_target(&ArchConfig::default()).unwrap();

        assert_eq!(arch.variant().abi(), AbiRevision::V2);
        assert_eq!(arch.register_count(), 176);
        assert_eq!(arch.pc_register(), abiv2::PC);
        assert_eq!(arch.sp_register(), abiv2::SP);
        assert_eq!(arch.breakpoint_encoding(), BreakpointEncoding::Illegal);
    }

    #[test]
    fn legacy_descriptor() {
        let arch = ArchDescriptor::new(ArchitectureVariant::new(CpuFamily::Ck510, Endian::Big));

        assert_eq!(arch.register_count(), 148);
        assert_eq!(arch.sp_register(), abiv1::SP);
        assert_eq!(arch.breakpoint_encoding(), BreakpointEncoding::Trap);
        assert_eq!(arch.frame_align(0x100c), 0x1008);
        assert_eq!(arch.dwarf_to_register(15), Some(abiv1::LR));
    }

    #[test]
    fn target_description_replaces_names() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let registers = vec![
            CoreRegister {
                name: "a0".into(),
                id: abiv2::R0,
                data_type: RegisterDataType::Int32,
                group: RegisterGroup::General,
            },
            CoreRegister {
                name: "pc".into(),
                id: abiv2::PC,
                data_type: RegisterDataType::CodePointer,
                group: RegisterGroup::General,
            },
        ];

        let arch = ArchDescriptor::with_target_description(variant, registers);

        assert!(arch.registers().is_from_target());
        assert_eq!(arch.registers().name(abiv2::R0), "a0");
        assert_eq!(arch.register_count(), 73);
        assert_eq!(arch.pc_register(), abiv2::PC);
    }
}
