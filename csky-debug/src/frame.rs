//! Frame caches built from prologue analysis and previous-register lookup.

use std::collections::BTreeMap;

use crate::{
    architecture::ArchitectureVariant,
    error::Error,
    instructions::{decode, fetch, Op},
    link_register::{self, LinkRegisterConvention},
    memory::MemoryInterface,
    prologue::{self, PrologueAnalysis},
    registers::{Psr, RegisterId, RegisterValue},
    target::{RegisterInterface, SymbolLookup},
};

/// Identity of a frame, stable while the frame is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    /// Stack pointer of the caller.
    pub stack_base: u64,
    /// First address of the function.
    pub function_start: u64,
}

/// Where the caller's value of a register can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedRegister {
    /// Saved to memory at this address.
    Address(u64),
    /// Same as the caller's value of another register.
    SameAs(RegisterId),
}

/// Unwind information of one frame, built from prologue analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCache {
    prev_sp: u64,
    frame_size: u32,
    frame_base: RegisterId,
    function_start: u64,
    convention: LinkRegisterConvention,
    saved: BTreeMap<RegisterId, SavedRegister>,
}

impl FrameCache {
    /// Build the cache for the frame executing at `pc`.
    ///
    /// Frames outside of any known function get a stub cache, see [`FrameCache::stub`].
    pub fn analyze(
        memory: &mut dyn MemoryInterface,
        registers: &mut dyn RegisterInterface,
        symbols: &dyn SymbolLookup,
        variant: &ArchitectureVariant,
        pc: u64,
    ) -> Result<Self, Error> {
        let Some(bounds) = symbols.function_bounds(pc) else {
            tracing::debug!("UNWIND: no function found for pc {:#010x}", pc);
            return Self::stub(registers, variant, pc);
        };

        let start = bounds.start;
        let limit = prologue::scan_limit(symbols, variant, start, pc);
        let analysis = prologue::analyze(memory, variant, start, limit)?;

        let convention = if bounds.is_empty() {
            link_register::detect(memory, variant, start, limit)?
        } else {
            LinkRegisterConvention::Ordinary
        };

        Self::from_analysis(registers, variant, &analysis, convention)
    }

    /// Build the cache from a finished prologue analysis.
    pub fn from_analysis(
        registers: &mut dyn RegisterInterface,
        variant: &ArchitectureVariant,
        analysis: &PrologueAnalysis,
        convention: LinkRegisterConvention,
    ) -> Result<Self, Error> {
        let file = variant.register_file();

        let frame_base = if analysis.frame_pointer {
            file.frame_pointer()
        } else {
            file.stack_pointer()
        };

        let base_value = registers.read_core_reg(frame_base)?;
        let base = u64::try_from(base_value)?;
        let prev_sp = if base_value.is_zero() {
            0
        } else {
            base + u64::from(analysis.frame_size)
        };

        let mut saved: BTreeMap<RegisterId, SavedRegister> = analysis
            .saved
            .iter()
            .map(|(register, offset)| {
                (
                    *register,
                    SavedRegister::Address(prev_sp.wrapping_add_signed(-offset)),
                )
            })
            .collect();

        let (pc_source, psr_source) = match convention {
            LinkRegisterConvention::Ordinary => (file.return_address(), None),
            LinkRegisterConvention::ExceptionEpc => (file.epc(), Some(file.epsr())),
            LinkRegisterConvention::ExceptionFpc => (file.fpc(), Some(file.fpsr())),
        };

        saved.insert(file.program_counter(), SavedRegister::SameAs(pc_source));

        if let Some(psr_source) = psr_source {
            saved.insert(file.psr(), SavedRegister::SameAs(psr_source));

            match registers.read_core_reg(psr_source) {
                Ok(value) => {
                    let psr = Psr(u32::try_from(value)?);
                    tracing::debug!(
                        "UNWIND: exception frame, vector {}, supervisor {}",
                        psr.vec(),
                        psr.s()
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        "UNWIND: exception frame, {:?} unreadable: {}",
                        psr_source,
                        error
                    );
                }
            }
        }

        tracing::debug!(
            "UNWIND: frame at {:#010x}: base {:?} = {:#010x}, size {}, caller sp {:#010x}",
            analysis.start,
            frame_base,
            base,
            analysis.frame_size,
            prev_sp
        );

        Ok(Self {
            prev_sp,
            frame_size: analysis.frame_size,
            frame_base,
            function_start: analysis.start,
            convention,
            saved,
        })
    }

    /// A frame without prologue information.
    ///
    /// The caller's stack pointer is the current one and the return address
    /// is in the link register.
    pub fn stub(
        registers: &mut dyn RegisterInterface,
        variant: &ArchitectureVariant,
        pc: u64,
    ) -> Result<Self, Error> {
        let file = variant.register_file();
        let prev_sp = u64::try_from(registers.read_core_reg(file.stack_pointer())?)?;

        let mut saved = BTreeMap::new();
        saved.insert(
            file.program_counter(),
            SavedRegister::SameAs(file.return_address()),
        );

        Ok(Self {
            prev_sp,
            frame_size: 0,
            frame_base: file.stack_pointer(),
            function_start: pc,
            convention: LinkRegisterConvention::Ordinary,
            saved,
        })
    }

    /// The identity of this frame.
    pub fn id(&self) -> FrameId {
        FrameId {
            stack_base: self.prev_sp,
            function_start: self.function_start,
        }
    }

    /// Whether this is the outermost frame.
    pub fn is_outermost(&self) -> bool {
        self.prev_sp == 0
    }

    /// The stack pointer of the caller.
    pub fn previous_stack_pointer(&self) -> u64 {
        self.prev_sp
    }

    /// Bytes allocated by the prologue.
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// The register the frame size is measured from.
    pub fn frame_base(&self) -> RegisterId {
        self.frame_base
    }

    /// The link register convention of the function.
    pub fn convention(&self) -> LinkRegisterConvention {
        self.convention
    }

    /// Where the caller's value of `register` is stored, `None` if it was not saved.
    pub fn saved_register(&self, register: RegisterId) -> Option<SavedRegister> {
        self.saved.get(&register).copied()
    }

    /// The value `register` had in the caller.
    pub fn previous_register(
        &self,
        memory: &mut dyn MemoryInterface,
        registers: &mut dyn RegisterInterface,
        variant: &ArchitectureVariant,
        register: RegisterId,
    ) -> Result<RegisterValue, Error> {
        if register == variant.register_file().stack_pointer() {
            return Ok(RegisterValue::U32(self.prev_sp as u32));
        }

        match self.saved.get(&register) {
            Some(SavedRegister::Address(address)) => Ok(RegisterValue::U32(
                memory.read_word_32(*address, variant.endian())?,
            )),
            Some(SavedRegister::SameAs(other)) if *other != register => {
                self.previous_register(memory, registers, variant, *other)
            }
            _ => registers.read_core_reg(register),
        }
    }
}

/// The program counter of the frame.
pub fn unwind_pc(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
) -> Result<u64, Error> {
    let pc = registers.read_core_reg(variant.register_file().program_counter())?;
    u64::try_from(pc)
}

/// The stack pointer of the frame.
pub fn unwind_sp(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
) -> Result<u64, Error> {
    let sp = registers.read_core_reg(variant.register_file().stack_pointer())?;
    u64::try_from(sp)
}

/// Whether the instruction at `pc` returns from the function, after which
/// the frame no longer matches its prologue.
pub fn stack_frame_destroyed(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    pc: u64,
) -> Result<bool, Error> {
    let instruction = fetch(memory, variant, pc)?;
    let return_address = variant.register_file().return_address();

    Ok(match decode(variant, &instruction) {
        Some(Op::Jump { register }) => RegisterId(register) == return_address,
        Some(Op::ReturnFromException) | Some(Op::ReturnFromInterrupt) => true,
        _ => false,
    })
}
