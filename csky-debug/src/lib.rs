//! C-SKY architecture support for debuggers.
//!
//! This crate contains the parts of a debugger that have to understand the
//! C-SKY instruction set: the register model of both ABI revisions, a
//! heuristic unwinder driven by prologue analysis, argument marshaling for
//! calls injected into the debuggee, and software breakpoint placement on the
//! mixed 16/32-bit encoding.
//!
//! Everything that talks to the target goes through the collaborator traits
//! [`MemoryInterface`], [`RegisterInterface`] and [`SymbolLookup`].
//!
//! The usual entry point is an [`ArchDescriptor`], built once per binary:
//!
//! ```no_run
//! use csky_debug::{ArchConfig, ArchDescriptor};
//!
//! # fn main() -> Result<(), csky_debug::Error> {
//! let elf = std::fs::read("firmware.elf").map_err(|e| csky_debug::Error::Other(e.to_string()))?;
//! let arch = ArchDescriptor::for_binary(&elf, &ArchConfig::default())?;
//!
//! println!("{} registers", arch.register_count());
//! # Ok(())
//! # }
//! ```

/// Detection of the ABI revision and byte order of a binary.
pub mod architecture;
/// Breakpoint encodings and the shadow manager.
pub mod breakpoint;
/// Argument marshaling for injected calls and return value transfer.
pub mod calling_convention;
mod config;
mod error;
/// Unwind frame caches built from prologue analysis.
pub mod frame;
mod gdbarch;
/// Instruction fetch, length determination and opcode patterns.
pub mod instructions;
/// Detection of the register holding the return address of a function.
pub mod link_register;
mod memory;
/// Prologue analysis.
pub mod prologue;
/// The register model of both ABI revisions.
pub mod registers;
/// Register set images as found in core files and ptrace transfers.
pub mod regset;
mod target;


pub use crate::architecture::{AbiRevision, ArchitectureVariant, CpuFamily, Endian, LengthRule};
pub use crate::config::{ArchConfig, KernelGeneration};
pub use crate::error::Error;
pub use crate::frame::{FrameCache, FrameId, SavedRegister};
pub use crate::gdbarch::ArchDescriptor;
pub use crate::link_register::LinkRegisterConvention;
pub use crate::memory::{MemoryAccessError, MemoryInterface};
pub use crate::registers::{
    CoreRegister, RegisterDataType, RegisterGroup, RegisterId, RegisterModel, RegisterValue,
};
pub use crate::target::{RegisterInterface, SymbolLookup};
