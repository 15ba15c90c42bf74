use crate::{architecture::AbiRevision, memory::MemoryAccessError, registers::RegisterId};

/// Errors raised by the C-SKY architecture support.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read or write of target memory failed.
    #[error(transparent)]
    Memory(#[from] MemoryAccessError),
    /// A register could not be read, written or converted.
    #[error("Register error: {0}")]
    Register(String),
    /// The register is not part of the register model.
    #[error("Register {0:?} is not part of the register model")]
    UnknownRegister(RegisterId),
    /// The binary was built for a different ABI revision than the one configured.
    #[error("The binary uses {binary}, but the debugger is configured for {configured}")]
    AbiMismatch {
        /// ABI revision found in the ELF header flags.
        binary: AbiRevision,
        /// ABI revision requested by the configuration.
        configured: AbiRevision,
    },
    /// The binary is not a C-SKY executable.
    #[error("Not a C-SKY binary (e_machine is {machine})")]
    NotCsky {
        /// The machine type found in the ELF header.
        machine: u16,
    },
    /// The binary could not be parsed.
    #[error("Failed to parse ELF file")]
    Elf(#[from] object::read::Error),
    /// The architecture configuration could not be parsed.
    #[error("Invalid architecture configuration")]
    Config(#[from] serde_yaml::Error),
    /// A register set image is too short for its layout.
    #[error("Register set image has {actual} bytes, at least {expected} are required")]
    RegsetSize {
        /// Size required by the layout.
        expected: usize,
        /// Size of the supplied image.
        actual: usize,
    },
    /// Reading back a breakpoint write returned different bytes.
    #[error("Write of {expected:02x?} to {address:#010x} read back as {actual:02x?}")]
    WriteVerification {
        /// The aligned word that was written.
        address: u64,
        /// The bytes written.
        expected: Vec<u8>,
        /// The bytes read back.
        actual: Vec<u8>,
    },
    /// Any other error.
    #[error("{0}")]
    Other(String),
}
