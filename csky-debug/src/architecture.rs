use object::{
    read::elf::{ElfFile32, FileHeader},
    Endianness, Object,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::{ArchConfig, KernelGeneration},
    error::Error,
    registers::RegisterFile,
};

/// ELF machine number of C-SKY.
pub const EM_CSKY: u16 = 252;

const EF_CSKY_ABIMASK: u32 = 0xf000_0000;
const EF_CSKY_ABIV1: u32 = 0x1000_0000;
const EF_CSKY_ABIV2: u32 = 0x2000_0000;

const CSKY_ARCH_MASK: u32 = 0x1f;
const CSKY_ARCH_510: u32 = 0x1;
const CSKY_ARCH_610: u32 = 0x2;

/// Probe firmware from this version on exposes control register banks 1 to 3.
pub const EXTENDED_CONTROL_BANK_FIRMWARE: u32 = 0x0300;

/// Default number of bytes scanned for a prologue when no line information is available.
pub const DEFAULT_PROLOGUE_SCAN_LIMIT: u64 = 256;

/// The C-SKY ABI revision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, docsplay::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AbiRevision {
    /// ABI revision 1
    V1,
    /// ABI revision 2
    V2,
}

/// The CPU family a binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuFamily {
    /// CK510, 16-bit only encoding.
    Ck510,
    /// CK610, 16-bit only encoding.
    Ck610,
    /// CK8xx and later, mixed 16/32-bit encoding.
    Ck8xx,
}

impl CpuFamily {
    /// The ABI revision implemented by this family.
    pub fn abi(self) -> AbiRevision {
        match self {
            CpuFamily::Ck510 | CpuFamily::Ck610 => AbiRevision::V1,
            CpuFamily::Ck8xx => AbiRevision::V2,
        }
    }

    fn from_e_flags(e_flags: u32) -> Self {
        let arch = e_flags & CSKY_ARCH_MASK;

        match e_flags & EF_CSKY_ABIMASK {
            EF_CSKY_ABIV1 if arch == CSKY_ARCH_510 => CpuFamily::Ck510,
            EF_CSKY_ABIV1 => CpuFamily::Ck610,
            EF_CSKY_ABIV2 => CpuFamily::Ck8xx,
            // Old toolchains leave the ABI field empty.
            _ if arch == CSKY_ARCH_510 => CpuFamily::Ck510,
            _ if arch == CSKY_ARCH_610 => CpuFamily::Ck610,
            _ => CpuFamily::Ck8xx,
        }
    }
}

/// Byte order of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Little endian.
    #[default]
    Little,
    /// Big endian.
    Big,
}

impl Endian {
    /// Encode a 16-bit value.
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    /// Encode a 32-bit value.
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    /// Interpret up to 16 bytes as an unsigned integer.
    pub fn read_unsigned(self, bytes: &[u8]) -> u128 {
        let fold = |acc: u128, byte: &u8| (acc << 8) | u128::from(*byte);

        match self {
            Endian::Little => bytes.iter().rev().fold(0, fold),
            Endian::Big => bytes.iter().fold(0, fold),
        }
    }

    /// Encode the low `length` bytes of `value`.
    pub fn write_unsigned(self, value: u128, length: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..length)
            .map(|i| value.checked_shr(8 * i as u32).unwrap_or(0) as u8)
            .collect();
        if self == Endian::Big {
            bytes.reverse();
        }
        bytes
    }
}

/// How the length of an instruction is determined from its first halfword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Every instruction is 16 bits wide.
    SixteenBitOnly,
    /// A first halfword with both top bits set starts a 32-bit instruction.
    TopBitsPrefix,
}

impl LengthRule {
    /// Whether the halfword starts a 32-bit instruction.
    pub fn is_32bit_start(self, halfword: u16) -> bool {
        match self {
            LengthRule::SixteenBitOnly => false,
            LengthRule::TopBitsPrefix => halfword & 0xc000 == 0xc000,
        }
    }
}

/// Everything the architecture support needs to know about the debuggee.
///
/// This is resolved once per binary or target and then passed to every
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureVariant {
    family: CpuFamily,
    endian: Endian,
    extended_control_bank: bool,
    kernel: KernelGeneration,
    prologue_scan_limit: u64,
}

impl ArchitectureVariant {
    /// A variant with default settings.
    pub fn new(family: CpuFamily, endian: Endian) -> Self {
        Self {
            family,
            endian,
            extended_control_bank: false,
            kernel: KernelGeneration::default(),
            prologue_scan_limit: DEFAULT_PROLOGUE_SCAN_LIMIT,
        }
    }

    /// Build the variant for a known family, applying the configuration.
    ///
    /// Fails if the configuration asks for a different ABI revision.
    pub fn with_config(
        family: CpuFamily,
        endian: Endian,
        config: &ArchConfig,
    ) -> Result<Self, Error> {
        if let Some(configured) = config.abi {
            if configured != family.abi() {
                return Err(Error::AbiMismatch {
                    binary: family.abi(),
                    configured,
                });
            }
        }

        Ok(Self {
            family,
            endian,
            extended_control_bank: config
                .probe_firmware
                .is_some_and(|version| version >= EXTENDED_CONTROL_BANK_FIRMWARE),
            kernel: config.kernel,
            prologue_scan_limit: config.prologue_scan_limit,
        })
    }

    /// Build the variant from the `e_flags` field of an ELF header.
    pub fn from_e_flags(e_flags: u32, endian: Endian, config: &ArchConfig) -> Result<Self, Error> {
        let family = CpuFamily::from_e_flags(e_flags);

        tracing::debug!(
            "ELF flags {:#010x} select {:?} ({})",
            e_flags,
            family,
            family.abi()
        );

        Self::with_config(family, endian, config)
    }

    /// Build the variant for an ELF binary.
    pub fn from_elf(data: &[u8], config: &ArchConfig) -> Result<Self, Error> {
        let file = ElfFile32::<Endianness>::parse(data)?;
        let header = file.elf_header();

        let machine = header.e_machine(file.endian());
        if machine != EM_CSKY {
            return Err(Error::NotCsky { machine });
        }

        let endian = if file.is_little_endian() {
            Endian::Little
        } else {
            Endian::Big
        };

        Self::from_e_flags(header.e_flags(file.endian()), endian, config)
    }

    /// Build the variant for a target without a binary.
    ///
    /// The ABI revision and byte order come from the configuration, an
    /// unset ABI selects revision 2.
    pub fn for_raw_target(config: &ArchConfig) -> Result<Self, Error> {
        let family = match config.abi {
            Some(AbiRevision::V1) => CpuFamily::Ck610,
            Some(AbiRevision::V2) | None => CpuFamily::Ck8xx,
        };

        Self::with_config(family, config.endian.unwrap_or_default(), config)
    }

    /// Select the kernel generation, which decides the breakpoint encoding.
    pub fn with_kernel(mut self, kernel: KernelGeneration) -> Self {
        self.kernel = kernel;
        self
    }

    /// Enable or disable the extended control register bank.
    pub fn with_extended_control_bank(mut self, enabled: bool) -> Self {
        self.extended_control_bank = enabled;
        self
    }

    /// Set the number of bytes scanned for a prologue without line information.
    pub fn with_prologue_scan_limit(mut self, limit: u64) -> Self {
        self.prologue_scan_limit = limit;
        self
    }

    /// The CPU family.
    pub fn family(&self) -> CpuFamily {
        self.family
    }

    /// The ABI revision.
    pub fn abi(&self) -> AbiRevision {
        self.family.abi()
    }

    /// The byte order of the target.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The kernel generation running on the target.
    pub fn kernel(&self) -> KernelGeneration {
        self.kernel
    }

    /// Number of bytes scanned for a prologue without line information.
    pub fn prologue_scan_limit(&self) -> u64 {
        self.prologue_scan_limit
    }

    /// Whether control register banks 1 to 3 are available.
    pub fn has_extended_control_bank(&self) -> bool {
        self.extended_control_bank
    }

    /// The instruction length rule.
    pub fn length_rule(&self) -> LengthRule {
        match self.abi() {
            AbiRevision::V1 => LengthRule::SixteenBitOnly,
            AbiRevision::V2 => LengthRule::TopBitsPrefix,
        }
    }

    /// The register roles and name table of the ABI revision.
    pub fn register_file(&self) -> &'static RegisterFile {
        RegisterFile::for_abi(self.abi())
    }

    /// The total number of registers, including reserved slots.
    pub fn register_count(&self) -> usize {
        self.register_file()
            .register_count(self.extended_control_bank)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(0x1000_0001, CpuFamily::Ck510; "abiv1 ck510")]
    #[test_case(0x1000_0002, CpuFamily::Ck610; "abiv1 ck610")]
    #[test_case(0x2000_0009, CpuFamily::Ck8xx; "abiv2 ck803")]
    #[test_case(0x0000_0002, CpuFamily::Ck610; "no abi field ck610")]
    #[test_case(0x0000_000a, CpuFamily::Ck8xx; "no abi field ck801")]
    fn family_from_flags(e_flags: u32, expected: CpuFamily) {
        let variant =
            ArchitectureVariant::from_e_flags(e_flags, Endian::Little, &ArchConfig::default())
                .unwrap();

        assert_eq!(variant.family(), expected);
    }

    #[test]
    fn configured_abi_must_match_binary() {
        let config = ArchConfig {
            abi: Some(AbiRevision::V1),
            ..Default::default()
        };

        let error = ArchitectureVariant::from_e_flags(0x2000_0009, Endian::Little, &config)
            .unwrap_err();

        assert!(matches!(
            error,
            Error::AbiMismatch {
                binary: AbiRevision::V2,
                configured: AbiRevision::V1
            }
        ));
    }

    #[test]
    fn firmware_version_gates_extended_bank() {
        let mut config = ArchConfig {
            probe_firmware: Some(0x0201),
            ..Default::default()
        };

        let variant =
            ArchitectureVariant::with_config(CpuFamily::Ck8xx, Endian::Little, &config).unwrap();
        assert!(!variant.has_extended_control_bank());

        config.probe_firmware = Some(EXTENDED_CONTROL_BANK_FIRMWARE);
        let variant =
            ArchitectureVariant::with_config(CpuFamily::Ck8xx, Endian::Little, &config).unwrap();
        assert!(variant.has_extended_control_bank());
        assert_eq!(variant.register_count(), 272);
    }

    #[test]
    fn length_rule() {
        let rule = LengthRule::TopBitsPrefix;
        assert!(rule.is_32bit_start(0xc000));
        assert!(rule.is_32bit_start(0xe5ce));
        assert!(!rule.is_32bit_start(0x8000));
        assert!(!rule.is_32bit_start(0x4000));

        assert!(!LengthRule::SixteenBitOnly.is_32bit_start(0xffff));
    }

    #[test]
    fn unsigned_conversions() {
        assert_eq!(Endian::Little.read_unsigned(&[0x34, 0x12]), 0x1234);
        assert_eq!(Endian::Big.read_unsigned(&[0x12, 0x34]), 0x1234);
        assert_eq!(Endian::Little.write_unsigned(0x1234, 3), vec![0x34, 0x12, 0x00]);
        assert_eq!(Endian::Big.write_unsigned(0x1234, 3), vec![0x00, 0x12, 0x34]);
    }

    fn elf_header(machine: u16, flags: u32) -> Vec<u8> {
        let mut data = vec![0u8; 52];
        data[..4].copy_from_slice(b"\x7fELF");
        // ELFCLASS32, ELFDATA2LSB, EV_CURRENT
        data[4] = 1;
        data[5] = 1;
        data[6] = 1;
        // ET_EXEC
        data[16..18].copy_from_slice(&2u16.to_le_bytes());
        data[18..20].copy_from_slice(&machine.to_le_bytes());
        data[20..24].copy_from_slice(&1u32.to_le_bytes());
        data[36..40].copy_from_slice(&flags.to_le_bytes());
        // e_ehsize
        data[40..42].copy_from_slice(&52u16.to_le_bytes());
        data
    }

    #[test]
    fn detect_from_elf() {
        let data = elf_header(EM_CSKY, EF_CSKY_ABIV2 | 0x9);

        let variant = ArchitectureVariant::from_elf(&data, &ArchConfig::default()).unwrap();

        assert_eq!(variant.abi(), AbiRevision::V2);
        assert_eq!(variant.endian(), Endian::Little);
    }

    #[test]
    fn reject_other_machines() {
        // EM_RISCV
        let data = elf_header(243, 0);

        let error = ArchitectureVariant::from_elf(&data, &ArchConfig::default()).unwrap_err();

        assert!(matches!(error, Error::NotCsky { machine: 243 }));
    }
}
