//! Per-target configuration, read from YAML.

use serde::{Deserialize, Serialize};

use crate::{
    architecture::{AbiRevision, Endian, DEFAULT_PROLOGUE_SCAN_LIMIT},
    error::Error,
};

/// Generation of the kernel running on the target.
///
/// Older kernels trap on an all-zero instruction, newer ones use a dedicated
/// breakpoint encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelGeneration {
    /// Kernels trapping on all-zero instructions.
    Legacy,
    /// Kernels with the trap / illegal breakpoint encodings.
    #[default]
    Modern,
}

/// User configuration of the C-SKY support.
///
/// ```yaml
/// abi: v2
/// kernel: legacy
/// probe_firmware: 0x0302
/// prologue_scan_limit: 128
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchConfig {
    /// The ABI revision the debugger expects. Binaries with another revision are rejected.
    pub abi: Option<AbiRevision>,
    /// The kernel generation, which selects the breakpoint encoding.
    pub kernel: KernelGeneration,
    /// Firmware version of the debug probe, if known.
    pub probe_firmware: Option<u32>,
    /// Maximum number of bytes scanned for a prologue without line information.
    pub prologue_scan_limit: u64,
    /// Byte order for targets without a binary.
    pub endian: Option<Endian>,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            abi: None,
            kernel: KernelGeneration::default(),
            probe_firmware: None,
            prologue_scan_limit: DEFAULT_PROLOGUE_SCAN_LIMIT,
            endian: None,
        }
    }
}

impl ArchConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a configuration from a YAML reader.
    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, Error> {
        Ok(serde_yaml::from_reader(reader)?)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_full() {
        let config = ArchConfig::from_yaml(
            "abi: v1\nkernel: legacy\nprobe_firmware: 770\nprologue_scan_limit: 64\nendian: big\n",
        )
        .unwrap();

        assert_eq!(
            config,
            ArchConfig {
                abi: Some(AbiRevision::V1),
                kernel: KernelGeneration::Legacy,
                probe_firmware: Some(770),
                prologue_scan_limit: 64,
                endian: Some(Endian::Big),
            }
        );
    }

    #[test]
    fn parse_from_reader() {
        let yaml = b"abi: v2\nendian: little\n";

        let config = ArchConfig::from_yaml_reader(&yaml[..]).unwrap();

        assert_eq!(config.abi, Some(AbiRevision::V2));
        assert_eq!(config.endian, Some(Endian::Little));
        assert_eq!(config.kernel, KernelGeneration::Modern);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = ArchConfig::from_yaml("kernel: modern\n").unwrap();

        assert_eq!(config, ArchConfig::default());
    }

    #[test]
    fn unknown_abi_is_an_error() {
        let result = ArchConfig::from_yaml("abi: v3\n");

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
