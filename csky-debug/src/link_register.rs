use crate::{
    architecture::ArchitectureVariant,
    error::Error,
    instructions::{decode, fetch, Op},
    memory::MemoryInterface,
    registers::{CR_EPC, CR_EPSR, CR_FPC, CR_FPSR},
};

/// The register holding the return address of a function.
///
/// Exception and fast interrupt handlers return through `epc` and `fpc`
/// instead of `r15`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkRegisterConvention {
    /// Return address in `r15`.
    #[default]
    Ordinary,
    /// Exception handler, return address in `epc`.
    ExceptionEpc,
    /// Fast interrupt handler, return address in `fpc`.
    ExceptionFpc,
}

/// Find the link register convention of the function starting at `start`.
///
/// The first instruction that reads an exception save register, returns
/// from an exception or leaves the function decides. Without any of them
/// the function is ordinary.
pub fn detect(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    start: u64,
    limit: u64,
) -> Result<LinkRegisterConvention, Error> {
    let mut address = start;

    while address < limit {
        let instruction = fetch(memory, variant, address)?;

        let convention = match decode(variant, &instruction) {
            Some(Op::MoveFromControl {
                control: CR_EPSR | CR_EPC,
                ..
            })
            | Some(Op::ReturnFromException) => Some(LinkRegisterConvention::ExceptionEpc),
            Some(Op::MoveFromControl {
                control: CR_FPSR | CR_FPC,
                ..
            })
            | Some(Op::ReturnFromInterrupt) => Some(LinkRegisterConvention::ExceptionFpc),
            Some(Op::Jump { .. }) | Some(Op::Branch) => Some(LinkRegisterConvention::Ordinary),
            _ => None,
        };

        if let Some(convention) = convention {
            tracing::debug!(
                "UNWIND: function at {:#010x} uses {:?} return convention",
                start,
                convention
            );
            return Ok(convention);
        }

        address = instruction.next_address();
    }

    Ok(LinkRegisterConvention::Ordinary)
}
