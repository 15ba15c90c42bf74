use std::ops::Range;

use crate::{
    error::Error,
    registers::{RegisterId, RegisterValue},
};

/// Access to the registers of the selected thread or frame.
pub trait RegisterInterface {
    /// Read the current value of a register.
    fn read_core_reg(&mut self, id: RegisterId) -> Result<RegisterValue, Error>;

    /// Write a register.
    fn write_core_reg(&mut self, id: RegisterId, value: RegisterValue) -> Result<(), Error>;
}

/// Symbol and line table information supplied by the debugger.
pub trait SymbolLookup {
    /// The address range of the function containing `pc`.
    ///
    /// An empty range means the start is known but the size is not.
    fn function_bounds(&self, pc: u64) -> Option<Range<u64>>;

    /// The end address of the source line starting at `start`.
    fn line_range(&self, start: u64) -> Option<u64>;
}
