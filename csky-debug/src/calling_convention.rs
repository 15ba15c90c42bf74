//! Calls injected into the debuggee.
//!
//! [`prepare_call`] places the arguments of a call the debugger makes on
//! behalf of the user into argument registers and onto the stack, and the
//! return value helpers move results between a byte buffer and the result
//! registers.

use crate::{
    architecture::{AbiRevision, ArchitectureVariant, Endian},
    error::Error,
    memory::MemoryInterface,
    registers::RegisterValue,
    target::RegisterInterface,
};

/// The type class of an argument, as far as placement is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    /// Integer, character, boolean or enumeration.
    Integer,
    /// Pointer or reference.
    Pointer,
    /// Floating point value, passed in integer registers.
    Float,
    /// Structure.
    Struct,
    /// Union.
    Union,
    /// Array passed by value.
    Array,
}

impl TypeCode {
    fn is_aggregate(self) -> bool {
        matches!(self, TypeCode::Struct | TypeCode::Union)
    }
}

/// An argument of an injected call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArgument {
    /// The value as it is laid out in target memory.
    pub bytes: Vec<u8>,
    /// The type class of the value.
    pub type_code: TypeCode,
}

impl CallArgument {
    /// A 32-bit integer argument.
    pub fn word(value: u32, endian: Endian) -> Self {
        Self {
            bytes: endian.u32_bytes(value).to_vec(),
            type_code: TypeCode::Integer,
        }
    }
}

/// Everything needed to set up an injected call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSetup {
    /// Where the called function returns to.
    pub return_address: u64,
    /// Stack pointer before the arguments are pushed.
    pub stack_pointer: u64,
    /// Address of the buffer receiving a structure returned by value.
    pub struct_return: Option<u64>,
    /// The arguments, left to right.
    pub arguments: Vec<CallArgument>,
}

/// Place the arguments of an injected call and return the new stack pointer.
///
/// Arguments are split into 4-byte chunks which fill the argument registers
/// in order. Chunks that do not fit are pushed so that the first argument
/// passed on the stack ends up at the highest address.
pub fn prepare_call(
    memory: &mut dyn MemoryInterface,
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
    setup: &CallSetup,
) -> Result<u64, Error> {
    let file = variant.register_file();
    let endian = variant.endian();
    let argument_registers = file.argument_registers();

    registers.write_core_reg(
        file.return_address(),
        RegisterValue::U32(setup.return_address as u32),
    )?;

    let mut cursor = 0;
    if let Some(address) = setup.struct_return {
        registers.write_core_reg(argument_registers[0], RegisterValue::U32(address as u32))?;
        cursor += 1;
    }

    // One entry per argument, holding its chunks that did not fit into registers.
    let mut pending: Vec<Vec<u8>> = Vec::new();

    for (index, argument) in setup.arguments.iter().enumerate() {
        let length = argument.bytes.len();

        if variant.abi() == AbiRevision::V1
            && length > 4
            && cursor < argument_registers.len()
            && cursor % 2 == 1
        {
            tracing::trace!(
                "Argument {} skips {:?} for pair alignment",
                index,
                argument_registers[cursor]
            );
            cursor += 1;
        }

        let mut overflow = Vec::new();
        for chunk in argument.bytes.chunks(4) {
            let value = chunk_value(chunk, argument.type_code, endian);

            if let Some(&register) = argument_registers.get(cursor) {
                registers.write_core_reg(register, RegisterValue::U32(value))?;
                cursor += 1;
            } else {
                overflow.extend_from_slice(&endian.u32_bytes(value));
            }
        }

        if !overflow.is_empty() {
            tracing::trace!("Argument {} passes {} bytes on the stack", index, overflow.len());
            pending.push(overflow);
        }
    }

    let mut sp = setup.stack_pointer;

    let stack_words: usize = pending.iter().map(|entry| entry.len() / 4).sum();
    if variant.abi() == AbiRevision::V1 && stack_words % 2 == 1 {
        sp = sp.wrapping_sub(4);
    }

    for entry in &pending {
        sp = sp.wrapping_sub(entry.len() as u64);
        memory.write_8(sp, entry)?;
    }

    registers.write_core_reg(file.stack_pointer(), RegisterValue::U32(sp as u32))?;

    tracing::debug!(
        "Prepared call to return to {:#010x}, {} stack words, sp {:#010x}",
        setup.return_address,
        stack_words,
        sp
    );

    Ok(sp)
}

/// The value of a register holding `chunk`.
///
/// Short aggregate chunks are moved to the top of the word on big endian targets.
fn chunk_value(chunk: &[u8], type_code: TypeCode, endian: Endian) -> u32 {
    let value = endian.read_unsigned(chunk) as u32;

    if endian == Endian::Big && chunk.len() < 4 && type_code.is_aggregate() {
        value << (8 * (4 - chunk.len()))
    } else {
        value
    }
}

/// How a value of a given size is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValueConvention {
    /// In this many consecutive result registers.
    Registers(usize),
    /// In a buffer supplied by the caller.
    Buffer,
}

/// How a value of `length` bytes is returned.
pub fn return_value_convention(length: usize) -> ReturnValueConvention {
    match length {
        0..=4 => ReturnValueConvention::Registers(1),
        5..=8 => ReturnValueConvention::Registers(2),
        _ => ReturnValueConvention::Buffer,
    }
}

/// Read a returned value of `length` bytes from the result registers.
///
/// Returns `None` for values returned in a caller supplied buffer.
pub fn read_return_value(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
    length: usize,
) -> Result<Option<Vec<u8>>, Error> {
    if return_value_convention(length) == ReturnValueConvention::Buffer {
        return Ok(None);
    }

    let endian = variant.endian();
    let mut bytes = Vec::with_capacity(length);

    for (&register, chunk) in variant
        .register_file()
        .result_registers()
        .iter()
        .zip(chunk_lengths(length))
    {
        let value = u32::try_from(registers.read_core_reg(register)?)?;
        bytes.extend(endian.write_unsigned(u128::from(value), chunk));
    }

    Ok(Some(bytes))
}

/// Store a value to be returned into the result registers.
pub fn write_return_value(
    registers: &mut dyn RegisterInterface,
    variant: &ArchitectureVariant,
    value: &[u8],
) -> Result<ReturnValueConvention, Error> {
    let convention = return_value_convention(value.len());
    if convention == ReturnValueConvention::Buffer {
        return Ok(convention);
    }

    let endian = variant.endian();
    for (&register, chunk) in variant
        .register_file()
        .result_registers()
        .iter()
        .zip(value.chunks(4))
    {
        let chunk_value = endian.read_unsigned(chunk) as u32;
        registers.write_core_reg(register, RegisterValue::U32(chunk_value))?;
    }

    Ok(convention)
}

fn chunk_lengths(length: usize) -> impl Iterator<Item = usize> {
    (0..length.max(1))
        .step_by(4)
        .map(move |offset| (length - offset.min(length)).min(4))
}

/// Align a stack pointer for a dummy frame.
pub fn frame_align(variant: &ArchitectureVariant, sp: u64) -> u64 {
    match variant.abi() {
        AbiRevision::V1 => sp & !7,
        AbiRevision::V2 => sp & !3,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::{
        architecture::CpuFamily,
        registers::{abiv1, abiv2},
        test::{MockMemory, MockRegisters},
    };

    fn setup(arguments: Vec<CallArgument>) -> CallSetup {
        CallSetup {
            return_address: 0x8000_0100,
            stack_pointer: 0x2000,
            struct_return: None,
            arguments,
        }
    }

    #[test]
    fn register_arguments() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        let mut registers = MockRegisters::new();

        let arguments = vec![
            CallArgument::word(0x11, Endian::Little),
            CallArgument {
                bytes: vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
                type_code: TypeCode::Struct,
            },
        ];

        let sp = prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap();

        assert_eq!(sp, 0x2000);
        assert_eq!(registers.get(abiv2::LR), 0x8000_0100);
        assert_eq!(registers.get(abiv2::R0), 0x11);
        assert_eq!(registers.get(abiv2::R1), 0x0403_0201);
        assert_eq!(registers.get(abiv2::R2), 0x0605);
        assert_eq!(registers.get(abiv2::SP), 0x2000);
        assert!(memory.writes.is_empty());
    }

    #[test]
    fn struct_return_pointer_takes_first_register() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        let mut registers = MockRegisters::new();

        let mut call = setup(vec![CallArgument::word(7, Endian::Little)]);
        call.struct_return = Some(0x3000);

        prepare_call(&mut memory, &mut registers, &variant, &call).unwrap();

        assert_eq!(registers.get(abiv2::R0), 0x3000);
        assert_eq!(registers.get(abiv2::R1), 7);
    }

    #[test]
    fn overflow_first_stack_argument_is_highest() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        memory.add_range(0x1fe0, vec![0; 0x20]);
        let mut registers = MockRegisters::new();

        let mut arguments: Vec<_> = (1..=5)
            .map(|value| CallArgument::word(value, Endian::Little))
            .collect();
        arguments.push(CallArgument {
            bytes: 0x0000_0007_0000_0006_u64.to_le_bytes().to_vec(),
            type_code: TypeCode::Integer,
        });

        let sp = prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap();

        assert_eq!(sp, 0x1ff4);
        assert_eq!(registers.get(abiv2::R3), 4);
        assert_eq!(registers.get(abiv2::SP), 0x1ff4);
        // argument 5 at the top, argument 6 below it
        assert_eq!(memory.bytes(0x1ffc, 4), vec![5, 0, 0, 0]);
        assert_eq!(memory.bytes(0x1ff4, 8), vec![6, 0, 0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn legacy_odd_stack_words_keep_eight_byte_alignment() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck610, Endian::Big);
        let mut memory = MockMemory::new();
        memory.add_range(0x1ff0, vec![0; 0x10]);
        let mut registers = MockRegisters::new();

        let arguments = (1..=7)
            .map(|value| CallArgument::word(value, Endian::Big))
            .collect();

        let sp = prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap();

        assert_eq!(sp, 0x1ff8);
        assert_eq!(registers.get(abiv1::R2), 1);
        assert_eq!(registers.get(abiv1::R7), 6);
        assert_eq!(registers.get(abiv1::SP), 0x1ff8);
        assert_eq!(memory.bytes(0x1ff8, 4), vec![0, 0, 0, 7]);
        assert_eq!(memory.writes, vec![(0x1ff8, vec![0, 0, 0, 7])]);
    }

    #[test]
    fn legacy_wide_values_start_on_even_register() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck610, Endian::Little);
        let mut memory = MockMemory::new();
        let mut registers = MockRegisters::new();

        let arguments = vec![
            CallArgument::word(1, Endian::Little),
            CallArgument {
                bytes: 0x2222_2222_3333_3333_u64.to_le_bytes().to_vec(),
                type_code: TypeCode::Integer,
            },
            CallArgument::word(4, Endian::Little),
        ];

        prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap();

        assert_eq!(registers.get(abiv1::R2), 1);
        assert!(!registers.values.contains_key(&abiv1::R3));
        assert_eq!(registers.get(abiv1::R4), 0x3333_3333);
        assert_eq!(registers.get(abiv1::R5), 0x2222_2222);
        assert_eq!(registers.get(abiv1::R6), 4);
    }

    #[test_case(TypeCode::Struct, 0xaabb_cc00; "aggregate is left justified")]
    #[test_case(TypeCode::Integer, 0x00aa_bbcc; "scalar is right justified")]
    fn big_endian_short_chunks(type_code: TypeCode, expected: u32) {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Big);
        let mut memory = MockMemory::new();
        let mut registers = MockRegisters::new();

        let arguments = vec![CallArgument {
            bytes: vec![0xaa, 0xbb, 0xcc],
            type_code,
        }];

        prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap();

        assert_eq!(registers.get(abiv2::R0), expected);
    }

    #[test]
    fn stack_write_failure_is_reported() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        let mut registers = MockRegisters::new();

        let arguments = (0..5)
            .map(|value| CallArgument::word(value, Endian::Little))
            .collect();

        let error =
            prepare_call(&mut memory, &mut registers, &variant, &setup(arguments)).unwrap_err();

        assert!(matches!(error, Error::Memory(_)));
    }

    #[test_case(1, ReturnValueConvention::Registers(1))]
    #[test_case(4, ReturnValueConvention::Registers(1))]
    #[test_case(5, ReturnValueConvention::Registers(2))]
    #[test_case(8, ReturnValueConvention::Registers(2))]
    #[test_case(9, ReturnValueConvention::Buffer)]
    fn return_conventions(length: usize, expected: ReturnValueConvention) {
        assert_eq!(return_value_convention(length), expected);
    }

    #[test_case(CpuFamily::Ck8xx, Endian::Little)]
    #[test_case(CpuFamily::Ck510, Endian::Big)]
    fn return_value_through_registers(family: CpuFamily, endian: Endian) {
        let variant = ArchitectureVariant::new(family, endian);
        let mut registers = MockRegisters::new();
        let value = vec![1, 2, 3, 4, 5, 6];

        let convention = write_return_value(&mut registers, &variant, &value).unwrap();

        assert_eq!(convention, ReturnValueConvention::Registers(2));
        assert_eq!(
            read_return_value(&mut registers, &variant, value.len()).unwrap(),
            Some(value)
        );
    }

    #[test]
    fn first_result_register_holds_low_bytes() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut registers = MockRegisters::new()
            .with(abiv2::R0, 0x4433_2211)
            .with(abiv2::R1, 0x8877_6655);

        assert_eq!(
            read_return_value(&mut registers, &variant, 8).unwrap(),
            Some(vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88])
        );
        assert_eq!(read_return_value(&mut registers, &variant, 16).unwrap(), None);
    }

    #[test]
    fn dummy_frame_alignment() {
        let modern = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let legacy = ArchitectureVariant::new(CpuFamily::Ck510, Endian::Little);

        assert_eq!(frame_align(&modern, 0x1007), 0x1004);
        assert_eq!(frame_align(&legacy, 0x1007), 0x1000);
    }
}
