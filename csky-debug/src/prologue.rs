//! Prologue analysis.
//!
//! The analyzer walks the instructions from the start of a function and
//! tracks how much stack the function allocates and where it saves
//! registers, without executing anything. Offsets are measured downwards
//! from the top of the frame, i.e. the stack pointer of the caller.

use std::collections::BTreeMap;

use crate::{
    architecture::ArchitectureVariant,
    error::Error,
    instructions::{decode, fetch, Instruction, Op},
    memory::MemoryInterface,
    registers::RegisterId,
    target::SymbolLookup,
};

/// Result of scanning a prologue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrologueAnalysis {
    /// First address of the function.
    pub start: u64,
    /// First address not belonging to the prologue.
    pub end: u64,
    /// Bytes allocated on the stack before the frame pointer was set up.
    pub frame_size: u32,
    /// Whether `mov fp, sp` was seen.
    pub frame_pointer: bool,
    /// Saved registers and their offset below the top of the frame.
    pub saved: BTreeMap<RegisterId, i64>,
}

impl PrologueAnalysis {
    /// The offset below the top of the frame where `register` was saved.
    pub fn saved_offset(&self, register: RegisterId) -> Option<i64> {
        self.saved.get(&register).copied()
    }
}

/// The end of the prologue scan for a function starting at `start`.
///
/// This is the end of the first source line if known, otherwise the
/// configured lookahead, and never beyond `pc`.
pub fn scan_limit(
    symbols: &dyn SymbolLookup,
    variant: &ArchitectureVariant,
    start: u64,
    pc: u64,
) -> u64 {
    let limit = symbols
        .line_range(start)
        .filter(|end| *end > start)
        .unwrap_or_else(|| start.saturating_add(variant.prologue_scan_limit()));

    limit.min(pc)
}

/// Scan the prologue in `start..limit`.
pub fn analyze(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    start: u64,
    limit: u64,
) -> Result<PrologueAnalysis, Error> {
    let mut scanner = Scanner {
        memory,
        variant,
        limit,
        analysis: PrologueAnalysis {
            start,
            end: start,
            ..Default::default()
        },
    };

    scanner.run()?;

    tracing::debug!(
        "UNWIND: prologue {:#010x}..{:#010x}: frame size {}, frame pointer {}, {} saved registers",
        scanner.analysis.start,
        scanner.analysis.end,
        scanner.analysis.frame_size,
        scanner.analysis.frame_pointer,
        scanner.analysis.saved.len()
    );

    Ok(scanner.analysis)
}

/// The first address after the prologue of the function starting at `function_start`.
pub fn skip_prologue(
    memory: &mut dyn MemoryInterface,
    variant: &ArchitectureVariant,
    symbols: &dyn SymbolLookup,
    function_start: u64,
) -> Result<u64, Error> {
    let bounds = symbols.function_bounds(function_start);

    if let Some(line_end) = symbols.line_range(function_start) {
        let inside = bounds
            .as_ref()
            .map_or(true, |bounds| bounds.is_empty() || line_end <= bounds.end);

        if line_end > function_start && inside {
            return Ok(line_end);
        }
    }

    let limit = function_start.saturating_add(variant.prologue_scan_limit());
    let limit = match bounds {
        Some(bounds) if !bounds.is_empty() => limit.min(bounds.end),
        _ => limit,
    };

    Ok(analyze(memory, variant, function_start, limit)?.end)
}

struct Scanner<'a> {
    memory: &'a mut dyn MemoryInterface,
    variant: &'a ArchitectureVariant,
    limit: u64,
    analysis: PrologueAnalysis,
}

impl Scanner<'_> {
    fn run(&mut self) -> Result<(), Error> {
        let mut address = self.analysis.start;

        while address < self.limit {
            let instruction = fetch(self.memory, self.variant, address)?;

            let next = match self.step(&instruction)? {
                Some(next) => next,
                None => {
                    tracing::debug!(
                        "UNWIND: prologue ends at {:#010x} ({:#06x})",
                        address,
                        instruction.word
                    );
                    break;
                }
            };

            address = next;
        }

        self.analysis.end = address.min(self.limit.max(self.analysis.start));
        Ok(())
    }

    /// Apply one instruction. Returns the address to continue at, or `None`
    /// when the instruction is not part of the prologue.
    fn step(&mut self, instruction: &Instruction) -> Result<Option<u64>, Error> {
        let Some(op) = decode(self.variant, instruction) else {
            return Ok(None);
        };

        let next = instruction.next_address();

        match op {
            Op::StackAdjust(size) => self.allocate(size),
            Op::StoreMultiple { first, count } => {
                for index in 0..count {
                    self.save(first + index, i64::from(index) * 4);
                }
            }
            Op::StoreWord { source, offset } => self.save(source, i64::from(offset)),
            Op::Push(list) => {
                for register in list.push_order() {
                    self.allocate(4);
                    self.save(register, 0);
                }
            }
            Op::MoveFpSp => {
                self.analysis.frame_pointer = true;
            }
            Op::MoveFromControl {
                destination,
                control,
            } => return self.control_register_save(next, destination, control),
            Op::BranchToNext => return self.pic_base(next),
            Op::LoadLiteral {
                destination,
                address,
            } => {
                let value = self
                    .memory
                    .read_word_32(address, self.variant.endian())?;
                return self.large_frame(next, destination, value);
            }
            Op::LoadImmediate { destination, value } => {
                return self.large_frame(next, destination, value)
            }
            _ => return Ok(None),
        }

        Ok(Some(next))
    }

    /// Stack allocated after the frame pointer was set up is not part of the frame size.
    fn allocate(&mut self, size: u32) {
        if !self.analysis.frame_pointer {
            self.analysis.frame_size = self.analysis.frame_size.saturating_add(size);
        }
    }

    /// Record a store to `sp + offset` at the current frame size.
    fn save(&mut self, register: u16, offset: i64) {
        let offset = i64::from(self.analysis.frame_size) - offset;
        tracing::trace!("UNWIND: r{} saved at frame top - {}", register, offset);
        self.analysis.saved.insert(RegisterId(register), offset);
    }

    fn lookahead(&mut self, address: u64) -> Result<Option<(Instruction, Op)>, Error> {
        if address >= self.limit {
            return Ok(None);
        }

        let instruction = fetch(self.memory, self.variant, address)?;

        Ok(decode(self.variant, &instruction).map(|op| (instruction, op)))
    }

    /// `mfcr rz, crN` followed by a store of `rz` saves the control register.
    fn control_register_save(
        &mut self,
        next: u64,
        destination: u16,
        control: u16,
    ) -> Result<Option<u64>, Error> {
        match self.lookahead(next)? {
            Some((store, Op::StoreWord { source, offset })) if source == destination => {
                let register = self.variant.register_file().control_register(control);
                let offset = i64::from(self.analysis.frame_size) - i64::from(offset);
                tracing::trace!("UNWIND: cr{} saved at frame top - {}", control, offset);
                self.analysis.saved.insert(register, offset);

                Ok(Some(store.next_address()))
            }
            _ => Ok(None),
        }
    }

    /// `bsr` to the next instruction, optionally `lrw rz`, then `addu rz, r15`.
    fn pic_base(&mut self, next: u64) -> Result<Option<u64>, Error> {
        let Some((instruction, op)) = self.lookahead(next)? else {
            return Ok(None);
        };

        let (instruction, op) = match op {
            Op::LoadLiteral { destination, .. } => {
                match self.lookahead(instruction.next_address())? {
                    Some((add, Op::AddLinkRegister { destination: base }))
                        if base == destination =>
                    {
                        (add, Op::AddLinkRegister { destination })
                    }
                    _ => return Ok(None),
                }
            }
            op => (instruction, op),
        };

        match op {
            Op::AddLinkRegister { .. } => Ok(Some(instruction.next_address())),
            _ => Ok(None),
        }
    }

    /// A frame size too large for an immediate, computed in a scratch register.
    ///
    /// The whole sequence only belongs to the prologue if it ends in
    /// `subu sp, sp, rz` or `mov fp, sp`.
    fn large_frame(
        &mut self,
        mut address: u64,
        register: u16,
        mut value: u32,
    ) -> Result<Option<u64>, Error> {
        while let Some((instruction, op)) = self.lookahead(address)? {
            match op {
                Op::Adjust {
                    register: adjusted,
                    adjustment,
                } if adjusted == register => {
                    value = adjustment.apply(value);
                }
                Op::StoreWord { .. } => {
                    tracing::trace!(
                        "UNWIND: skipping store at {:#010x} inside frame size computation",
                        instruction.address
                    );
                }
                Op::StackAdjustRegister { source } if source == register => {
                    self.allocate(value);
                    return Ok(Some(instruction.next_address()));
                }
                Op::MoveFpSp => {
                    self.allocate(value);
                    self.analysis.frame_pointer = true;
                    return Ok(Some(instruction.next_address()));
                }
                _ => return Ok(None),
            }

            address = instruction.next_address();
        }

        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::{
        architecture::{CpuFamily, Endian},
        registers::{abiv1, abiv2},
        test::{MockMemory, MockSymbols},
    };

    const START: u64 = 0x8000;

    fn scan(family: CpuFamily, endian: Endian, instructions: &[u32]) -> PrologueAnalysis {
        let variant = ArchitectureVariant::new(family, endian);
        let mut memory = MockMemory::new();
        memory.add_instructions(START, endian, instructions);

        let length: u64 = instructions
            .iter()
            .map(|&i| if i > 0xffff { 4 } else { 2 })
            .sum();

        analyze(&mut memory, &variant, START, START + length).unwrap()
    }

    fn saved(entries: &[(RegisterId, i64)]) -> BTreeMap<RegisterId, i64> {
        entries.iter().copied().collect()
    }

    #[test_case(Endian::Little; "little endian")]
    #[test_case(Endian::Big; "big endian")]
    fn subi_then_stm(endian: Endian) {
        // subi sp, sp, 16; stm r4-r7, (sp); rts
        let analysis = scan(CpuFamily::Ck8xx, endian, &[0xe5ce_100f, 0xd48e_1c23, 0x783c]);

        assert_eq!(analysis.frame_size, 16);
        assert_eq!(analysis.end, START + 8);
        assert_eq!(
            analysis.saved,
            saved(&[
                (abiv2::R4, 16),
                (RegisterId(5), 12),
                (RegisterId(6), 8),
                (RegisterId(7), 4),
            ])
        );
    }

    #[test]
    fn frame_pointer_stops_size_tracking() {
        // subi16 sp, 8; st32.w r8, (sp, 0); st32.w r15, (sp, 4); mov16 fp, sp; subi16 sp, 448
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0x1422, 0xdd0e_2000, 0xddee_2001, 0x6e3b, 0x1730],
        );

        assert_eq!(analysis.frame_size, 8);
        assert!(analysis.frame_pointer);
        assert_eq!(
            analysis.saved,
            saved(&[(abiv2::FP, 8), (abiv2::LR, 4)])
        );
        assert_eq!(analysis.end, START + 14);
    }

    #[test]
    fn push_list() {
        // push r4-r5, r15, r16, r29; subi16 sp, 8
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0xebe0_0000 | 0x2 | 1 << 4 | 1 << 5 | 1 << 8, 0x1422],
        );

        assert_eq!(analysis.frame_size, 28);
        assert_eq!(
            analysis.saved,
            saved(&[
                (abiv2::R29, 4),
                (abiv2::R16, 8),
                (abiv2::LR, 12),
                (RegisterId(5), 16),
                (abiv2::R4, 20),
            ])
        );
    }

    #[test]
    fn control_register_save() {
        // subi16 sp, 8; mfcr r4, epsr; st16.w r4, (sp, 4); mfcr r5, epc; rts
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0x1422, 0xc002_6024, 0xb881, 0xc004_6025, 0x783c],
        );

        assert_eq!(analysis.saved, saved(&[(abiv2::EPSR, 4)]));
        // The second mfcr has no matching store and ends the prologue.
        assert_eq!(analysis.end, START + 8);
    }

    #[test]
    fn large_frame_from_immediate() {
        // movi32 r4, 0x1000; addi32 r4, r4, 8; st32.w r9, (sp, 0); subu32 sp, sp, r4
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0xea04_1000, 0xe484_0007, 0xdd2e_2000, 0xc48e_008e, 0x783c],
        );

        assert_eq!(analysis.frame_size, 0x1008);
        assert_eq!(analysis.end, START + 16);
    }

    // movi32 r4, 0x1000; mov16 fp, sp; rts
    #[test_case(CpuFamily::Ck8xx, &[0xea04_1000, 0x6e3b, 0x783c], 0x1000, true; "ending in mov fp")]
    // bgeni r1, 12; addi r1, 8; subu r0, r1; jmp r15
    #[test_case(CpuFamily::Ck610, &[0x32c1, 0x2071, 0x0510, 0x00cf], 0x1008, false; "abiv1 subu")]
    fn large_frame_chain_end(
        family: CpuFamily,
        instructions: &[u32],
        frame_size: u32,
        frame_pointer: bool,
    ) {
        let analysis = scan(family, Endian::Little, instructions);

        assert_eq!(analysis.frame_size, frame_size);
        assert_eq!(analysis.frame_pointer, frame_pointer);
        assert_eq!(analysis.end, START + 6);
    }

    #[test]
    fn large_frame_from_literal_pool() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        // lrw32 r4, [START + 8]; subu16 sp, r4; rts; literal
        memory.add_instructions(START, Endian::Little, &[0xea84_0002, 0x6392, 0x783c]);
        memory.add_word_range(START + 8, Endian::Little, &[0x0002_0000]);

        let analysis = analyze(&mut memory, &variant, START, START + 8).unwrap();

        assert_eq!(analysis.frame_size, 0x2_0000);
        assert_eq!(analysis.end, START + 6);
    }

    #[test]
    fn unterminated_chain_is_not_prologue() {
        // subi16 sp, 4; movi16 r3, 16; addi16 r3, 1; rts
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0x1421, 0x3310, 0x2300, 0x783c],
        );

        assert_eq!(analysis.frame_size, 4);
        assert_eq!(analysis.end, START + 2);
    }

    #[test]
    fn pic_base_is_skipped() {
        // bsr32 .+4; lrw32 r28, [...]; addu32 r28, r28, r15; subi16 sp, 8
        let analysis = scan(
            CpuFamily::Ck8xx,
            Endian::Little,
            &[0xe000_0002, 0xea9c_0004, 0xc5fc_003c, 0x1422],
        );

        assert_eq!(analysis.frame_size, 8);
        assert!(analysis.saved.is_empty());
        assert_eq!(analysis.end, START + 14);
    }

    #[test]
    fn abiv1_prologue() {
        // subi r0, 16; st.w r15, (r0, 12); st.w r8, (r0, 8); mov r8, r0; jmp r15
        let analysis = scan(
            CpuFamily::Ck610,
            Endian::Big,
            &[0x24f0, 0x9f30, 0x9820, 0x1208, 0x00cf],
        );

        assert_eq!(analysis.frame_size, 16);
        assert!(analysis.frame_pointer);
        assert_eq!(
            analysis.saved,
            saved(&[(abiv1::FP, 8), (abiv1::LR, 4)])
        );
        assert_eq!(analysis.end, START + 8);
    }

    #[test]
    fn abiv1_stm_to_r15() {
        // subi r0, 8; stm r14-r15, (r0)
        let analysis = scan(CpuFamily::Ck510, Endian::Little, &[0x2470, 0x007e]);

        assert_eq!(
            analysis.saved,
            saved(&[(abiv1::GB, 8), (abiv1::LR, 4)])
        );
    }

    #[test]
    fn stops_at_limit() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        memory.add_instructions(START, Endian::Little, &[0x1421, 0x1421, 0x1421]);

        let analysis = analyze(&mut memory, &variant, START, START + 4).unwrap();

        assert_eq!(analysis.frame_size, 8);
        assert_eq!(analysis.end, START + 4);
    }

    #[test]
    fn unreadable_code_is_an_error() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        memory.add_instructions(START, Endian::Little, &[0x1421]);

        let error = analyze(&mut memory, &variant, START, START + 8).unwrap_err();

        assert!(matches!(
            error,
            Error::Memory(crate::memory::MemoryAccessError {
                address: 0x8002,
                ..
            })
        ));
    }

    #[test]
    fn scan_limit_prefers_line_table() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let symbols = MockSymbols::new().line(START, START + 6);

        assert_eq!(scan_limit(&symbols, &variant, START, START + 100), START + 6);
        assert_eq!(scan_limit(&symbols, &variant, START, START + 2), START + 2);
        assert_eq!(
            scan_limit(&MockSymbols::new(), &variant, START, u64::MAX),
            START + 256
        );
    }

    #[test]
    fn skip_prologue_without_line_info() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        memory.add_instructions(START, Endian::Little, &[0x1422, 0xddee_2001, 0x3310, 0x783c]);
        let symbols = MockSymbols::new().function(START..START + 10);

        let end = skip_prologue(&mut memory, &variant, &symbols, START).unwrap();

        assert_eq!(end, START + 6);
    }

    #[test]
    fn skip_prologue_uses_first_line() {
        let variant = ArchitectureVariant::new(CpuFamily::Ck8xx, Endian::Little);
        let mut memory = MockMemory::new();
        let symbols = MockSymbols::new()
            .function(START..START + 10)
            .line(START, START + 4);

        let end = skip_prologue(&mut memory, &variant, &symbols, START).unwrap();

        assert_eq!(end, START + 4);
    }
}
