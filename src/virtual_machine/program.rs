//! Script representation, serialization and static analysis.
//!
//! A [`Script`] is a list of sources (instruction streams) plus a constant
//! pool. Source 0 is the entry point. Scripts are immutable once built;
//! [`Script::analyze`] simulates a source's stack effect without running it,
//! which lets consumers reject malformed scripts when a sale is deployed rather
//! than when a buyer calls in.

use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Arity, INSTRUCTION_WIDTH, Instruction};
use crate::virtual_machine::operand::{Comparator, OperandKind, StorageSlot};
use crate::virtual_machine::vm::stack::MAX_STACK_DEPTH;
use mintscript_derive::BinaryCodec;
use primitive_types::U256;

/// Magic bytes identifying a serialized script.
pub const MAGIC: &[u8; 5] = b"MSCPT";

/// Current script format version.
const CURRENT_VERSION: Version = Version::new(1, 0, 0);

/// Index of the source evaluated by default.
pub const ENTRY_SOURCE: usize = 0;

/// Operands are one byte, so no more constants than this can be referenced.
pub const MAX_CONSTANTS: usize = 256;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Compiled script: instruction streams plus the constants they reference.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Script {
    sources: Vec<Vec<u8>>,
    constants: Vec<U256>,
}

/// Stack effect of one source, computed without executing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    /// Number of instructions in the source.
    pub instructions: usize,
    /// Values left on the stack when the source finishes.
    pub final_depth: usize,
    /// Deepest the stack gets while the source runs.
    pub max_depth: usize,
    /// Smallest context vector the source can run against.
    pub context_len: usize,
}

impl Script {
    /// Builds a script after checking its shape: at least one source, every
    /// source a whole number of instructions, and an addressable constant pool.
    pub fn new(sources: Vec<Vec<u8>>, constants: Vec<U256>) -> Result<Self, VMError> {
        if sources.is_empty() {
            return Err(VMError::MissingSource {
                index: ENTRY_SOURCE,
                available: 0,
            });
        }
        if constants.len() > MAX_CONSTANTS {
            return Err(VMError::TooManyConstants {
                count: constants.len(),
                max: MAX_CONSTANTS,
            });
        }
        for (index, source) in sources.iter().enumerate() {
            if source.len() % INSTRUCTION_WIDTH != 0 {
                return Err(VMError::UnexpectedEndOfSource {
                    source: index,
                    offset: source.len() - source.len() % INSTRUCTION_WIDTH,
                });
            }
        }
        Ok(Self { sources, constants })
    }

    pub fn sources(&self) -> &[Vec<u8>] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Result<&[u8], VMError> {
        self.sources
            .get(index)
            .map(Vec::as_slice)
            .ok_or(VMError::MissingSource {
                index,
                available: self.sources.len(),
            })
    }

    pub fn constants(&self) -> &[U256] {
        &self.constants
    }

    /// SHA3-256 of the script encoding; stable identifier for logs and tooling.
    pub fn id(&self) -> Hash {
        Hash::of(self)
    }

    /// Simulates the stack effect of a source.
    ///
    /// Rejects everything that would abort at run time regardless of inputs:
    /// unknown opcodes, stack underflow or overflow, zero-count n-ary
    /// instructions, out-of-range constant and stack reads, and unknown storage
    /// slots or comparators. Context reads cannot be bounds-checked without a
    /// context vector, so the required length is reported instead.
    pub fn analyze(&self, source: usize) -> Result<SourceSummary, VMError> {
        let code = self.source(source)?;
        let mut summary = SourceSummary {
            instructions: 0,
            final_depth: 0,
            max_depth: 0,
            context_len: 0,
        };
        let mut depth = 0usize;

        for (index, chunk) in code.chunks_exact(INSTRUCTION_WIDTH).enumerate() {
            let offset = index * INSTRUCTION_WIDTH;
            let (opcode, operand) = (chunk[0], chunk[1]);
            let instr = Instruction::try_from(opcode)
                .map_err(|_| VMError::InvalidInstruction { opcode, offset })?;
            let name = instr.mnemonic();

            if instr.arity() == Arity::Operand && operand == 0 {
                return Err(VMError::InvalidOperandCount {
                    instruction: name,
                    offset,
                    operand,
                });
            }

            match instr.operand_kind() {
                OperandKind::Constant if usize::from(operand) >= self.constants.len() => {
                    return Err(VMError::ConstantOutOfBounds {
                        offset,
                        index: operand,
                        available: self.constants.len(),
                    });
                }
                OperandKind::StackIndex if usize::from(operand) >= depth => {
                    return Err(VMError::StackReadOutOfBounds {
                        offset,
                        index: operand,
                        depth,
                    });
                }
                OperandKind::ContextIndex => {
                    summary.context_len = summary.context_len.max(usize::from(operand) + 1);
                }
                OperandKind::Slot if StorageSlot::try_from(operand).is_err() => {
                    return Err(VMError::InvalidStorageSlot {
                        offset,
                        slot: operand,
                    });
                }
                OperandKind::Comparator if Comparator::try_from(operand).is_err() => {
                    return Err(VMError::InvalidComparator { offset, operand });
                }
                _ => {}
            }

            let required = instr.arity().inputs(operand);
            if depth < required {
                return Err(VMError::StackUnderflow {
                    instruction: name,
                    offset,
                    required,
                    available: depth,
                });
            }
            depth = depth - required + instr.outputs();
            if depth > MAX_STACK_DEPTH {
                return Err(VMError::StackOverflow {
                    instruction: name,
                    offset,
                    limit: MAX_STACK_DEPTH,
                });
            }

            summary.instructions += 1;
            summary.max_depth = summary.max_depth.max(depth);
        }

        summary.final_depth = depth;
        Ok(summary)
    }

    /// Serializes the script to its portable binary format.
    ///
    /// The output includes a magic header and version for compatibility checking.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.encode(&mut out);
        out
    }

    /// Deserializes and shape-checks a script.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, VMError> {
        if input.len() < MAGIC.len() {
            return Err(VMError::DecodeError {
                reason: "truncated".to_string(),
            });
        }

        if &<[u8; 5]>::decode(&mut input)? != MAGIC {
            return Err(VMError::DecodeError {
                reason: "bad magic".to_string(),
            });
        }

        if Version::decode(&mut input)? != CURRENT_VERSION {
            return Err(VMError::DecodeError {
                reason: "unsupported version".to_string(),
            });
        }

        let raw = Script::decode(&mut input)?;
        if !input.is_empty() {
            return Err(VMError::DecodeError {
                reason: "trailing bytes".to_string(),
            });
        }
        Script::new(raw.sources, raw.constants)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn w(v: u64) -> U256 {
        U256::from(v)
    }

    /// Encodes instructions as a source.
    pub fn code(instrs: &[(Instruction, u8)]) -> Vec<u8> {
        instrs.iter().flat_map(|(i, op)| [*i as u8, *op]).collect()
    }

    fn script(instrs: &[(Instruction, u8)], constants: &[u64]) -> Script {
        Script::new(vec![code(instrs)], constants.iter().map(|c| w(*c)).collect()).unwrap()
    }

    #[test]
    fn new_rejects_malformed_shapes() {
        assert!(matches!(
            Script::new(vec![], vec![]),
            Err(VMError::MissingSource { index: 0, available: 0 })
        ));
        assert_eq!(
            Script::new(vec![vec![0, 0, 1]], vec![]),
            Err(VMError::UnexpectedEndOfSource { source: 0, offset: 2 })
        );
        assert!(matches!(
            Script::new(vec![vec![]], vec![U256::zero(); MAX_CONSTANTS + 1]),
            Err(VMError::TooManyConstants { count: 257, max: 256 })
        ));
        assert!(Script::new(vec![vec![]], vec![U256::zero(); MAX_CONSTANTS]).is_ok());
    }

    #[test]
    fn roundtrip_preserves_script() {
        let s = script(
            &[(Instruction::Constant, 0), (Instruction::Context, 1)],
            &[5, u64::MAX],
        );
        let decoded = Script::from_bytes(&s.to_bytes()).unwrap();
        assert_eq!(decoded, s);
        assert_eq!(decoded.id(), s.id());
    }

    #[test]
    fn from_bytes_rejects_corrupt_input() {
        let bytes = script(&[(Instruction::Constant, 0)], &[1]).to_bytes();

        let reason = |r: Result<Script, VMError>| match r {
            Err(VMError::DecodeError { reason }) => reason,
            other => panic!("expected decode error, got {other:?}"),
        };
        assert_eq!(reason(Script::from_bytes(&bytes[..3])), "truncated");

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert_eq!(reason(Script::from_bytes(&bad_magic)), "bad magic");

        let mut bad_version = bytes.clone();
        bad_version[5] = 9;
        assert_eq!(reason(Script::from_bytes(&bad_version)), "unsupported version");

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(reason(Script::from_bytes(&trailing)), "trailing bytes");
    }

    #[test]
    fn id_depends_on_constants() {
        let a = script(&[(Instruction::Constant, 0)], &[1]);
        let b = script(&[(Instruction::Constant, 0)], &[2]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn analyze_tracks_depth_and_context() {
        let s = script(
            &[
                (Instruction::Context, 1),
                (Instruction::Constant, 0),
                (Instruction::Min, 2),
                (Instruction::Context, 0),
                (Instruction::NumberMinted, 0),
                (Instruction::Stack, 0),
            ],
            &[10],
        );
        assert_eq!(
            s.analyze(ENTRY_SOURCE).unwrap(),
            SourceSummary {
                instructions: 6,
                final_depth: 3,
                max_depth: 3,
                context_len: 2,
            }
        );
    }

    #[test]
    fn analyze_rejects_underflow() {
        let s = script(&[(Instruction::Constant, 0), (Instruction::Sub, 2)], &[1]);
        assert_eq!(
            s.analyze(0),
            Err(VMError::StackUnderflow {
                instruction: "SUB",
                offset: 2,
                required: 2,
                available: 1
            })
        );
    }

    #[test]
    fn analyze_rejects_bad_operands() {
        let bad_constant = script(&[(Instruction::Constant, 1)], &[1]);
        assert!(matches!(
            bad_constant.analyze(0),
            Err(VMError::ConstantOutOfBounds { index: 1, available: 1, .. })
        ));

        let bad_stack = script(&[(Instruction::Constant, 0), (Instruction::Stack, 1)], &[1]);
        assert!(matches!(
            bad_stack.analyze(0),
            Err(VMError::StackReadOutOfBounds { index: 1, depth: 1, .. })
        ));

        let bad_slot = script(&[(Instruction::Storage, 7)], &[]);
        assert!(matches!(
            bad_slot.analyze(0),
            Err(VMError::InvalidStorageSlot { slot: 7, .. })
        ));

        let bad_cmp = script(&[(Instruction::Constant, 0), (Instruction::TimeCmp, 4)], &[1]);
        assert!(matches!(
            bad_cmp.analyze(0),
            Err(VMError::InvalidComparator { operand: 4, .. })
        ));

        let zero_count = script(&[(Instruction::Constant, 0), (Instruction::Add, 0)], &[1]);
        assert!(matches!(
            zero_count.analyze(0),
            Err(VMError::InvalidOperandCount { instruction: "ADD", .. })
        ));
    }

    #[test]
    fn analyze_rejects_unknown_opcode_and_missing_source() {
        let s = Script::new(vec![vec![0xEE, 0]], vec![]).unwrap();
        assert_eq!(
            s.analyze(0),
            Err(VMError::InvalidInstruction {
                opcode: 0xEE,
                offset: 0
            })
        );
        assert!(matches!(
            s.analyze(1),
            Err(VMError::MissingSource { index: 1, available: 1 })
        ));
    }

    #[test]
    fn analyze_rejects_stack_overflow() {
        let instrs = vec![(Instruction::Constant, 0); MAX_STACK_DEPTH + 1];
        let s = script(&instrs, &[1]);
        assert!(matches!(
            s.analyze(0),
            Err(VMError::StackOverflow { limit: MAX_STACK_DEPTH, .. })
        ));
    }
}
