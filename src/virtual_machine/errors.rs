use crate::types::encoding::DecodeError;
use mintscript_derive::Error;

/// Errors raised while decoding, analyzing, assembling or running a script.
///
/// Every execution-time variant is fatal for the evaluation that raised it:
/// a script that trips one of them is malformed, not unlucky.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    /// Unknown opcode encountered in a source.
    #[error("invalid instruction 0x{opcode:02x} at offset {offset}")]
    InvalidInstruction { opcode: u8, offset: usize },
    /// A source whose length is not a whole number of instructions.
    #[error("source {source} ends in the middle of an instruction at offset {offset}")]
    UnexpectedEndOfSource { source: usize, offset: usize },
    /// The requested source index does not exist.
    #[error("source {index} does not exist (script has {available})")]
    MissingSource { index: usize, available: usize },
    /// Constant pool larger than a one-byte operand can address.
    #[error("script declares {count} constants, at most {max} are addressable")]
    TooManyConstants { count: usize, max: usize },
    #[error("{instruction} at offset {offset} needs {required} stack items, found {available}")]
    StackUnderflow {
        instruction: &'static str,
        offset: usize,
        required: usize,
        available: usize,
    },
    #[error("{instruction} at offset {offset} exceeds the stack limit of {limit}")]
    StackOverflow {
        instruction: &'static str,
        offset: usize,
        limit: usize,
    },
    /// N-ary instruction asked to combine zero values.
    #[error("{instruction} at offset {offset} has operand count {operand}")]
    InvalidOperandCount {
        instruction: &'static str,
        offset: usize,
        operand: u8,
    },
    #[error("constant {index} at offset {offset} is out of bounds (pool has {available})")]
    ConstantOutOfBounds {
        offset: usize,
        index: u8,
        available: usize,
    },
    #[error("stack read {index} at offset {offset} is out of bounds (depth {depth})")]
    StackReadOutOfBounds {
        offset: usize,
        index: u8,
        depth: usize,
    },
    #[error("context slot {index} at offset {offset} is out of bounds (context has {available})")]
    ContextOutOfBounds {
        offset: usize,
        index: u8,
        available: usize,
    },
    #[error("unknown storage slot {slot} at offset {offset}")]
    InvalidStorageSlot { offset: usize, slot: u8 },
    #[error("unknown time comparator {operand} at offset {offset}")]
    InvalidComparator { offset: usize, operand: u8 },
    #[error("{instruction} at offset {offset} overflowed")]
    ArithmeticOverflow {
        instruction: &'static str,
        offset: usize,
    },
    #[error("{instruction} at offset {offset} divided by zero")]
    DivisionByZero {
        instruction: &'static str,
        offset: usize,
    },
    /// Final stack depth differs from what the consumer reads back.
    #[error("script leaves {actual} values on the stack, expected {expected}")]
    OutputMismatch { expected: usize, actual: usize },
    #[error("evaluation exceeded the step limit of {limit}")]
    StepLimitExceeded { limit: usize },
    /// Straight-line source longer than the step limit allows to finish.
    #[error("source has {instructions} instructions, over the step limit of {limit}")]
    SourceTooLong { instructions: usize, limit: usize },
    #[error("decoding error: {reason}")]
    DecodeError { reason: String },
    /// Assembly error with source location.
    #[error("line {line}, column {offset}: {message}")]
    AssemblyError {
        line: usize,
        offset: usize,
        message: String,
    },
    #[error("io error on {path}: {message}")]
    IoError { path: String, message: String },
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        VMError::DecodeError {
            reason: err.to_string(),
        }
    }
}
