//! Stack-based script virtual machine for sale pricing.
//!
//! A script is evaluated against read-only sale state and a per-call context
//! to produce a fixed number of 256-bit values. Sale scripts produce two:
//! the maximum number of units a buyer may take and the price per unit.
//!
//! # Architecture
//!
//! - **Stack**: bounded stack of 256-bit unsigned words ([`vm::stack`])
//! - **Instruction format**: fixed two-byte instructions (opcode, operand)
//! - **Execution model**: straight-line; no jumps, so every run terminates
//! - **Capabilities**: storage and tier lookups are injected per evaluation
//!   ([`state`]); the VM never writes state
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, and disassembly
//! - [`builder`]: Expression combinators that compile to scripts
//! - [`errors`]: Assembly and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Operand kinds, storage slots and time comparators
//! - [`program`]: Script format, binary encoding and static analysis
//! - [`state`]: Storage accessor and tier oracle capabilities
//! - [`vm`]: Interpreter, evaluation stack and execution context

pub mod assembler;
pub mod builder;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod state;
pub mod vm;
