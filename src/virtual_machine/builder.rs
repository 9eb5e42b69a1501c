//! Expression combinators for building scripts in code.
//!
//! Each combinator returns an [`Expr`]: a fragment of instructions that leaves
//! exactly one value on the stack. Fragments nest like ordinary expressions,
//! and [`pair`] / [`multi`] finish them into a [`Script`], interning every
//! literal into the constant pool on the way.
//!
//! ```ignore
//! let script = pair(
//!     min([constant(10u64), sub([storage(StorageSlot::SupplyLimit), storage(StorageSlot::TotalMinted)])]),
//!     inc_dec_price(100u64, 500u64, 1_000, 2_000),
//! )?;
//! ```

use crate::types::address::Address;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{Comparator, StorageSlot};
use crate::virtual_machine::program::{ENTRY_SOURCE, MAX_CONSTANTS, Script};
use crate::virtual_machine::vm::context::{CONTEXT_ACCOUNT, CONTEXT_UNITS};
use primitive_types::U256;
use std::collections::HashMap;

/// Largest count an n-ary instruction can carry in its operand.
const MAX_COUNT: usize = u8::MAX as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Op {
    /// Literal, resolved to a constant index when the script is finished.
    Constant(U256),
    Instr(Instruction, u8),
}

/// A script fragment computing one value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    ops: Vec<Op>,
}

impl Expr {
    fn op(instr: Instruction, operand: u8) -> Self {
        Self {
            ops: vec![Op::Instr(instr, operand)],
        }
    }

    fn then(mut self, instr: Instruction, operand: u8) -> Self {
        self.ops.push(Op::Instr(instr, operand));
        self
    }

    fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            ops: parts.into_iter().flat_map(|e| e.ops).collect(),
        }
    }
}

// =========================
// Literals and reads
// =========================

pub fn constant(value: impl Into<U256>) -> Expr {
    Expr {
        ops: vec![Op::Constant(value.into())],
    }
}

pub fn address(value: Address) -> Expr {
    constant(value.to_word())
}

pub fn context(index: u8) -> Expr {
    Expr::op(Instruction::Context, index)
}

/// The buyer address of a purchase evaluation.
pub fn account() -> Expr {
    context(CONTEXT_ACCOUNT)
}

/// The unit count requested by a purchase evaluation.
pub fn target_units() -> Expr {
    context(CONTEXT_UNITS)
}

/// Copy of the value at absolute stack position `index`.
pub fn stack(index: u8) -> Expr {
    Expr::op(Instruction::Stack, index)
}

pub fn storage(slot: StorageSlot) -> Expr {
    Expr::op(Instruction::Storage, slot as u8)
}

pub fn block_timestamp() -> Expr {
    Expr::op(Instruction::BlockTimestamp, 0)
}

pub fn number_minted(account: Expr) -> Expr {
    account.then(Instruction::NumberMinted, 0)
}

// =========================
// N-ary folds
// =========================

/// Emits a left fold of `values`, chunked so no operand exceeds one byte.
///
/// Chunking preserves the result: each chunk after the first folds the
/// running value with the next values.
fn fold(instr: Instruction, values: impl IntoIterator<Item = Expr>) -> Expr {
    let mut values = values.into_iter().peekable();
    let mut ops = Vec::new();
    let mut pending = 0usize;

    while let Some(value) = values.next() {
        ops.extend(value.ops);
        pending += 1;
        if pending == MAX_COUNT && values.peek().is_some() {
            ops.push(Op::Instr(instr, MAX_COUNT as u8));
            pending = 1;
        }
    }
    // An empty fold is encoded with count 0 and rejected by analysis.
    ops.push(Op::Instr(instr, pending as u8));
    Expr { ops }
}

pub fn add(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Add, values)
}

pub fn saturating_add(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::SaturatingAdd, values)
}

pub fn sub(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Sub, values)
}

pub fn mul(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Mul, values)
}

pub fn saturating_mul(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::SaturatingMul, values)
}

pub fn div(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Div, values)
}

pub fn modulo(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Mod, values)
}

pub fn exp(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Exp, values)
}

pub fn min(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Min, values)
}

pub fn max(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Max, values)
}

pub fn every(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Every, values)
}

pub fn any(values: impl IntoIterator<Item = Expr>) -> Expr {
    fold(Instruction::Any, values)
}

// =========================
// Comparison / boolean
// =========================

pub fn is_zero(value: Expr) -> Expr {
    value.then(Instruction::IsZero, 0)
}

pub fn equal_to(a: Expr, b: Expr) -> Expr {
    Expr::concat([a, b]).then(Instruction::EqualTo, 0)
}

pub fn less_than(a: Expr, b: Expr) -> Expr {
    Expr::concat([a, b]).then(Instruction::LessThan, 0)
}

pub fn greater_than(a: Expr, b: Expr) -> Expr {
    Expr::concat([a, b]).then(Instruction::GreaterThan, 0)
}

/// Both branches are always evaluated.
pub fn if_else(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::concat([cond, then, otherwise]).then(Instruction::EagerIf, 0)
}

// =========================
// Time windows
// =========================

/// True when `now <cmp> timestamp`.
pub fn before_after_time(timestamp: u64, cmp: Comparator) -> Expr {
    constant(timestamp).then(Instruction::TimeCmp, cmp as u8)
}

/// True when `start <= now <= end`.
pub fn between_timestamps(start: u64, end: u64) -> Expr {
    Expr::concat([constant(start), constant(end)]).then(Instruction::BetweenTimestamps, 0)
}

/// Price moving linearly from `start_price` at `start_time` to `end_price`
/// at `end_time`, then held at `end_price`.
///
/// Before `start_time` the price is `start_price`. A window with no duration
/// switches from `start_price` to `end_price` at `end_time`.
pub fn inc_dec_price(
    start_price: impl Into<U256>,
    end_price: impl Into<U256>,
    start_time: u64,
    end_time: u64,
) -> Expr {
    let (start_price, end_price) = (start_price.into(), end_price.into());
    let duration = end_time.saturating_sub(start_time);
    if duration == 0 {
        return if_else(
            before_after_time(end_time, Comparator::Gte),
            constant(end_price),
            constant(start_price),
        );
    }

    let elapsed = sub([block_timestamp(), constant(start_time)]);
    let step = |delta: U256| div([saturating_mul([elapsed.clone(), constant(delta)]), constant(duration)]);
    if end_price >= start_price {
        min([
            saturating_add([constant(start_price), step(end_price - start_price)]),
            constant(end_price),
        ])
    } else {
        max([
            sub([constant(start_price), step(start_price - end_price)]),
            constant(end_price),
        ])
    }
}

// =========================
// Tiers
// =========================

pub fn tier_level(source: Address, account: Expr) -> Expr {
    Expr::concat([account, address(source)]).then(Instruction::TierLevel, 0)
}

pub fn has_min_tier(source: Address, account: Expr, tier: u8) -> Expr {
    Expr::concat([account, address(source)]).then(Instruction::HasMinTier, tier)
}

/// True when `account` holds any tier above the lowest.
pub fn has_any_tier(source: Address, account: Expr) -> Expr {
    has_min_tier(source, account, 1)
}

// =========================
// Finishing
// =========================

/// Script leaving `[max_units, unit_price]` on the stack.
pub fn pair(max_units: Expr, unit_price: Expr) -> Result<Script, VMError> {
    multi([max_units, unit_price])
}

/// Script leaving one value per expression, in order.
///
/// Literals are interned into the constant pool in order of first use. The
/// finished source is analyzed, so a script this returns never aborts on
/// malformed bytecode.
pub fn multi(values: impl IntoIterator<Item = Expr>) -> Result<Script, VMError> {
    let ops: Vec<Op> = values.into_iter().flat_map(|e| e.ops).collect();

    let mut constants: Vec<U256> = Vec::new();
    let mut interned: HashMap<U256, usize> = HashMap::new();
    for op in &ops {
        if let Op::Constant(value) = op {
            interned.entry(*value).or_insert_with(|| {
                constants.push(*value);
                constants.len() - 1
            });
        }
    }
    if constants.len() > MAX_CONSTANTS {
        return Err(VMError::TooManyConstants {
            count: constants.len(),
            max: MAX_CONSTANTS,
        });
    }

    let mut code = Vec::with_capacity(ops.len() * 2);
    for op in &ops {
        let (instr, operand) = match op {
            Op::Constant(value) => {
                let index = interned.get(value).copied().unwrap_or_default();
                (Instruction::Constant, index as u8)
            }
            Op::Instr(instr, operand) => (*instr, *operand),
        };
        code.extend_from_slice(&[instr as u8, operand]);
    }

    let script = Script::new(vec![code], constants)?;
    script.analyze(ENTRY_SOURCE)?;
    Ok(script)
}
