//! Core virtual machine implementation.
//!
//! The VM runs one source of a [`Script`] as a straight-line pass: it decodes
//! the instruction at the instruction pointer, dispatches it, and advances by
//! one instruction until the end of the source. There are no jumps, so every
//! run terminates; the step ceiling in [`VmLimits`] bounds the work done on
//! hostile or corrupted input all the same.
//!
//! Values are 256-bit unsigned words. Booleans are canonical: `1` for true,
//! `0` for false, and any nonzero input counts as true.

pub mod context;
pub mod stack;

use crate::types::address::Address;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Arity, INSTRUCTION_WIDTH, Instruction};
use crate::virtual_machine::operand::{Comparator, StorageSlot};
use crate::virtual_machine::program::Script;
use crate::virtual_machine::state::{StorageAccessor, resolve_tier};
use context::ExecContext;
use primitive_types::U256;
use stack::Stack;

/// Default ceiling on executed instructions per run.
pub const DEFAULT_MAX_STEPS: usize = 4096;

/// Execution limits applied to every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmLimits {
    pub max_steps: usize,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        state = $state:ident,
        ctx = $ctx:ident,
        instr = $instr:ident,
        at = $at:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    let instr_name = $instr.mnemonic();
                    exec_vm!(@call $vm, $state, $ctx, instr_name, $at, $handler, $args)
                }
            ),*
        }
    }};

    // Handler reading storage or context (semicolon separator)
    (@call $vm:ident, $state:ident, $ctx:ident, $instr_name:expr, $at:ident, $handler:ident,
        (env; $( $arg:ident ),* $(,)? )
    ) => {{
        $vm.$handler($instr_name, $at, $state, $ctx, $( $arg ),*)
    }};

    // Pure stack handler (no semicolon)
    (@call $vm:ident, $state:ident, $ctx:ident, $instr_name:expr, $at:ident, $handler:ident,
        ( $( $arg:ident ),* $(,)? )
    ) => {{
        $vm.$handler($instr_name, $at, $( $arg ),*)
    }};
}

fn flag(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}

/// Script interpreter.
///
/// One `VM` borrows one script; each [`VM::run`] starts from an empty stack.
pub struct VM<'s> {
    /// Script being executed.
    script: &'s Script,
    /// Source currently executing.
    data: &'s [u8],
    /// Index of the source currently executing.
    source: usize,
    /// Instruction pointer (byte offset into `data`).
    ip: usize,
    /// Evaluation stack.
    stack: Stack,
    /// Instructions executed by the current run.
    steps: usize,
    limits: VmLimits,
}

impl<'s> VM<'s> {
    pub fn new(script: &'s Script) -> Self {
        Self::with_limits(script, VmLimits::default())
    }

    pub fn with_limits(script: &'s Script, limits: VmLimits) -> Self {
        Self {
            script,
            data: &[],
            source: 0,
            ip: 0,
            stack: Stack::new(),
            steps: 0,
            limits,
        }
    }

    /// Executes `source` to completion, leaving its results on the stack.
    ///
    /// Any error aborts the whole run; the stack is then unspecified.
    pub fn run(
        &mut self,
        source: usize,
        state: &dyn StorageAccessor,
        ctx: &ExecContext,
    ) -> Result<(), VMError> {
        let script: &'s Script = self.script;
        self.data = script.source(source)?;
        self.source = source;
        self.ip = 0;
        self.steps = 0;
        self.stack.clear();

        while self.ip < self.data.len() {
            self.steps += 1;
            if self.steps > self.limits.max_steps {
                return Err(VMError::StepLimitExceeded {
                    limit: self.limits.max_steps,
                });
            }

            let at = self.ip;
            let raw = self.read_exact(INSTRUCTION_WIDTH)?;
            let (opcode, operand) = (raw[0], raw[1]);
            let instr = Instruction::try_from(opcode)
                .map_err(|_| VMError::InvalidInstruction { opcode, offset: at })?;
            self.exec(instr, operand, at, state, ctx)?;
        }
        Ok(())
    }

    /// Current stack contents, bottom first.
    pub fn stack(&self) -> &[U256] {
        self.stack.as_slice()
    }

    /// Instructions executed by the last run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Takes the final stack, which must hold exactly `expected` values.
    pub fn into_outputs(self, expected: usize) -> Result<Vec<U256>, VMError> {
        if self.stack.len() != expected {
            return Err(VMError::OutputMismatch {
                expected,
                actual: self.stack.len(),
            });
        }
        Ok(self.stack.into_vec())
    }

    /// Reads exactly `count` bytes from the current source at the current IP.
    ///
    /// Advances the instruction pointer by `count` bytes.
    fn read_exact(&mut self, count: usize) -> Result<&'s [u8], VMError> {
        let start = self.ip;
        let data: &'s [u8] = self.data;
        let slice = start
            .checked_add(count)
            .and_then(|end| data.get(start..end))
            .ok_or(VMError::UnexpectedEndOfSource {
                source: self.source,
                offset: start,
            })?;
        self.ip = start + count;
        Ok(slice)
    }

    /// Executes a single instruction.
    fn exec(
        &mut self,
        instruction: Instruction,
        operand: u8,
        at: usize,
        state: &dyn StorageAccessor,
        ctx: &ExecContext,
    ) -> Result<(), VMError> {
        if instruction.arity() == Arity::Operand && operand == 0 {
            return Err(VMError::InvalidOperandCount {
                instruction: instruction.mnemonic(),
                offset: at,
                operand,
            });
        }

        exec_vm! {
            vm = self,
            state = state,
            ctx = ctx,
            instr = instruction,
            at = at,
            {
                // Literals and reads
                Constant => op_constant(operand),
                Stack => op_stack(operand),
                Context => op_context(env; operand),
                Storage => op_storage(env; operand),
                BlockTimestamp => op_block_timestamp(env;),
                NumberMinted => op_number_minted(env;),
                // Arithmetic
                Add => op_add(operand),
                SaturatingAdd => op_saturating_add(operand),
                Sub => op_sub(operand),
                Mul => op_mul(operand),
                SaturatingMul => op_saturating_mul(operand),
                Div => op_div(operand),
                Mod => op_mod(operand),
                Exp => op_exp(operand),
                Min => op_min(operand),
                Max => op_max(operand),
                // Comparison / boolean
                IsZero => op_is_zero(),
                EqualTo => op_equal_to(),
                LessThan => op_less_than(),
                GreaterThan => op_greater_than(),
                Every => op_every(operand),
                Any => op_any(operand),
                EagerIf => op_eager_if(),
                // Time windows
                TimeCmp => op_time_cmp(env; operand),
                BetweenTimestamps => op_between_timestamps(env;),
                // Tiers
                TierLevel => op_tier_level(env;),
                HasMinTier => op_has_min_tier(env; operand),
            }
        }
    }

    /// Pops `n` values and folds them left to right with `step`.
    fn fold(
        &mut self,
        instr: &'static str,
        at: usize,
        n: u8,
        step: impl Fn(U256, U256) -> Result<U256, VMError>,
    ) -> Result<(), VMError> {
        let values = self.stack.pop_n(usize::from(n), instr, at)?;
        let mut acc = values[0];
        for value in &values[1..] {
            acc = step(acc, *value)?;
        }
        self.stack.push(acc, instr, at)
    }

    /// Pops two values, pushing the canonical boolean of `test(a, b)`.
    fn compare(
        &mut self,
        instr: &'static str,
        at: usize,
        test: impl Fn(U256, U256) -> bool,
    ) -> Result<(), VMError> {
        let b = self.stack.pop(instr, at)?;
        let a = self.stack.pop(instr, at)?;
        self.stack.push(flag(test(a, b)), instr, at)
    }

    fn op_constant(&mut self, instr: &'static str, at: usize, index: u8) -> Result<(), VMError> {
        let constants = self.script.constants();
        let value = constants
            .get(usize::from(index))
            .copied()
            .ok_or(VMError::ConstantOutOfBounds {
                offset: at,
                index,
                available: constants.len(),
            })?;
        self.stack.push(value, instr, at)
    }

    fn op_stack(&mut self, instr: &'static str, at: usize, index: u8) -> Result<(), VMError> {
        let value = self
            .stack
            .get(usize::from(index))
            .ok_or(VMError::StackReadOutOfBounds {
                offset: at,
                index,
                depth: self.stack.len(),
            })?;
        self.stack.push(value, instr, at)
    }

    fn op_context(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
        index: u8,
    ) -> Result<(), VMError> {
        let value = ctx
            .context
            .get(usize::from(index))
            .copied()
            .ok_or(VMError::ContextOutOfBounds {
                offset: at,
                index,
                available: ctx.context.len(),
            })?;
        self.stack.push(value, instr, at)
    }

    fn op_storage(
        &mut self,
        instr: &'static str,
        at: usize,
        state: &dyn StorageAccessor,
        _ctx: &ExecContext,
        slot: u8,
    ) -> Result<(), VMError> {
        let slot = StorageSlot::try_from(slot)
            .map_err(|slot| VMError::InvalidStorageSlot { offset: at, slot })?;
        self.stack.push(state.read(slot), instr, at)
    }

    fn op_block_timestamp(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
    ) -> Result<(), VMError> {
        self.stack.push(U256::from(ctx.timestamp), instr, at)
    }

    fn op_number_minted(
        &mut self,
        instr: &'static str,
        at: usize,
        state: &dyn StorageAccessor,
        _ctx: &ExecContext,
    ) -> Result<(), VMError> {
        let account = Address::from_word(self.stack.pop(instr, at)?);
        self.stack.push(state.number_minted(&account), instr, at)
    }

    fn op_add(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| {
            a.checked_add(b).ok_or(VMError::ArithmeticOverflow {
                instruction: instr,
                offset: at,
            })
        })
    }

    fn op_saturating_add(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| Ok(a.saturating_add(b)))
    }

    fn op_sub(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| Ok(a.saturating_sub(b)))
    }

    fn op_mul(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| {
            a.checked_mul(b).ok_or(VMError::ArithmeticOverflow {
                instruction: instr,
                offset: at,
            })
        })
    }

    fn op_saturating_mul(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| Ok(a.saturating_mul(b)))
    }

    fn op_div(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| {
            a.checked_div(b).ok_or(VMError::DivisionByZero {
                instruction: instr,
                offset: at,
            })
        })
    }

    fn op_mod(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| {
            a.checked_rem(b).ok_or(VMError::DivisionByZero {
                instruction: instr,
                offset: at,
            })
        })
    }

    fn op_exp(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| {
            a.checked_pow(b).ok_or(VMError::ArithmeticOverflow {
                instruction: instr,
                offset: at,
            })
        })
    }

    fn op_min(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| Ok(a.min(b)))
    }

    fn op_max(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        self.fold(instr, at, n, |a, b| Ok(a.max(b)))
    }

    fn op_is_zero(&mut self, instr: &'static str, at: usize) -> Result<(), VMError> {
        let a = self.stack.pop(instr, at)?;
        self.stack.push(flag(a.is_zero()), instr, at)
    }

    fn op_equal_to(&mut self, instr: &'static str, at: usize) -> Result<(), VMError> {
        self.compare(instr, at, |a, b| a == b)
    }

    fn op_less_than(&mut self, instr: &'static str, at: usize) -> Result<(), VMError> {
        self.compare(instr, at, |a, b| a < b)
    }

    fn op_greater_than(&mut self, instr: &'static str, at: usize) -> Result<(), VMError> {
        self.compare(instr, at, |a, b| a > b)
    }

    fn op_every(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        let values = self.stack.pop_n(usize::from(n), instr, at)?;
        self.stack
            .push(flag(values.iter().all(|v| !v.is_zero())), instr, at)
    }

    fn op_any(&mut self, instr: &'static str, at: usize, n: u8) -> Result<(), VMError> {
        let values = self.stack.pop_n(usize::from(n), instr, at)?;
        self.stack
            .push(flag(values.iter().any(|v| !v.is_zero())), instr, at)
    }

    fn op_eager_if(&mut self, instr: &'static str, at: usize) -> Result<(), VMError> {
        let otherwise = self.stack.pop(instr, at)?;
        let then = self.stack.pop(instr, at)?;
        let cond = self.stack.pop(instr, at)?;
        let selected = if cond.is_zero() { otherwise } else { then };
        self.stack.push(selected, instr, at)
    }

    fn op_time_cmp(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
        operand: u8,
    ) -> Result<(), VMError> {
        let cmp = Comparator::try_from(operand)
            .map_err(|operand| VMError::InvalidComparator { offset: at, operand })?;
        let timestamp = self.stack.pop(instr, at)?;
        let now = U256::from(ctx.timestamp);
        self.stack.push(flag(cmp.holds(now, timestamp)), instr, at)
    }

    fn op_between_timestamps(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
    ) -> Result<(), VMError> {
        let end = self.stack.pop(instr, at)?;
        let start = self.stack.pop(instr, at)?;
        let now = U256::from(ctx.timestamp);
        self.stack.push(flag(start <= now && now <= end), instr, at)
    }

    /// Pops `[account, source]` and resolves the account's tier.
    fn pop_tier(&mut self, instr: &'static str, at: usize, ctx: &ExecContext) -> Result<u32, VMError> {
        let source = Address::from_word(self.stack.pop(instr, at)?);
        let account = Address::from_word(self.stack.pop(instr, at)?);
        Ok(resolve_tier(ctx.tiers, &source, &account))
    }

    fn op_tier_level(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
    ) -> Result<(), VMError> {
        let level = self.pop_tier(instr, at, ctx)?;
        self.stack.push(U256::from(level), instr, at)
    }

    fn op_has_min_tier(
        &mut self,
        instr: &'static str,
        at: usize,
        _state: &dyn StorageAccessor,
        ctx: &ExecContext,
        minimum: u8,
    ) -> Result<(), VMError> {
        let level = self.pop_tier(instr, at, ctx)?;
        self.stack.push(flag(level >= u32::from(minimum)), instr, at)
    }
}

/// Runs `source` of `script` and returns exactly `outputs` values, bottom first.
pub fn evaluate(
    script: &Script,
    source: usize,
    state: &dyn StorageAccessor,
    ctx: &ExecContext,
    outputs: usize,
    limits: VmLimits,
) -> Result<Vec<U256>, VMError> {
    let mut vm = VM::with_limits(script, limits);
    vm.run(source, state, ctx)?;
    vm.into_outputs(outputs)
}
