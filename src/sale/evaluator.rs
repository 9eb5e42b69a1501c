//! Dual-output script evaluation.
//!
//! A sale script's entry source must leave exactly two values:
//! `[max_units, unit_price]`. Both come out of one run against one storage
//! snapshot, so the unit cap and the price always describe the same state.

use crate::debug;
use crate::types::address::Address;
use crate::types::hash::Hash;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::{ENTRY_SOURCE, Script, SourceSummary};
use crate::virtual_machine::state::{SnapshotState, StorageAccessor, TierOracle};
use crate::virtual_machine::vm::context::ExecContext;
use crate::virtual_machine::vm::{VmLimits, evaluate};
use primitive_types::U256;

/// Number of values a sale script produces.
pub const OUTPUT_WIDTH: usize = 2;

/// Context slots supplied for a purchase: `[account, units]`.
pub const BUY_CONTEXT_LEN: usize = 2;

/// What a sale script decided for one buyer at one moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptOutputs {
    /// Most units the buyer may take now.
    pub max_units: U256,
    /// Price per unit.
    pub unit_price: U256,
}

/// A script validated for use as a sale's pricing logic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaleScript {
    script: Script,
    summary: SourceSummary,
    limits: VmLimits,
}

impl SaleScript {
    /// Validates `script` statically: its entry source must be well formed,
    /// end with exactly [`OUTPUT_WIDTH`] values and fit the default step limit.
    pub fn new(script: Script) -> Result<Self, VMError> {
        let summary = script.analyze(ENTRY_SOURCE)?;
        if summary.final_depth != OUTPUT_WIDTH {
            return Err(VMError::OutputMismatch {
                expected: OUTPUT_WIDTH,
                actual: summary.final_depth,
            });
        }
        let limits = VmLimits::default();
        check_length(&summary, limits)?;
        Ok(Self {
            script,
            summary,
            limits,
        })
    }

    /// Replaces the step limit; the entry source must still run to completion under it.
    pub fn with_limits(mut self, limits: VmLimits) -> Result<Self, VMError> {
        check_length(&self.summary, limits)?;
        self.limits = limits;
        Ok(self)
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn id(&self) -> Hash {
        self.script.id()
    }

    /// Smallest context vector the script reads from.
    pub fn required_context_len(&self) -> usize {
        self.summary.context_len
    }

    /// Evaluates the script for a purchase by `account` of `target_units`.
    pub fn calculate_buy(
        &self,
        state: &dyn StorageAccessor,
        tiers: &dyn TierOracle,
        timestamp: u64,
        account: &Address,
        target_units: U256,
    ) -> Result<ScriptOutputs, VMError> {
        let context: [U256; BUY_CONTEXT_LEN] = [account.to_word(), target_units];
        self.evaluate(state, tiers, timestamp, &context)
    }

    /// Evaluates the script against an arbitrary context vector.
    pub fn evaluate(
        &self,
        state: &dyn StorageAccessor,
        tiers: &dyn TierOracle,
        timestamp: u64,
        context: &[U256],
    ) -> Result<ScriptOutputs, VMError> {
        let snapshot = SnapshotState::new(state);
        let ctx = ExecContext::new(timestamp, context).with_tiers(tiers);
        let outputs = evaluate(
            &self.script,
            ENTRY_SOURCE,
            &snapshot,
            &ctx,
            OUTPUT_WIDTH,
            self.limits,
        )?;
        debug!(
            "sale script at {timestamp}: max_units={} unit_price={}",
            outputs[0], outputs[1]
        );
        Ok(ScriptOutputs {
            max_units: outputs[0],
            unit_price: outputs[1],
        })
    }
}

// Every instruction costs one step and nothing jumps, so the source length is the step count.
fn check_length(summary: &SourceSummary, limits: VmLimits) -> Result<(), VMError> {
    if summary.instructions > limits.max_steps {
        return Err(VMError::SourceTooLong {
            instructions: summary.instructions,
            limit: limits.max_steps,
        });
    }
    Ok(())
}
