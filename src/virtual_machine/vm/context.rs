use crate::virtual_machine::state::{NoTiers, TierOracle};
use primitive_types::U256;

/// Context slot holding the buyer address, widened to a word.
pub const CONTEXT_ACCOUNT: u8 = 0;
/// Context slot holding the number of units being evaluated.
pub const CONTEXT_UNITS: u8 = 1;

/// Per-call inputs visible to a script.
///
/// Built fresh for every evaluation and never mutated while it runs.
pub struct ExecContext<'a> {
    /// Timestamp pushed by `BLOCK_TIMESTAMP` and compared by time predicates.
    pub timestamp: u64,
    /// Values read by `CONTEXT i`.
    pub context: &'a [U256],
    /// Oracle consulted by tier predicates.
    pub tiers: &'a dyn TierOracle,
}

impl<'a> ExecContext<'a> {
    /// Context without a tier oracle; every tier lookup resolves to the lowest tier.
    pub fn new(timestamp: u64, context: &'a [U256]) -> Self {
        Self {
            timestamp,
            context,
            tiers: &NoTiers,
        }
    }

    pub fn with_tiers(mut self, tiers: &'a dyn TierOracle) -> Self {
        self.tiers = tiers;
        self
    }
}
