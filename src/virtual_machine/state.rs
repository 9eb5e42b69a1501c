//! Read-only capabilities a script evaluates against.
//!
//! [`StorageAccessor`] exposes the sale counters and [`TierOracle`] resolves
//! membership tiers. Both are injected per evaluation, which keeps the
//! interpreter free of ambient state. [`SnapshotState`] pins every value read
//! during one evaluation so all sub-computations of a script agree.

use crate::types::address::Address;
use crate::virtual_machine::operand::StorageSlot;
use crate::warn;
use mintscript_derive::Error;
use primitive_types::U256;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Read-only view of persistent sale state.
///
/// The VM never writes through this trait.
pub trait StorageAccessor {
    /// Current value of a named slot.
    fn read(&self, slot: StorageSlot) -> U256;
    /// Units ever minted to `account`.
    fn number_minted(&self, account: &Address) -> U256;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TierError {
    #[error("no tier source at {source}")]
    UnknownSource { source: Address },
    #[error("tier source {source} failed: {reason}")]
    Failed { source: Address, reason: String },
}

/// External membership oracle consulted by tier predicates.
pub trait TierOracle {
    /// Tier level of `account` according to the tier contract at `source`.
    fn tier_of(&self, source: &Address, account: &Address) -> Result<u32, TierError>;
}

/// Lowest tier level; what any failed lookup resolves to.
pub const LOWEST_TIER: u32 = 0;

/// Resolves a tier, degrading any oracle failure to [`LOWEST_TIER`].
pub fn resolve_tier(oracle: &dyn TierOracle, source: &Address, account: &Address) -> u32 {
    match oracle.tier_of(source, account) {
        Ok(level) => level,
        Err(err) => {
            warn!("tier lookup for {account} failed, using lowest tier: {err}");
            LOWEST_TIER
        }
    }
}

/// Oracle for sales without tier gating: every source is unknown.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTiers;

impl TierOracle for NoTiers {
    fn tier_of(&self, source: &Address, _account: &Address) -> Result<u32, TierError> {
        Err(TierError::UnknownSource { source: *source })
    }
}

/// In-memory tier oracle keyed by source, then account.
///
/// Accounts absent from a known source are at the lowest tier.
#[derive(Clone, Debug, Default)]
pub struct StaticTiers {
    sources: BTreeMap<Address, BTreeMap<Address, u32>>,
}

impl StaticTiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` as a known tier contract.
    pub fn add_source(&mut self, source: Address) -> &mut Self {
        self.sources.entry(source).or_default();
        self
    }

    pub fn set_tier(&mut self, source: Address, account: Address, level: u32) -> &mut Self {
        self.sources.entry(source).or_default().insert(account, level);
        self
    }
}

impl TierOracle for StaticTiers {
    fn tier_of(&self, source: &Address, account: &Address) -> Result<u32, TierError> {
        let levels = self
            .sources
            .get(source)
            .ok_or(TierError::UnknownSource { source: *source })?;
        Ok(levels.get(account).copied().unwrap_or(LOWEST_TIER))
    }
}

/// Plain storage values, for tooling and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticState {
    pub supply_limit: U256,
    pub total_supply: U256,
    pub total_minted: U256,
    pub minted: BTreeMap<Address, U256>,
}

impl StorageAccessor for StaticState {
    fn read(&self, slot: StorageSlot) -> U256 {
        match slot {
            StorageSlot::SupplyLimit => self.supply_limit,
            StorageSlot::TotalSupply => self.total_supply,
            StorageSlot::TotalMinted => self.total_minted,
        }
    }

    fn number_minted(&self, account: &Address) -> U256 {
        self.minted.get(account).copied().unwrap_or_default()
    }
}

/// Memoizing read-through view over a base accessor.
///
/// The first read of each slot or account is forwarded to the base and
/// remembered; later reads in the same evaluation return the remembered value.
pub struct SnapshotState<'a> {
    base: &'a dyn StorageAccessor,
    slots: RefCell<BTreeMap<StorageSlot, U256>>,
    minted: RefCell<BTreeMap<Address, U256>>,
}

impl<'a> SnapshotState<'a> {
    pub fn new(base: &'a dyn StorageAccessor) -> Self {
        Self {
            base,
            slots: RefCell::new(BTreeMap::new()),
            minted: RefCell::new(BTreeMap::new()),
        }
    }
}

impl StorageAccessor for SnapshotState<'_> {
    fn read(&self, slot: StorageSlot) -> U256 {
        *self
            .slots
            .borrow_mut()
            .entry(slot)
            .or_insert_with(|| self.base.read(slot))
    }

    fn number_minted(&self, account: &Address) -> U256 {
        *self
            .minted
            .borrow_mut()
            .entry(*account)
            .or_insert_with(|| self.base.number_minted(account))
    }
}
