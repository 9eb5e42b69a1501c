//! In-memory NFT ledger backing a sale.
//!
//! Token ids are sequential from 1. Two counters are kept apart: tokens in
//! circulation (minted minus burned) and tokens ever minted, which only grows.
//! Ownership is recorded once per mint batch, at the batch's first id.

use crate::types::address::Address;
use mintscript_derive::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// First id handed out.
pub const FIRST_TOKEN_ID: u64 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("NOT_OWNER: {caller} does not own token {id}")]
    NotOwner { caller: Address, id: u64 },
    #[error("INVALID_TOKEN: token {id} does not exist")]
    InvalidToken { id: u64 },
    #[error("IDS_EXHAUSTED: cannot mint {quantity} more tokens")]
    IdsExhausted { quantity: u64 },
}

#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    /// Owner of each batch, keyed by its first id.
    batches: BTreeMap<u64, Address>,
    burned_ids: BTreeSet<u64>,
    /// Tokens ever minted to each address.
    minted: BTreeMap<Address, u64>,
    balances: BTreeMap<Address, u64>,
    total_minted: u64,
    burned: u64,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `quantity` consecutive tokens to `to`, returning their ids.
    pub fn mint(&mut self, to: Address, quantity: u64) -> Result<Range<u64>, TokenError> {
        let first = FIRST_TOKEN_ID + self.total_minted;
        let end = first
            .checked_add(quantity)
            .ok_or(TokenError::IdsExhausted { quantity })?;
        if quantity > 0 {
            self.batches.insert(first, to);
        }
        *self.minted.entry(to).or_default() += quantity;
        *self.balances.entry(to).or_default() += quantity;
        self.total_minted += quantity;
        Ok(first..end)
    }

    /// Destroys token `id`; only its owner may burn it.
    pub fn burn(&mut self, caller: &Address, id: u64) -> Result<(), TokenError> {
        let owner = self.owner_of(id)?;
        if owner != *caller {
            return Err(TokenError::NotOwner {
                caller: *caller,
                id,
            });
        }
        self.burned_ids.insert(id);
        if let Some(balance) = self.balances.get_mut(caller) {
            *balance -= 1;
        }
        self.burned += 1;
        Ok(())
    }

    pub fn owner_of(&self, id: u64) -> Result<Address, TokenError> {
        if !self.exists(id) {
            return Err(TokenError::InvalidToken { id });
        }
        self.batches
            .range(..=id)
            .next_back()
            .map(|(_, owner)| *owner)
            .ok_or(TokenError::InvalidToken { id })
    }

    pub fn exists(&self, id: u64) -> bool {
        id >= FIRST_TOKEN_ID
            && id - FIRST_TOKEN_ID < self.total_minted
            && !self.burned_ids.contains(&id)
    }

    /// Tokens currently held by `owner`.
    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    /// Tokens ever minted to `owner`, including burned ones.
    pub fn number_minted(&self, owner: &Address) -> u64 {
        self.minted.get(owner).copied().unwrap_or_default()
    }

    /// Tokens in circulation.
    pub fn total_supply(&self) -> u64 {
        self.total_minted - self.burned
    }

    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }
}
