//! Currency movements required by a sale.
//!
//! [`Payments`] is the seam to whatever ledger holds buyer funds. [`Ledger`]
//! is an in-memory implementation holding native balances and token balances
//! with allowances.

use crate::types::address::Address;
use mintscript_derive::Error;
use primitive_types::U256;
use std::collections::BTreeMap;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("{account} holds {balance}, needs {amount}")]
    InsufficientBalance {
        account: Address,
        balance: U256,
        amount: U256,
    },
    #[error("{spender} may spend {allowance} for {owner}, needs {amount}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        amount: U256,
    },
}

/// Fund transfers a sale performs. `token` is `None` for the native currency.
pub trait Payments {
    /// Moves `amount` of `token` from `from` to `to` on behalf of `spender`,
    /// consuming `spender`'s allowance.
    fn transfer_from(
        &mut self,
        token: Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), PaymentError>;

    /// Moves `amount` of `token` (or native currency) held by `from`.
    fn transfer(
        &mut self,
        token: Option<Address>,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), PaymentError>;
}

type BalanceKey = (Option<Address>, Address);

#[derive(Clone, Debug, Default)]
pub struct Ledger {
    balances: BTreeMap<BalanceKey, U256>,
    /// (token, owner, spender) -> remaining allowance.
    allowances: BTreeMap<(Address, Address, Address), U256>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints funds out of thin air; for setting up balances.
    pub fn credit(&mut self, token: Option<Address>, account: Address, amount: U256) {
        let balance = self.balances.entry((token, account)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    pub fn balance_of(&self, token: Option<Address>, account: &Address) -> U256 {
        self.balances
            .get(&(token, *account))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(token, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    fn debit(&mut self, token: Option<Address>, account: &Address, amount: U256) -> Result<(), PaymentError> {
        let balance = self.balance_of(token, account);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(PaymentError::InsufficientBalance {
                account: *account,
                balance,
                amount,
            })?;
        self.balances.insert((token, *account), remaining);
        Ok(())
    }
}

impl Payments for Ledger {
    fn transfer_from(
        &mut self,
        token: Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), PaymentError> {
        let allowance = self.allowance(token, from, spender);
        let remaining = allowance
            .checked_sub(amount)
            .ok_or(PaymentError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                allowance,
                amount,
            })?;
        self.transfer(Some(token), from, to, amount)?;
        self.allowances.insert((token, *from, *spender), remaining);
        Ok(())
    }

    fn transfer(
        &mut self,
        token: Option<Address>,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), PaymentError> {
        self.debit(token, from, amount)?;
        self.credit(token, *to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn transfer_moves_native_and_token_balances_separately() {
        let alice = Address::derive(b"alice");
        let bob = Address::derive(b"bob");
        let usd = Address::derive(b"usd");
        let mut ledger = Ledger::new();
        ledger.credit(None, alice, w(10));
        ledger.credit(Some(usd), alice, w(5));

        ledger.transfer(None, &alice, &bob, w(4)).unwrap();
        assert_eq!(ledger.balance_of(None, &alice), w(6));
        assert_eq!(ledger.balance_of(None, &bob), w(4));
        assert_eq!(ledger.balance_of(Some(usd), &alice), w(5));

        assert_eq!(
            ledger.transfer(Some(usd), &alice, &bob, w(6)),
            Err(PaymentError::InsufficientBalance {
                account: alice,
                balance: w(5),
                amount: w(6)
            })
        );
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let alice = Address::derive(b"alice");
        let sale = Address::derive(b"sale");
        let usd = Address::derive(b"usd");
        let mut ledger = Ledger::new();
        ledger.credit(Some(usd), alice, w(100));
        ledger.approve(usd, alice, sale, w(30));

        ledger.transfer_from(usd, &sale, &alice, &sale, w(20)).unwrap();
        assert_eq!(ledger.allowance(usd, &alice, &sale), w(10));
        assert_eq!(ledger.balance_of(Some(usd), &sale), w(20));

        assert!(matches!(
            ledger.transfer_from(usd, &sale, &alice, &sale, w(11)),
            Err(PaymentError::InsufficientAllowance { .. })
        ));
        assert_eq!(ledger.balance_of(Some(usd), &alice), w(80));
    }

    #[test]
    fn failed_transfer_from_keeps_allowance() {
        let alice = Address::derive(b"alice");
        let sale = Address::derive(b"sale");
        let usd = Address::derive(b"usd");
        let mut ledger = Ledger::new();
        ledger.credit(Some(usd), alice, w(5));
        ledger.approve(usd, alice, sale, w(50));

        assert!(ledger.transfer_from(usd, &sale, &alice, &sale, w(6)).is_err());
        assert_eq!(ledger.allowance(usd, &alice, &sale), w(50));
    }
}
