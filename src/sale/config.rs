//! Deployment-time configuration of a sale.

use crate::sale::token::FIRST_TOKEN_ID;
use crate::types::address::Address;

/// Royalties are expressed in basis points of the sale price.
pub const MAX_ROYALTY_BPS: u16 = 10_000;

/// Largest supply limit whose token ids all fit in a `u64`.
pub const MAX_SUPPLY_LIMIT: u64 = u64::MAX - FIRST_TOKEN_ID;

/// Currency buyers pay in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Currency {
    /// The chain's native currency, attached to the mint call as value.
    Native,
    /// A fungible token pulled from the buyer through an allowance.
    Token(Address),
}

impl Currency {
    /// Ledger key of the currency; `None` for native.
    pub fn token(&self) -> Option<Address> {
        match self {
            Currency::Native => None,
            Currency::Token(token) => Some(*token),
        }
    }
}

/// Immutable parameters of a sale contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaleConfig {
    pub name: String,
    pub symbol: String,
    /// Prefix of every token URI.
    pub base_uri: String,
    /// Maximum number of tokens ever minted; burning never frees capacity.
    pub supply_limit: u64,
    /// Account allowed to withdraw proceeds, and the royalty receiver.
    pub recipient: Address,
    /// Administrator; the only account that may hand ownership over.
    pub owner: Address,
    /// Royalty on secondary sales, in basis points.
    pub royalty_bps: u16,
    pub currency: Currency,
    /// Address of the sale itself; proceeds are held here until withdrawn.
    pub address: Address,
}

impl SaleConfig {
    /// Native-currency sale without royalties, owned by its recipient.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        supply_limit: u64,
        recipient: Address,
    ) -> Self {
        let name = name.into();
        let address = Address::derive(name.as_bytes());
        Self {
            name,
            symbol: symbol.into(),
            base_uri: String::new(),
            supply_limit,
            recipient,
            owner: recipient,
            royalty_bps: 0,
            currency: Currency::Native,
            address,
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_royalty_bps(mut self, royalty_bps: u16) -> Self {
        self.royalty_bps = royalty_bps;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let recipient = Address::derive(b"recipient");
        let config = SaleConfig::new("Drop", "DRP", 100, recipient);
        assert_eq!(config.owner, recipient);
        assert_eq!(config.currency, Currency::Native);
        assert_eq!(config.royalty_bps, 0);
        assert_eq!(config.address, Address::derive(b"Drop"));

        let token = Address::derive(b"usd");
        let config = config
            .with_currency(Currency::Token(token))
            .with_royalty_bps(250)
            .with_base_uri("ipfs://drop/");
        assert_eq!(config.currency.token(), Some(token));
        assert_eq!(config.royalty_bps, 250);
        assert_eq!(config.base_uri, "ipfs://drop/");
        assert_eq!(Currency::Native.token(), None);
    }
}
