//! Sale controller: policy checks, payment and issuance around a sale script.
//!
//! The script decides how many units a buyer may take and at what price;
//! everything else (stock, buyer limits, payment) is enforced here. Every
//! policy rejection has a stable reason tag so callers can branch on it.

use crate::info;
use crate::sale::config::{Currency, MAX_ROYALTY_BPS, MAX_SUPPLY_LIMIT, SaleConfig};
use crate::sale::evaluator::{BUY_CONTEXT_LEN, SaleScript, ScriptOutputs};
use crate::sale::payment::{PaymentError, Payments};
use crate::sale::token::{TokenError, TokenLedger};
use crate::types::address::Address;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::StorageSlot;
use crate::virtual_machine::state::{NoTiers, StorageAccessor, TierOracle};
use mintscript_derive::Error;
use primitive_types::U256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    #[error("0_MINIMUM")]
    ZeroMinimum,
    #[error("MINIMUM_OVER_DESIRED: minimum {minimum} over desired {desired}")]
    MinimumOverDesired { minimum: U256, desired: U256 },
    #[error("INSUFFICIENT_STOCK: minimum {minimum}, available {available}")]
    InsufficientStock { minimum: U256, available: U256 },
    #[error("MAXIMUM_PRICE: unit price {price} over maximum {maximum}")]
    MaximumPrice { price: U256, maximum: U256 },
    #[error("INSUFFICIENT_FUND: sent {value}, cost {cost}")]
    InsufficientFund { value: U256, cost: U256 },
    #[error("COST_OVERFLOW: {units} units at {unit_price}")]
    CostOverflow { units: U256, unit_price: U256 },
    #[error("PAYMENT_FAILED: {0}")]
    Payment(#[from] PaymentError),
    #[error("RECIPIENT_ONLY: {caller} is not the recipient")]
    RecipientOnly { caller: Address },
    #[error("ZERO_FUND")]
    ZeroFund,
    #[error("{0}")]
    Token(#[from] TokenError),
    #[error("MAX_ROYALTY: {bps} basis points")]
    MaxRoyalty { bps: u16 },
    #[error("MAX_SUPPLY: supply limit {limit} over {max}")]
    MaxSupply { limit: u64, max: u64 },
    #[error("CONTEXT_LENGTH: script reads {required} context slots, purchases supply {supplied}")]
    ContextLength { required: usize, supplied: usize },
    #[error("OWNER_ONLY: {caller} is not the owner")]
    OwnerOnly { caller: Address },
    #[error("SCRIPT: {0}")]
    Script(#[from] VMError),
}

impl SaleError {
    /// Stable tag identifying the cause.
    pub fn reason(&self) -> &'static str {
        match self {
            SaleError::ZeroMinimum => "0_MINIMUM",
            SaleError::MinimumOverDesired { .. } => "MINIMUM_OVER_DESIRED",
            SaleError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            SaleError::MaximumPrice { .. } => "MAXIMUM_PRICE",
            SaleError::InsufficientFund { .. } => "INSUFFICIENT_FUND",
            SaleError::CostOverflow { .. } => "COST_OVERFLOW",
            SaleError::Payment(_) => "PAYMENT_FAILED",
            SaleError::RecipientOnly { .. } => "RECIPIENT_ONLY",
            SaleError::ZeroFund => "ZERO_FUND",
            SaleError::Token(TokenError::NotOwner { .. }) => "NOT_OWNER",
            SaleError::Token(TokenError::InvalidToken { .. }) => "INVALID_TOKEN",
            SaleError::Token(TokenError::IdsExhausted { .. }) => "IDS_EXHAUSTED",
            SaleError::MaxRoyalty { .. } => "MAX_ROYALTY",
            SaleError::MaxSupply { .. } => "MAX_SUPPLY",
            SaleError::ContextLength { .. } => "CONTEXT_LENGTH",
            SaleError::OwnerOnly { .. } => "OWNER_ONLY",
            SaleError::Script(_) => "SCRIPT",
        }
    }
}

/// A buyer's purchase request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuyConfig {
    /// Fewest units the buyer accepts; the purchase fails below this.
    pub minimum_units: U256,
    /// Units the buyer would like.
    pub desired_units: U256,
    /// Highest unit price the buyer accepts.
    pub maximum_price: U256,
}

/// Caller-side facts of one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallEnv {
    pub caller: Address,
    /// Native currency attached to the call.
    pub value: U256,
    pub timestamp: u64,
}

impl CallEnv {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            value: U256::zero(),
            timestamp,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintReceipt {
    pub first_token_id: u64,
    pub units: u64,
    pub unit_price: U256,
    pub total_cost: U256,
    /// Native currency returned to the buyer.
    pub refund: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub withdrawer: Address,
    pub amount: U256,
    pub total_withdrawn: U256,
}

/// A deployed sale.
pub struct Sale {
    config: SaleConfig,
    script: SaleScript,
    tokens: TokenLedger,
    tiers: Box<dyn TierOracle>,
    /// Proceeds held by the sale, not yet withdrawn.
    proceeds: U256,
    total_withdrawn: U256,
}

impl Sale {
    /// Deploys a sale; the script must already be validated as a [`SaleScript`]
    /// and read no context beyond `[account, units]`.
    pub fn new(config: SaleConfig, script: SaleScript) -> Result<Self, SaleError> {
        if config.royalty_bps > MAX_ROYALTY_BPS {
            return Err(SaleError::MaxRoyalty {
                bps: config.royalty_bps,
            });
        }
        if config.supply_limit > MAX_SUPPLY_LIMIT {
            return Err(SaleError::MaxSupply {
                limit: config.supply_limit,
                max: MAX_SUPPLY_LIMIT,
            });
        }
        if script.required_context_len() > BUY_CONTEXT_LEN {
            return Err(SaleError::ContextLength {
                required: script.required_context_len(),
                supplied: BUY_CONTEXT_LEN,
            });
        }

        info!(
            "deploying sale: name={} symbol={} supply_limit={} script={} context_len={}",
            config.name,
            config.symbol,
            config.supply_limit,
            script.id().short(),
            script.required_context_len()
        );

        Ok(Self {
            config,
            script,
            tokens: TokenLedger::new(),
            tiers: Box::new(NoTiers),
            proceeds: U256::zero(),
            total_withdrawn: U256::zero(),
        })
    }

    /// Replaces the tier oracle consulted by tier predicates.
    pub fn with_tiers(mut self, tiers: impl TierOracle + 'static) -> Self {
        self.tiers = Box::new(tiers);
        self
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn proceeds(&self) -> U256 {
        self.proceeds
    }

    pub fn total_withdrawn(&self) -> U256 {
        self.total_withdrawn
    }

    /// Units that can still be minted under the supply limit.
    pub fn remaining_units(&self) -> u64 {
        self.config
            .supply_limit
            .saturating_sub(self.tokens.total_minted())
    }

    /// Evaluates the sale script for `account` wanting `target_units` at `timestamp`.
    pub fn calculate_buy(
        &self,
        account: &Address,
        target_units: U256,
        timestamp: u64,
    ) -> Result<ScriptOutputs, SaleError> {
        Ok(self
            .script
            .calculate_buy(self, self.tiers.as_ref(), timestamp, account, target_units)?)
    }

    /// Buys and mints tokens for the caller.
    ///
    /// Nothing changes unless every check passes and payment succeeds.
    pub fn mint_nft(
        &mut self,
        env: &CallEnv,
        buy: &BuyConfig,
        payments: &mut dyn Payments,
    ) -> Result<MintReceipt, SaleError> {
        if buy.minimum_units.is_zero() {
            return Err(SaleError::ZeroMinimum);
        }
        if buy.minimum_units > buy.desired_units {
            return Err(SaleError::MinimumOverDesired {
                minimum: buy.minimum_units,
                desired: buy.desired_units,
            });
        }

        let remaining = U256::from(self.remaining_units());
        let mut units = buy.desired_units.min(remaining);
        if buy.minimum_units > units {
            return Err(SaleError::InsufficientStock {
                minimum: buy.minimum_units,
                available: units,
            });
        }

        let outputs = self.calculate_buy(&env.caller, units, env.timestamp)?;
        units = units.min(outputs.max_units);
        if buy.minimum_units > units {
            return Err(SaleError::InsufficientStock {
                minimum: buy.minimum_units,
                available: units,
            });
        }
        if outputs.unit_price > buy.maximum_price {
            return Err(SaleError::MaximumPrice {
                price: outputs.unit_price,
                maximum: buy.maximum_price,
            });
        }

        let total_cost = units
            .checked_mul(outputs.unit_price)
            .ok_or(SaleError::CostOverflow {
                units,
                unit_price: outputs.unit_price,
            })?;

        let refund = match self.config.currency {
            Currency::Token(token) => {
                let sale = self.config.address;
                payments.transfer_from(token, &sale, &env.caller, &sale, total_cost)?;
                U256::zero()
            }
            Currency::Native => {
                if env.value < total_cost {
                    return Err(SaleError::InsufficientFund {
                        value: env.value,
                        cost: total_cost,
                    });
                }
                let refund = env.value - total_cost;
                payments.transfer(None, &env.caller, &self.config.address, total_cost)?;
                refund
            }
        };
        self.proceeds = self.proceeds.saturating_add(total_cost);

        // `units` fits the remaining stock, and the supply limit keeps every id in range.
        let minted = self.tokens.mint(env.caller, units.low_u64())?;
        info!(
            "minted: buyer={} units={} unit_price={} cost={} first_id={}",
            env.caller, units, outputs.unit_price, total_cost, minted.start
        );

        Ok(MintReceipt {
            first_token_id: minted.start,
            units: units.low_u64(),
            unit_price: outputs.unit_price,
            total_cost,
            refund,
        })
    }

    /// Sends all held proceeds to the recipient.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        payments: &mut dyn Payments,
    ) -> Result<WithdrawReceipt, SaleError> {
        if *caller != self.config.recipient {
            return Err(SaleError::RecipientOnly { caller: *caller });
        }
        let amount = self.proceeds;
        if amount.is_zero() {
            return Err(SaleError::ZeroFund);
        }

        payments.transfer(
            self.config.currency.token(),
            &self.config.address,
            &self.config.recipient,
            amount,
        )?;
        self.proceeds = U256::zero();
        self.total_withdrawn = self.total_withdrawn.saturating_add(amount);
        info!(
            "withdrawn: recipient={} amount={} total={}",
            caller, amount, self.total_withdrawn
        );

        Ok(WithdrawReceipt {
            withdrawer: *caller,
            amount,
            total_withdrawn: self.total_withdrawn,
        })
    }

    /// Hands the right to withdraw and receive royalties to `recipient`.
    pub fn set_recipient(&mut self, caller: &Address, recipient: Address) -> Result<(), SaleError> {
        if *caller != self.config.recipient {
            return Err(SaleError::RecipientOnly { caller: *caller });
        }
        info!("recipient changed: {} -> {}", self.config.recipient, recipient);
        self.config.recipient = recipient;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &Address, owner: Address) -> Result<(), SaleError> {
        if *caller != self.config.owner {
            return Err(SaleError::OwnerOnly { caller: *caller });
        }
        info!("ownership transferred: {} -> {}", self.config.owner, owner);
        self.config.owner = owner;
        Ok(())
    }

    /// Burns a token held by `caller`. Burned units stay counted as minted.
    pub fn burn(&mut self, caller: &Address, id: u64) -> Result<(), SaleError> {
        Ok(self.tokens.burn(caller, id)?)
    }

    /// Royalty receiver and amount owed on a secondary sale at `sale_price`.
    pub fn royalty_info(&self, sale_price: U256) -> (Address, U256) {
        let bps = U256::from(self.config.royalty_bps);
        let denominator = U256::from(MAX_ROYALTY_BPS);
        // Split so the product cannot overflow: bps <= denominator.
        let amount = sale_price / denominator * bps + sale_price % denominator * bps / denominator;
        (self.config.recipient, amount)
    }

    pub fn token_uri(&self, id: u64) -> Result<String, SaleError> {
        if !self.tokens.exists(id) {
            return Err(TokenError::InvalidToken { id }.into());
        }
        Ok(format!("{}{id}", self.config.base_uri))
    }
}

impl StorageAccessor for Sale {
    fn read(&self, slot: StorageSlot) -> U256 {
        match slot {
            StorageSlot::SupplyLimit => U256::from(self.config.supply_limit),
            StorageSlot::TotalSupply => U256::from(self.tokens.total_supply()),
            StorageSlot::TotalMinted => U256::from(self.tokens.total_minted()),
        }
    }

    fn number_minted(&self, account: &Address) -> U256 {
        U256::from(self.tokens.number_minted(account))
    }
}
