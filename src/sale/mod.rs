//! NFT sale driven by a pricing script.
//!
//! - [`config`]: Deployment parameters
//! - [`evaluator`]: Runs a sale script into `(max_units, unit_price)`
//! - [`controller`]: Purchase policy, payment, withdrawal and token queries
//! - [`token`]: In-memory token issuance
//! - [`payment`]: Currency transfer seam and an in-memory ledger

pub mod config;
pub mod controller;
pub mod evaluator;
pub mod payment;
pub mod token;

#[cfg(test)]
mod tests;
