//! Sale script library.
//!
//! Provides a stack-based virtual machine that computes NFT sale eligibility
//! and pricing from deployable bytecode, and the sale controller consuming it.

pub mod sale;
pub mod types;
pub mod utils;
pub mod virtual_machine;
