//! Primitive types shared by the virtual machine and the sale layer.
//!
//! - `Address`: 20-byte account identifier, widened to a 256-bit word for scripts
//! - `Hash`: SHA3-256 digests
//! - `encoding`: deterministic binary codec used for scripts
//!
//! 256-bit words are [`primitive_types::U256`] throughout.

pub mod address;
pub mod encoding;
pub mod hash;
