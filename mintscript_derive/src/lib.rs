//! Derive macros for the mintscript crate.
//!
//! Provides:
//! - `#[derive(BinaryCodec)]` - deterministic binary serialization
//! - `#[derive(Error)]` - `Display`, `Error` and `#[from]` conversions for error enums

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for structs and fieldless or data-carrying enums.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from `#[error("...")]` messages.
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
