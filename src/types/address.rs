//! 20-byte account addresses.

use crate::types::hash::Hash;
use mintscript_derive::Error;
use primitive_types::U256;
use std::fmt;
use std::str::FromStr;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Fixed-size 20-byte address identifying buyers, recipients, tokens and tier sources.
///
/// Scripts only see 256-bit words, so addresses cross into the VM through
/// [`Address::to_word`] (big-endian in the low 160 bits) and come back through
/// [`Address::from_word`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must be 0x followed by 40 hex digits, got {input}")]
    Malformed { input: String },
}

impl Address {
    pub const fn zero() -> Address {
        Address([0u8; ADDRESS_LEN])
    }

    /// Derives an address from arbitrary seed bytes: the last 20 bytes of their SHA3-256.
    pub fn derive(seed: &[u8]) -> Address {
        let mut h = Hash::sha3();
        h.update(seed);
        let digest = h.finalize();
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest.0[digest.0.len() - ADDRESS_LEN..]);
        Address(out)
    }

    /// Widens the address into a script word.
    pub fn to_word(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Narrows a script word to an address, discarding everything above bit 160.
    pub fn from_word(word: U256) -> Address {
        let mut raw = [0u8; 32];
        word.to_big_endian(&mut raw);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&raw[32 - ADDRESS_LEN..]);
        Address(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AddressParseError::Malformed {
            input: s.to_string(),
        };
        let hex = s.strip_prefix("0x").ok_or_else(malformed)?;
        if hex.len() != ADDRESS_LEN * 2 || !hex.is_ascii() {
            return Err(malformed());
        }

        let mut out = [0u8; ADDRESS_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| malformed())?;
        }
        Ok(Address(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip_keeps_low_160_bits() {
        let address = Address::derive(b"buyer");
        let word = address.to_word();
        assert!(word.bits() <= 160);
        assert_eq!(Address::from_word(word), address);
    }

    #[test]
    fn from_word_truncates_high_bits() {
        let word = (U256::one() << 200u32) + U256::from(0xabu64);
        let mut expected = [0u8; ADDRESS_LEN];
        expected[ADDRESS_LEN - 1] = 0xab;
        assert_eq!(Address::from_word(word), Address(expected));
    }

    #[test]
    fn derive_is_deterministic_and_seed_sensitive() {
        assert_eq!(Address::derive(b"a"), Address::derive(b"a"));
        assert_ne!(Address::derive(b"a"), Address::derive(b"b"));
        assert!(!Address::derive(b"a").is_zero());
    }

    #[test]
    fn parse_and_display() {
        let text = "0x00000000000000000000000000000000000000ff";
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_word(), U256::from(0xffu64));
        assert_eq!(address.to_string(), text);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!("00ff".parse::<Address>().is_err());
        assert!("0x00ff".parse::<Address>().is_err());
        assert!("0xzz000000000000000000000000000000000000ff".parse::<Address>().is_err());
    }
}
