//! # Addresses & Market Tags
//!
//! Every participant in strata (end users, the router, vaults, strategy
//! modules, yield sources, the underlying assets themselves) is identified
//! by a 20-byte [`Address`]. Contracts never trust ambient context for
//! identity: the authenticated principal is passed explicitly into every
//! operation as an `Address`.
//!
//! [`MarketTag`] names the market a vault deploys into (e.g. `"lending"`,
//! `"staking"`). One vault exists per `(asset, market)` pair.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::config::MAX_MARKET_TAG_LEN;
use crate::hash::blake3_hash;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The input was not valid hex.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    /// The decoded input had the wrong number of bytes.
    #[error("invalid address length: expected {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),

    /// Market tags must be non-empty.
    #[error("market tag must not be empty")]
    EmptyMarketTag,

    /// Market tag exceeds the maximum length.
    #[error("market tag too long: {len} bytes (max {max})")]
    MarketTagTooLong {
        /// Length of the rejected tag.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Market tag contains a character outside `[a-z0-9_-]`.
    #[error("invalid character {0:?} in market tag")]
    InvalidMarketTagChar(char),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identifier.
///
/// Whether an address is a plain signing key or a deployed contract is not
/// encoded in the address itself; ask a [`CodeInspector`](crate::code::CodeInspector).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Never a valid owner, recipient, asset or module.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Derives a stable address from a human-readable label.
    ///
    /// Takes the last 20 bytes of `BLAKE3("strata/address" || label)`. Handy
    /// for naming principals in configuration and tests ("alice", "treasury").
    pub fn derive(label: &str) -> Self {
        let mut preimage = Vec::with_capacity(label.len() + 16);
        preimage.extend_from_slice(b"strata/address");
        preimage.push(0x00);
        preimage.extend_from_slice(label.as_bytes());
        let digest = blake3_hash(&preimage);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    /// Returns `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase hex with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a hex address, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "Address(0x{}…)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// MarketTag
// ---------------------------------------------------------------------------

/// A validated market label: lowercase ASCII alphanumerics, `-` and `_`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketTag(String);

impl MarketTag {
    /// Validates and wraps a market label.
    pub fn new(tag: impl Into<String>) -> Result<Self, AddressError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(AddressError::EmptyMarketTag);
        }
        if tag.len() > MAX_MARKET_TAG_LEN {
            return Err(AddressError::MarketTagTooLong {
                len: tag.len(),
                max: MAX_MARKET_TAG_LEN,
            });
        }
        if let Some(bad) = tag
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(AddressError::InvalidMarketTagChar(bad));
        }
        Ok(Self(tag))
    }

    /// The label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MarketTag {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MarketTag::new(value)
    }
}

impl From<MarketTag> for String {
    fn from(tag: MarketTag) -> Self {
        tag.0
    }
}

impl fmt::Display for MarketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MarketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarketTag({})", self.0)
    }
}
