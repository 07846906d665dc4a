//! Ledger addresses and fungible-asset identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Longest address string accepted.
const MAX_ADDRESS_LEN: usize = 128;

/// A ledger account address.
///
/// The core treats addresses as opaque strings; ledgers that derive them from
/// Ed25519 keys use base58 via [`Address::from_public_key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Creates an address, rejecting empty, oversized or whitespace-bearing strings.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidAddress` if the string is not a plausible address.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CoreError::InvalidAddress("address cannot be empty".into()));
        }
        if s.len() > MAX_ADDRESS_LEN {
            return Err(CoreError::InvalidAddress(format!(
                "address exceeds {MAX_ADDRESS_LEN} characters"
            )));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidAddress(format!(
                "address contains whitespace: {s:?}"
            )));
        }
        Ok(Self(s))
    }

    /// Derives a base58 address from a 32-byte public key.
    #[must_use]
    pub fn from_public_key(bytes: &[u8; 32]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    /// Returns the address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the fungible asset a payment is denominated in.
///
/// `0` is the ledger's native asset; any other value names an issued asset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetId(u64);

impl AssetId {
    /// The ledger's native asset.
    pub const NATIVE: Self = Self(0);

    /// Creates an asset id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for the native asset.
    #[must_use]
    pub const fn is_native(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "asset:{}", self.0)
        }
    }
}
