//! Error types for agentweb-core.

use thiserror::Error;

/// Errors that can occur in core primitive operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid amount (overflow, negative, or malformed).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid ledger address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Key material could not be decoded.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}
