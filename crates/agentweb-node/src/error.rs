//! Error types for agentweb-node.

use agentweb_core::CoreError;
use agentweb_escrow::EscrowError;
use agentweb_registry::{RegistryError, Subject};
use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors returned by the protocol facade.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Escrow session failure.
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    /// Registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Core type failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Stable name of the failure kind, for API responses and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Escrow(e) => match e {
                EscrowError::InvalidAmount { .. } => "InvalidAmount",
                EscrowError::NotFound { .. } => "NotFound",
                EscrowError::InvalidTransition { .. } => "InvalidTransition",
                EscrowError::InsufficientEscrowBalance { .. } => "InsufficientEscrowBalance",
                EscrowError::PaymentTooSmall { .. } => "PaymentTooSmall",
                EscrowError::ConfirmationTimeout { .. } => "ConfirmationTimeout",
                EscrowError::TransactionRejected { .. } => "TransactionRejected",
                EscrowError::Cancelled { .. } => "Cancelled",
                EscrowError::SettlementPartialFailure { .. } => "SettlementPartialFailure",
                EscrowError::Ledger { .. } => "LedgerError",
                EscrowError::Config(_) => "Config",
            },
            Self::Registry(e) => match e {
                RegistryError::InvalidSignature { .. } => "InvalidSignature",
                RegistryError::OwnershipVerificationFailed { .. } => "OwnershipVerificationFailed",
                RegistryError::AlreadyRegistered(_) => "AlreadyRegistered",
                RegistryError::NotFound(_) => "NotFound",
                RegistryError::Unauthorized { .. } => "Unauthorized",
                RegistryError::Inactive { .. } => "Inactive",
                RegistryError::InvalidIdentifier(_) | RegistryError::Core(_) => "InvalidInput",
                RegistryError::Confirmation { .. } => "ConfirmationTimeout",
                RegistryError::Verifier(_) => "Config",
            },
            Self::Core(_) => "InvalidInput",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
        }
    }

    /// True for lookups of unknown sessions, agents or websites.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == "NotFound"
    }

    /// Create a not found error for a website.
    #[must_use]
    pub fn website_not_found(domain: impl Into<String>) -> Self {
        Self::Registry(RegistryError::NotFound(Subject::Website(domain.into())))
    }
}
