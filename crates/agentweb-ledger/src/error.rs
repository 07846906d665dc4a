//! Error types for ledger operations.

use agentweb_core::{Address, Amount};
use thiserror::Error;

use crate::transaction::TxRef;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors reported by a ledger client.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Source account cannot cover the transfer.
    #[error("insufficient balance at {address}: have {have}, need {need}")]
    InsufficientBalance {
        /// Account that was debited.
        address: Address,
        /// Current balance.
        have: Amount,
        /// Required balance.
        need: Amount,
    },

    /// Transfer was refused by the ledger.
    #[error("transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Transaction reference is unknown to the ledger.
    #[error("transaction not found: {tx_ref}")]
    TransactionNotFound {
        /// Transaction reference.
        tx_ref: TxRef,
    },

    /// The ledger does not support the requested operation.
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Operation name.
        operation: String,
    },

    /// Node could not be reached or answered with garbage.
    #[error("network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },
}

impl LedgerError {
    /// Create a transfer failed error.
    #[must_use]
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_balance_display() {
        let err = LedgerError::InsufficientBalance {
            address: Address::new("ESCROW1").unwrap(),
            have: Amount::from_micro(500),
            need: Amount::from_micro(5000),
        };
        let msg = err.to_string();
        assert!(msg.contains("ESCROW1"));
        assert!(msg.contains("0.000500"));
        assert!(msg.contains("0.005000"));
    }

    #[test]
    fn transfer_failed_display() {
        let err = LedgerError::transfer_failed("receiver not opted in");
        assert!(err.to_string().contains("receiver not opted in"));
    }
}
