//! Error types for agentweb-escrow.

use agentweb_core::Amount;
use agentweb_ledger::{LedgerError, TxRef, WatchError};
use thiserror::Error;

use crate::session::{SessionId, SessionState};

/// Result type alias for escrow operations.
pub type Result<T> = std::result::Result<T, EscrowError>;

/// Errors from the settlement engine.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Amount is below the configured minimum payment.
    #[error("payment too small: {amount} is below minimum {minimum}")]
    PaymentTooSmall {
        /// Requested amount.
        amount: Amount,
        /// Configured minimum.
        minimum: Amount,
    },

    /// Fee rate is above 100%.
    #[error("invalid fee: {bps} basis points")]
    InvalidFee {
        /// Offending fee rate.
        bps: u32,
    },

    /// Ledger refused the settlement; no funds moved.
    #[error("settlement transfer failed: {0}")]
    Ledger(#[from] LedgerError),

    /// Website share moved but the platform fee did not.
    #[error("partial settlement: website paid in {website_tx}, fee transfer failed: {reason}")]
    PartialFailure {
        /// Website share transfer that succeeded.
        website_tx: TxRef,
        /// Why the fee transfer failed.
        reason: String,
        /// Compensating reversal, if it went through.
        reversal: Option<TxRef>,
    },
}

/// Errors that can occur in escrow session operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Session amount must be positive.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount.
        amount: Amount,
    },

    /// Session does not exist.
    #[error("session not found: {session_id}")]
    NotFound {
        /// Requested session.
        session_id: SessionId,
    },

    /// Requested transition is not allowed from the current state.
    #[error("session {session_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Session.
        session_id: SessionId,
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// Escrow holds less than the session amount.
    #[error("session {session_id}: escrow holds {have}, expected {need}")]
    InsufficientEscrowBalance {
        /// Session.
        session_id: SessionId,
        /// Balance found in escrow.
        have: Amount,
        /// Session amount.
        need: Amount,
    },

    /// Session amount is below the minimum payment.
    #[error("session {session_id}: payment {amount} below minimum {minimum}")]
    PaymentTooSmall {
        /// Session.
        session_id: SessionId,
        /// Session amount.
        amount: Amount,
        /// Configured minimum.
        minimum: Amount,
    },

    /// The funding transaction never confirmed.
    #[error("session {session_id}: transaction {tx_ref} not confirmed after {attempts} attempts")]
    ConfirmationTimeout {
        /// Session.
        session_id: SessionId,
        /// Funding transaction.
        tx_ref: TxRef,
        /// Polls performed.
        attempts: u32,
    },

    /// The funding transaction was dropped by the ledger.
    #[error("session {session_id}: transaction {tx_ref} rejected: {reason}")]
    TransactionRejected {
        /// Session.
        session_id: SessionId,
        /// Funding transaction.
        tx_ref: TxRef,
        /// Pool error.
        reason: String,
    },

    /// Confirmation wait was cancelled because the session expired.
    #[error("session {session_id}: confirmation cancelled")]
    Cancelled {
        /// Session.
        session_id: SessionId,
    },

    /// Website was paid but the platform fee was not; needs an operator.
    #[error("session {session_id}: settlement partially failed ({reason}), website tx {website_tx}")]
    SettlementPartialFailure {
        /// Session.
        session_id: SessionId,
        /// Website share transfer that succeeded.
        website_tx: TxRef,
        /// Why the fee transfer failed.
        reason: String,
    },

    /// A ledger call failed.
    #[error("session {session_id}: ledger error: {source}")]
    Ledger {
        /// Session.
        session_id: SessionId,
        /// Underlying ledger error.
        #[source]
        source: LedgerError,
    },

    /// Configuration is invalid.
    #[error("invalid escrow config: {0}")]
    Config(String),
}

impl EscrowError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(session_id: &SessionId) -> Self {
        Self::NotFound {
            session_id: session_id.clone(),
        }
    }

    /// Create a ledger error for `session_id`.
    #[must_use]
    pub fn ledger(session_id: &SessionId, source: LedgerError) -> Self {
        Self::Ledger {
            session_id: session_id.clone(),
            source,
        }
    }

    /// Map a watcher outcome onto the session's error kinds.
    #[must_use]
    pub fn from_watch(session_id: &SessionId, err: WatchError) -> Self {
        let session_id = session_id.clone();
        match err {
            WatchError::Timeout { tx_ref, attempts } => Self::ConfirmationTimeout {
                session_id,
                tx_ref,
                attempts,
            },
            WatchError::Rejected { tx_ref, reason } => Self::TransactionRejected {
                session_id,
                tx_ref,
                reason,
            },
            WatchError::Cancelled { .. } => Self::Cancelled { session_id },
        }
    }

    /// Session the error refers to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::InvalidAmount { .. } | Self::Config(_) => None,
            Self::NotFound { session_id }
            | Self::InvalidTransition { session_id, .. }
            | Self::InsufficientEscrowBalance { session_id, .. }
            | Self::PaymentTooSmall { session_id, .. }
            | Self::ConfirmationTimeout { session_id, .. }
            | Self::TransactionRejected { session_id, .. }
            | Self::Cancelled { session_id }
            | Self::SettlementPartialFailure { session_id, .. }
            | Self::Ledger { session_id, .. } => Some(session_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_timeout_maps_to_confirmation_timeout() {
        let id = SessionId::from_string("session-1");
        let err = EscrowError::from_watch(
            &id,
            WatchError::Timeout {
                tx_ref: TxRef::from_string("TX1"),
                attempts: 10,
            },
        );
        assert!(matches!(err, EscrowError::ConfirmationTimeout { attempts: 10, .. }));
        assert_eq!(err.session_id(), Some(&id));
    }

    #[test]
    fn errors_carry_session_id_in_message() {
        let err = EscrowError::InsufficientEscrowBalance {
            session_id: SessionId::from_string("session-abc"),
            have: Amount::from_micro(10),
            need: Amount::from_micro(5000),
        };
        assert!(err.to_string().contains("session-abc"));
    }

    #[test]
    fn settlement_error_from_ledger() {
        let err: SettlementError = LedgerError::transfer_failed("opt-in missing").into();
        assert!(matches!(err, SettlementError::Ledger(_)));
    }
}
