//! Transaction types exchanged with the ledger.

use std::fmt;

use agentweb_core::{Address, Amount, AssetId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to a submitted ledger transaction (or atomic group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef(String);

impl TxRef {
    /// Create a new random reference.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Create from a string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the reference as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One value transfer of a fungible asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Debited account.
    pub from: Address,
    /// Credited account.
    pub to: Address,
    /// Amount moved.
    pub amount: Amount,
    /// Asset moved.
    pub asset: AssetId,
}

impl Transfer {
    /// Create a transfer.
    #[must_use]
    pub fn new(from: Address, to: Address, amount: Amount, asset: AssetId) -> Self {
        Self {
            from,
            to,
            amount,
            asset,
        }
    }

    /// The same transfer in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount,
            asset: self.asset,
        }
    }
}

/// Handle to a freshly allocated escrow destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowHandle {
    /// Address funds should be sent to.
    pub address: Address,
}

/// Pending-transaction status as reported by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    /// Round the transaction was confirmed in, `0` while pending.
    pub confirmed_height: u64,
    /// Pool or validation error; set when the ledger dropped the transaction.
    pub pool_error: Option<String>,
}

impl PendingInfo {
    /// Still waiting in the pool.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            confirmed_height: 0,
            pool_error: None,
        }
    }

    /// Confirmed at `height`.
    #[must_use]
    pub const fn confirmed(height: u64) -> Self {
        Self {
            confirmed_height: height,
            pool_error: None,
        }
    }

    /// Dropped from the pool with `reason`.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            confirmed_height: 0,
            pool_error: Some(reason.into()),
        }
    }

    /// True once the transaction has a positive confirmation height.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.confirmed_height > 0
    }

    /// The pool error, if the ledger reported a non-empty one.
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        self.pool_error.as_deref().filter(|e| !e.is_empty())
    }
}

/// Network parameters needed to build a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedParams {
    /// Fee per transaction in the native asset.
    pub fee: Amount,
    /// First round the transaction is valid in.
    pub first_valid: u64,
    /// Last round the transaction is valid in.
    pub last_valid: u64,
    /// Genesis identifier of the network.
    pub genesis_id: String,
}

/// Result of a successful confirmation wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedInfo {
    /// The confirmed transaction.
    pub tx_ref: TxRef,
    /// Round it was confirmed in.
    pub confirmed_height: u64,
    /// Number of polls it took.
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn tx_ref_unique() {
        assert_ne!(TxRef::generate(), TxRef::generate());
        assert_eq!(TxRef::generate().as_str().len(), 32);
    }

    #[test]
    fn transfer_reversed_swaps_parties() {
        let t = Transfer::new(addr("A"), addr("B"), Amount::from_micro(10), AssetId::new(5));
        let r = t.reversed();
        assert_eq!(r.from, addr("B"));
        assert_eq!(r.to, addr("A"));
        assert_eq!(r.amount, t.amount);
        assert_eq!(r.asset, t.asset);
    }

    #[test]
    fn pending_info_states() {
        assert!(!PendingInfo::pending().is_confirmed());
        assert!(PendingInfo::confirmed(42).is_confirmed());
        assert_eq!(PendingInfo::rejected("overspend").rejection(), Some("overspend"));
    }

    #[test]
    fn empty_pool_error_is_not_a_rejection() {
        let info = PendingInfo {
            confirmed_height: 0,
            pool_error: Some(String::new()),
        };
        assert!(info.rejection().is_none());
    }
}
