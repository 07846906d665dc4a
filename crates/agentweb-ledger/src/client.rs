//! Ledger client interface.
//!
//! The escrow protocol never builds, signs or broadcasts transactions itself;
//! it drives a [`LedgerClient`]. Any backend (a real node, or the
//! [`SimulatedLedger`](crate::SimulatedLedger) used in tests) satisfies the
//! same contract.

use std::future::Future;

use agentweb_core::{Address, Amount, AssetId};

use crate::error::Result;
use crate::transaction::{EscrowHandle, PendingInfo, SuggestedParams, Transfer, TxRef};

/// Ledger network to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    #[default]
    Testnet,
    /// Local sandbox node.
    Localnet,
}

impl Network {
    /// Node API URL for this network.
    #[must_use]
    pub fn node_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://mainnet-api.algonode.cloud",
            Self::Testnet => "https://testnet-api.algonode.cloud",
            Self::Localnet => "http://localhost:4001",
        }
    }

    /// Genesis identifier reported in suggested params.
    #[must_use]
    pub fn genesis_id(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet-v1.0",
            Self::Testnet => "testnet-v1.0",
            Self::Localnet => "sandnet-v1",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Localnet => write!(f, "localnet"),
        }
    }
}

/// Operations the escrow protocol needs from a ledger.
///
/// Futures must be `Send` so callers can drive them from spawned tasks.
#[allow(async_fn_in_trait)]
pub trait LedgerClient: Send + Sync + 'static {
    /// Allocate a fresh escrow destination.
    fn create_escrow_destination(&self) -> impl Future<Output = Result<EscrowHandle>> + Send;

    /// Balance of `address` in `asset`.
    fn get_balance(
        &self,
        address: &Address,
        asset: AssetId,
    ) -> impl Future<Output = Result<Amount>> + Send;

    /// Submit a single transfer.
    fn submit_transfer(&self, transfer: &Transfer) -> impl Future<Output = Result<TxRef>> + Send;

    /// Submit several transfers that either all apply or none do.
    fn submit_atomic_group(
        &self,
        transfers: &[Transfer],
    ) -> impl Future<Output = Result<TxRef>> + Send;

    /// Pool status of a submitted transaction.
    fn get_pending_info(&self, tx_ref: &TxRef) -> impl Future<Output = Result<PendingInfo>> + Send;

    /// Current network parameters for building transactions.
    fn suggested_params(&self) -> impl Future<Output = Result<SuggestedParams>> + Send;

    /// Whether [`submit_atomic_group`](Self::submit_atomic_group) is available.
    fn supports_atomic_groups(&self) -> bool {
        true
    }
}
