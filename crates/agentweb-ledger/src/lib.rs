//! # agentweb-ledger
//!
//! Ledger access for the AgentWeb escrow protocol.
//!
//! This crate provides:
//! - [`LedgerClient`]: the operations the protocol needs from a ledger
//!   (escrow destinations, balances, transfers, atomic groups, pool status)
//! - [`SimulatedLedger`]: an in-memory backend with fault injection for tests
//!   and local demos
//! - [`ConfirmationWatcher`]: bounded, cancellable confirmation polling
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentweb_core::{Amount, AssetId, Keypair};
//! use agentweb_ledger::{
//!     ConfirmationWatcher, LedgerClient, SimulatedLedger, Transfer, WatcherConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(SimulatedLedger::testnet());
//! let agent = Keypair::generate().address();
//! ledger.fund(&agent, AssetId::NATIVE, Amount::from_units(1))?;
//!
//! let escrow = ledger.create_escrow_destination().await?;
//! let tx = ledger
//!     .submit_transfer(&Transfer::new(agent, escrow.address, Amount::from_micro(5_000), AssetId::NATIVE))
//!     .await?;
//!
//! let watcher = ConfirmationWatcher::new(ledger, WatcherConfig::default());
//! let confirmed = watcher.await_confirmation(&tx).await?;
//! println!("confirmed in round {}", confirmed.confirmed_height);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod confirmation;
pub mod error;
pub mod simulated;
pub mod transaction;

pub use client::{LedgerClient, Network};
pub use confirmation::{
    cancel_pair, CancelHandle, CancelToken, ConfirmationWatcher, WatchError, WatcherConfig,
};
pub use error::{LedgerError, Result};
pub use simulated::SimulatedLedger;
pub use transaction::{ConfirmedInfo, EscrowHandle, PendingInfo, SuggestedParams, Transfer, TxRef};
