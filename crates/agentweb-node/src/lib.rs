//! # agentweb-node
//!
//! An AgentWeb protocol node: autonomous agents pay websites for content
//! access through ledger escrow.
//!
//! The [`Protocol`] facade ties together:
//!
//! - the agent and website [`Registry`](agentweb_registry::Registry)
//! - dynamic pricing from [`PricingPolicy`](agentweb_core::PricingPolicy)
//! - escrow sessions in [`EscrowService`](agentweb_escrow::EscrowService)
//! - per-website analytics in [`InteractionLog`](agentweb_escrow::InteractionLog)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentweb_ledger::SimulatedLedger;
//! use agentweb_node::{NodeConfig, Protocol};
//! use agentweb_registry::StaticOwnershipVerifier;
//!
//! # fn main() -> Result<(), agentweb_node::ProtocolError> {
//! let config = NodeConfig::from_file("agentweb.toml")?;
//! let protocol = Protocol::from_config(
//!     &config,
//!     Arc::new(SimulatedLedger::testnet()),
//!     StaticOwnershipVerifier::new(),
//! )?;
//! println!("{} websites registered", protocol.registry().website_count());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod sweeper;

pub use config::NodeConfig;
pub use error::{ProtocolError, Result};
pub use protocol::Protocol;
pub use sweeper::run_sweeper;
