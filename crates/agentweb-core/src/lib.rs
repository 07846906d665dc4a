//! # agentweb-core
//!
//! Shared primitives for the AgentWeb pay-per-access protocol.
//!
//! This crate provides:
//!
//! - [`Amount`] - Payment amount in the asset's smallest unit
//! - [`Address`] / [`AssetId`] - Ledger account and fungible-asset identifiers
//! - [`Keypair`] / [`PublicKey`] / [`Signature`] - Ed25519 identity and registration signatures
//! - [`ReputationScore`] - Bounded `[0, 1000]` trust signal
//! - [`PricingPolicy`] - Derives per-access prices from reputation and content class

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod amount;
pub mod error;
pub mod identity;
pub mod pricing;
pub mod reputation;

pub use address::{Address, AssetId};
pub use amount::Amount;
pub use error::CoreError;
pub use identity::{registration_message, Keypair, PublicKey, Signature};
pub use pricing::{ContentClass, PricingPolicy, PricingSubject};
pub use reputation::ReputationScore;
