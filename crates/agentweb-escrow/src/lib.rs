//! # agentweb-escrow
//!
//! Escrow lifecycle and settlement for AgentWeb payments.
//!
//! This crate provides:
//!
//! - [`PaymentSession`] and its monotonic [`SessionState`] machine
//! - [`SessionStore`] with an in-memory implementation
//! - [`SettlementEngine`] for the platform fee split and atomic release
//! - [`EscrowService`] tying sessions, confirmation and settlement together
//! - [`InteractionLog`] for per-website analytics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod settlement;
pub mod store;

pub use audit::{AgentInteraction, InteractionLog, PaymentRecord, WebsiteAnalytics};
pub use config::EscrowConfig;
pub use error::{EscrowError, Result, SettlementError};
pub use service::EscrowService;
pub use session::{NewSession, PaymentSession, SessionId, SessionState};
pub use settlement::{split_fee, FeeSplit, SettlementEngine, SettlementReceipt, SettlementRequest};
pub use store::{InMemorySessionStore, SessionStore};
