//! Integration test crate for the AgentWeb protocol.
//!
//! This crate exists solely to run integration tests that span the registry,
//! escrow and ledger crates. It has no public API.

#![forbid(unsafe_code)]
