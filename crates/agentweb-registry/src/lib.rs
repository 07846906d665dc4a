//! # agentweb-registry
//!
//! Identity and reputation registry for the AgentWeb protocol.
//!
//! - Agents register with an Ed25519 signature over `Register Agent: {id}`
//! - Websites register after proving domain ownership through a
//!   [`DomainOwnershipVerifier`]
//! - Reputation is bounded to `[0, 1000]` and only the configured admin can
//!   change it
//! - [`Registry::discover`] pages through websites in registration order

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod error;
pub mod registry;
pub mod verifier;
pub mod website;

pub use agent::{Agent, AgentRegistration, Capabilities};
pub use config::RegistryConfig;
pub use error::{RegistryError, Result, Subject};
pub use registry::Registry;
pub use verifier::{DomainOwnershipVerifier, HeaderOwnershipVerifier, StaticOwnershipVerifier};
pub use website::{derive_alias, normalize_domain, Website, WebsiteRegistration};
