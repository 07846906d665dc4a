//! Error types for agentweb-registry.

use std::fmt;

use agentweb_core::{Address, CoreError};
use agentweb_ledger::WatchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Something the registry tracks a reputation for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// Agent, by id.
    Agent(String),
    /// Website, by domain.
    Website(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent {id}"),
            Self::Website(domain) => write!(f, "website {domain}"),
        }
    }
}

/// Errors that can occur in registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration signature does not verify against the public key.
    #[error("invalid registration signature for agent {agent_id}")]
    InvalidSignature {
        /// Agent being registered.
        agent_id: String,
    },

    /// Domain ownership could not be proven.
    #[error("ownership verification failed for {domain}")]
    OwnershipVerificationFailed {
        /// Domain being registered.
        domain: String,
    },

    /// Subject is already registered.
    #[error("{0} is already registered")]
    AlreadyRegistered(Subject),

    /// Subject is not registered.
    #[error("{0} not found")]
    NotFound(Subject),

    /// Caller may not perform admin operations.
    #[error("unauthorized: {caller} is not the registry admin")]
    Unauthorized {
        /// Calling address.
        caller: Address,
    },

    /// Agent exists but has been deactivated.
    #[error("agent {agent_id} is inactive")]
    Inactive {
        /// Deactivated agent.
        agent_id: String,
    },

    /// Domain or agent id is malformed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Registration transaction did not confirm.
    #[error("registration of {domain} not confirmed: {source}")]
    Confirmation {
        /// Domain being anchored.
        domain: String,
        /// Watcher outcome.
        #[source]
        source: WatchError,
    },

    /// HTTP client could not be built.
    #[error("verifier setup failed: {0}")]
    Verifier(String),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RegistryError {
    /// Create a not found error for an agent.
    #[must_use]
    pub fn agent_not_found(agent_id: impl Into<String>) -> Self {
        Self::NotFound(Subject::Agent(agent_id.into()))
    }

    /// Create a not found error for a website.
    #[must_use]
    pub fn website_not_found(domain: impl Into<String>) -> Self {
        Self::NotFound(Subject::Website(domain.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_display() {
        assert_eq!(Subject::Agent("a1".into()).to_string(), "agent a1");
        assert_eq!(Subject::Website("x.com".into()).to_string(), "website x.com");
    }

    #[test]
    fn not_found_message() {
        let err = RegistryError::website_not_found("missing.com");
        assert_eq!(err.to_string(), "website missing.com not found");
    }

    #[test]
    fn subject_serializes_tagged() {
        let json = serde_json::to_string(&Subject::Agent("a1".into())).unwrap();
        assert_eq!(json, r#"{"kind":"agent","id":"a1"}"#);
    }
}
