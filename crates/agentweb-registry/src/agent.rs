//! Registered agents.

use std::collections::BTreeMap;

use agentweb_core::{registration_message, PublicKey, ReputationScore, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Longest agent id accepted.
const MAX_AGENT_ID_LEN: usize = 64;

/// Opaque capability metadata supplied at registration.
pub type Capabilities = BTreeMap<String, serde_json::Value>;

/// An autonomous agent allowed to pay for content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Agent id.
    pub id: String,
    /// Registration key.
    pub public_key: PublicKey,
    /// Signature over the registration message.
    pub signature: Signature,
    /// Current reputation.
    pub reputation: ReputationScore,
    /// Declared capabilities.
    pub capabilities: Capabilities,
    /// Inactive agents cannot open sessions.
    pub active: bool,
    /// When the agent registered.
    pub registered_at: DateTime<Utc>,
}

/// Registration request for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Agent id.
    pub agent_id: String,
    /// Public key the signature is checked against.
    pub public_key: PublicKey,
    /// Signature over `Register Agent: {agent_id}`.
    pub signature: Signature,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl AgentRegistration {
    /// Create a registration with no capabilities.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, public_key: PublicKey, signature: Signature) -> Self {
        Self {
            agent_id: agent_id.into(),
            public_key,
            signature,
            capabilities: Capabilities::new(),
        }
    }

    /// Add one capability entry.
    #[must_use]
    pub fn with_capability(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.capabilities.insert(key.into(), value);
        self
    }

    /// Check the id format and the signature.
    pub fn validate(&self) -> Result<()> {
        let id = self.agent_id.as_str();
        if id.is_empty() || id.len() > MAX_AGENT_ID_LEN || id.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidIdentifier(format!("agent id {id:?}")));
        }
        self.public_key
            .verify(registration_message(id).as_bytes(), &self.signature)
            .map_err(|_| RegistryError::InvalidSignature {
                agent_id: id.to_string(),
            })
    }
}
