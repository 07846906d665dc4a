//! Node configuration.
//!
//! One TOML file configures the whole node:
//! - Ledger network selection
//! - Pricing policy (keywords, multipliers, floor)
//! - Escrow settings (fee, minimum payment, TTL, confirmation budget)
//! - Registry settings (admin, alias suffix, ownership header)

use std::path::Path;

use agentweb_core::PricingPolicy;
use agentweb_escrow::EscrowConfig;
use agentweb_ledger::Network;
use agentweb_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

fn default_name() -> String {
    "agentweb-node".to_string()
}

/// Main node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Ledger network.
    #[serde(default)]
    pub network: Network,
    /// Pricing policy.
    #[serde(default)]
    pub pricing: PricingPolicy,
    /// Escrow settings.
    #[serde(default)]
    pub escrow: EscrowConfig,
    /// Registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            network: Network::default(),
            pricing: PricingPolicy::default(),
            escrow: EscrowConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProtocolError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ProtocolError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProtocolError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ProtocolError> {
        toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::Config("node name cannot be empty".to_string()));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ProtocolError::Config(
                "node name must contain only alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            ));
        }

        self.pricing.validate()?;
        self.escrow.validate()?;

        if self.registry.alias_suffix.trim().is_empty() {
            return Err(ProtocolError::Config(
                "registry.alias_suffix cannot be empty".to_string(),
            ));
        }

        if self.escrow.min_payment > self.pricing.minimum_amount {
            return Err(ProtocolError::Config(format!(
                "escrow.min_payment ({}) exceeds pricing.minimum_amount ({}); priced sessions would be refused",
                self.escrow.min_payment, self.pricing.minimum_amount
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentweb_core::{Address, Amount};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = NodeConfig::from_toml("").expect("should parse empty config");
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.escrow.fee_basis_points, 100);
        assert_eq!(config.escrow.confirmation.max_attempts, 10);
        assert_eq!(config.network, Network::Testnet);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            name = "edge-01"
            network = "localnet"

            [pricing]
            premium_keywords = ["dataset"]
            minimum_amount = 2000

            [escrow]
            fee_basis_points = 250
            min_payment = 2000
            session_ttl_secs = 60
            platform_address = "PLATFORM"

            [escrow.confirmation]
            max_attempts = 5
            poll_interval_ms = 200

            [registry]
            admin = "ADMIN"
            alias_suffix = "agents.test"
        "#;

        let config = NodeConfig::from_toml(toml).expect("should parse full config");

        assert_eq!(config.name, "edge-01");
        assert_eq!(config.network, Network::Localnet);
        assert_eq!(config.pricing.premium_keywords, vec!["dataset".to_string()]);
        assert_eq!(config.pricing.standard_keywords.len(), 2);
        assert_eq!(config.escrow.fee_basis_points, 250);
        assert_eq!(config.escrow.min_payment, Amount::from_micro(2000));
        assert_eq!(config.escrow.platform_address, Address::new("PLATFORM").unwrap());
        assert_eq!(config.escrow.confirmation.max_attempts, 5);
        assert_eq!(config.registry.admin, Some(Address::new("ADMIN").unwrap()));
        assert_eq!(config.registry.alias_suffix, "agents.test");
    }

    #[test]
    fn test_from_file() {
        let file = create_temp_config("name = \"from-file\"\n");
        let config = NodeConfig::from_file(file.path()).expect("should load file");
        assert_eq!(config.name, "from-file");
    }

    #[test]
    fn test_missing_file() {
        let result = NodeConfig::from_file("/nonexistent/agentweb.toml");
        assert!(matches!(result, Err(ProtocolError::Config(msg)) if msg.contains("failed to read")));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(NodeConfig::from_toml("name = ").is_err());
    }

    #[test]
    fn test_rejects_bad_name() {
        assert!(NodeConfig::from_toml("name = \"bad name\"").is_err());
        assert!(NodeConfig::from_toml("name = \"\"").is_err());
    }

    #[test]
    fn test_rejects_fee_over_100_percent() {
        let result = NodeConfig::from_toml("[escrow]\nfee_basis_points = 20000\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_min_payment_above_price_floor() {
        let result = NodeConfig::from_toml("[escrow]\nmin_payment = 5000\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = NodeConfig::default();
        let rendered = config.to_toml().expect("should render");
        assert_eq!(NodeConfig::from_toml(&rendered).expect("should reparse"), config);
    }
}
