//! Registry configuration.

use agentweb_core::{Address, Amount, ReputationScore};
use serde::{Deserialize, Serialize};

/// Default alias suffix for registered websites.
pub const DEFAULT_ALIAS_SUFFIX: &str = "agentweb.alg";

/// Default response header carrying the ownership token.
pub const DEFAULT_VERIFICATION_HEADER: &str = "X-AgentWeb-Verification";

/// Declared average payment when a website does not state one.
pub const DEFAULT_AVG_PAYMENT: Amount = Amount::from_micro(5_000);

/// Category for websites registered without one.
pub const DEFAULT_CATEGORY: &str = "general";

fn default_initial_reputation() -> ReputationScore {
    ReputationScore::INITIAL
}

fn default_alias_suffix() -> String {
    DEFAULT_ALIAS_SUFFIX.to_string()
}

fn default_avg_payment() -> Amount {
    DEFAULT_AVG_PAYMENT
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_verification_header() -> String {
    DEFAULT_VERIFICATION_HEADER.to_string()
}

fn default_verification_timeout_secs() -> u64 {
    10
}

/// Registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Address allowed to adjust reputations. `None` locks updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Address>,

    /// Reputation given to new agents and websites.
    #[serde(default = "default_initial_reputation")]
    pub initial_reputation: ReputationScore,

    /// Suffix appended to derived website aliases.
    #[serde(default = "default_alias_suffix")]
    pub alias_suffix: String,

    /// Average payment assumed for websites with no history.
    #[serde(default = "default_avg_payment")]
    pub default_avg_payment: Amount,

    /// Category for websites that do not declare one.
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Header the ownership verifier reads.
    #[serde(default = "default_verification_header")]
    pub verification_header: String,

    /// Timeout for ownership checks.
    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin: None,
            initial_reputation: default_initial_reputation(),
            alias_suffix: default_alias_suffix(),
            default_avg_payment: DEFAULT_AVG_PAYMENT,
            default_category: default_category(),
            verification_header: default_verification_header(),
            verification_timeout_secs: default_verification_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    /// Set the admin address.
    #[must_use]
    pub fn with_admin(mut self, admin: Address) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Set the alias suffix.
    #[must_use]
    pub fn with_alias_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.alias_suffix = suffix.into();
        self
    }

    /// Set the starting reputation.
    #[must_use]
    pub const fn with_initial_reputation(mut self, score: ReputationScore) -> Self {
        self.initial_reputation = score;
        self
    }

    /// True if `caller` is the configured admin.
    #[must_use]
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin.as_ref() == Some(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert!(config.admin.is_none());
        assert_eq!(config.initial_reputation.value(), 100);
        assert_eq!(config.alias_suffix, "agentweb.alg");
        assert_eq!(config.default_avg_payment, Amount::from_micro(5000));
        assert_eq!(config.verification_header, "X-AgentWeb-Verification");
    }

    #[test]
    fn no_admin_means_nobody_is_admin() {
        let config = RegistryConfig::default();
        assert!(!config.is_admin(&Address::new("ANYONE").unwrap()));
    }

    #[test]
    fn admin_check() {
        let admin = Address::new("ADMIN").unwrap();
        let config = RegistryConfig::default().with_admin(admin.clone());
        assert!(config.is_admin(&admin));
        assert!(!config.is_admin(&Address::new("OTHER").unwrap()));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"admin":"ADMIN"}"#).unwrap();
        assert_eq!(config.admin, Some(Address::new("ADMIN").unwrap()));
        assert_eq!(config.default_category, "general");
    }
}
