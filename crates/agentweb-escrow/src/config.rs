//! Escrow service configuration.

use agentweb_core::amount::BPS_DENOMINATOR;
use agentweb_core::{Address, Amount};
use agentweb_ledger::WatcherConfig;
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;

/// Default platform fee: 1%.
pub const DEFAULT_FEE_BPS: u32 = 100;

/// Default minimum payment.
pub const DEFAULT_MIN_PAYMENT: Amount = Amount::from_micro(1_000);

/// Default session time-to-live (15 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 900;

/// Default expiry sweep interval.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

fn default_fee_bps() -> u32 {
    DEFAULT_FEE_BPS
}

fn default_min_payment() -> Amount {
    DEFAULT_MIN_PAYMENT
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

/// All-zero key address; replace with the real fee account in deployment.
fn default_platform_address() -> Address {
    Address::from_public_key(&[0; 32])
}

/// Escrow and settlement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Platform fee in basis points.
    #[serde(default = "default_fee_bps")]
    pub fee_basis_points: u32,

    /// Smallest amount the settlement engine will release.
    #[serde(default = "default_min_payment")]
    pub min_payment: Amount,

    /// Open sessions older than this expire.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// How often the node sweeps for stale sessions.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Address that receives platform fees.
    #[serde(default = "default_platform_address")]
    pub platform_address: Address,

    /// Confirmation polling budget for funding transactions.
    #[serde(default)]
    pub confirmation: WatcherConfig,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            fee_basis_points: DEFAULT_FEE_BPS,
            min_payment: DEFAULT_MIN_PAYMENT,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            platform_address: default_platform_address(),
            confirmation: WatcherConfig::default(),
        }
    }
}

impl EscrowConfig {
    /// Set the platform fee.
    #[must_use]
    pub const fn with_fee_basis_points(mut self, bps: u32) -> Self {
        self.fee_basis_points = bps;
        self
    }

    /// Set the minimum payment.
    #[must_use]
    pub const fn with_min_payment(mut self, amount: Amount) -> Self {
        self.min_payment = amount;
        self
    }

    /// Set the session TTL.
    #[must_use]
    pub const fn with_session_ttl_secs(mut self, secs: u64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    /// Set the platform fee address.
    #[must_use]
    pub fn with_platform_address(mut self, address: Address) -> Self {
        self.platform_address = address;
        self
    }

    /// Set the confirmation budget.
    #[must_use]
    pub const fn with_confirmation(mut self, confirmation: WatcherConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Session TTL as a chrono duration.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        i64::try_from(self.session_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), EscrowError> {
        if u64::from(self.fee_basis_points) > BPS_DENOMINATOR {
            return Err(EscrowError::Config(format!(
                "fee_basis_points must be at most {BPS_DENOMINATOR}, got {}",
                self.fee_basis_points
            )));
        }
        if self.session_ttl_secs == 0 {
            return Err(EscrowError::Config("session_ttl_secs must be positive".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(EscrowError::Config("sweep_interval_secs must be positive".into()));
        }
        if self.confirmation.max_attempts == 0 {
            return Err(EscrowError::Config("confirmation.max_attempts must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EscrowConfig::default();
        assert_eq!(config.fee_basis_points, 100);
        assert_eq!(config.min_payment, Amount::from_micro(1000));
        assert_eq!(config.session_ttl_secs, 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: EscrowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EscrowConfig::default());
    }

    #[test]
    fn rejects_fee_over_100_percent() {
        let config = EscrowConfig::default().with_fee_basis_points(10_001);
        assert!(matches!(config.validate(), Err(EscrowError::Config(_))));
    }

    #[test]
    fn rejects_zero_ttl() {
        let config = EscrowConfig::default().with_session_ttl_secs(0);
        assert!(config.validate().is_err());
    }
}
