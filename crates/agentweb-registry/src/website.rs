//! Registered websites and alias derivation.

use agentweb_core::{Address, Amount, PricingSubject, ReputationScore};
use agentweb_ledger::TxRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Longest domain accepted.
const MAX_DOMAIN_LEN: usize = 253;

/// Lowercases `domain` and strips any scheme and trailing slash.
pub fn normalize_domain(domain: &str) -> Result<String> {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest)
        .trim_end_matches('/');
    let normalized = without_scheme.to_lowercase();

    if normalized.is_empty()
        || normalized.len() > MAX_DOMAIN_LEN
        || normalized.chars().any(char::is_whitespace)
    {
        return Err(RegistryError::InvalidIdentifier(format!("domain {domain:?}")));
    }
    Ok(normalized)
}

/// Human-readable alias for a normalized domain.
///
/// `news.example.com` with suffix `agentweb.alg` becomes
/// `news-example-com.agentweb.alg`.
#[must_use]
pub fn derive_alias(domain: &str, suffix: &str) -> String {
    let label = domain.replace('/', "_").replace('.', "-");
    format!("{label}.{suffix}")
}

/// A website that accepts agent payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    /// Normalized domain.
    pub domain: String,
    /// Address receiving the website share.
    pub owner: Address,
    /// Derived alias.
    pub alias: String,
    /// Current reputation.
    pub reputation: ReputationScore,
    /// Average payment declared at registration.
    pub declared_avg_payment: Amount,
    /// Sum of settled payments.
    pub total_earned: Amount,
    /// Number of settled payments.
    pub payment_count: u64,
    /// Discovery category.
    pub category: String,
    /// Ownership proven. Never reset once set.
    pub verified: bool,
    /// Ledger transaction anchoring the registration.
    pub registration_tx: Option<TxRef>,
    /// When the website registered.
    pub registered_at: DateTime<Utc>,
}

impl Website {
    /// Historical average once payments exist, the declared average before.
    #[must_use]
    pub fn average_payment(&self) -> Amount {
        if self.payment_count == 0 {
            return self.declared_avg_payment;
        }
        Amount::from_micro(self.total_earned.as_micro() / self.payment_count)
    }

    /// Add one settled payment to the earnings.
    pub fn record_payment(&mut self, amount: Amount) {
        self.total_earned = self.total_earned.saturating_add(amount);
        self.payment_count += 1;
    }
}

impl PricingSubject for Website {
    fn reputation(&self) -> ReputationScore {
        self.reputation
    }

    fn average_payment(&self) -> Amount {
        Website::average_payment(self)
    }
}

/// Registration request for a website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteRegistration {
    /// Domain to register.
    pub domain: String,
    /// Address receiving payments.
    pub owner: Address,
    /// Token the domain must serve to prove ownership.
    pub proof_token: String,
    /// Discovery category.
    #[serde(default)]
    pub category: Option<String>,
    /// Declared average payment.
    #[serde(default)]
    pub avg_payment: Option<Amount>,
}

impl WebsiteRegistration {
    /// Create a registration with default category and average payment.
    #[must_use]
    pub fn new(domain: impl Into<String>, owner: Address, proof_token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            owner,
            proof_token: proof_token.into(),
            category: None,
            avg_payment: None,
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the declared average payment.
    #[must_use]
    pub const fn with_avg_payment(mut self, amount: Amount) -> Self {
        self.avg_payment = Some(amount);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("news.example.com", "news.example.com" ; "plain")]
    #[test_case("https://News.Example.com/", "news.example.com" ; "scheme and slash")]
    #[test_case("  blog.io ", "blog.io" ; "whitespace trimmed")]
    fn normalize(input: &str, expected: &str) {
        assert_eq!(normalize_domain(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("https://" ; "scheme only")]
    #[test_case("bad domain.com" ; "inner whitespace")]
    fn normalize_rejects(input: &str) {
        assert!(normalize_domain(input).is_err());
    }

    #[test_case("news.example.com", "news-example-com.agentweb.alg" ; "dots")]
    #[test_case("example.com/blog", "example-com_blog.agentweb.alg" ; "path")]
    fn alias(domain: &str, expected: &str) {
        assert_eq!(derive_alias(domain, "agentweb.alg"), expected);
    }

    fn site() -> Website {
        Website {
            domain: "x.com".into(),
            owner: Address::new("OWNER").unwrap(),
            alias: "x-com.agentweb.alg".into(),
            reputation: ReputationScore::INITIAL,
            declared_avg_payment: Amount::from_micro(5000),
            total_earned: Amount::ZERO,
            payment_count: 0,
            category: "general".into(),
            verified: true,
            registration_tx: None,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn average_switches_to_history() {
        let mut site = site();
        assert_eq!(site.average_payment(), Amount::from_micro(5000));

        site.record_payment(Amount::from_micro(2000));
        site.record_payment(Amount::from_micro(3001));
        assert_eq!(site.payment_count, 2);
        assert_eq!(site.average_payment(), Amount::from_micro(2500));
    }
}
