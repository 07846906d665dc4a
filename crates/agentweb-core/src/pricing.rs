//! Pricing policy for per-access payments.
//!
//! The price of one access is derived from the website's average historical
//! payment, the class of content requested, and the website's reputation:
//!
//! ```text
//! price = max(floor(avg × content_multiplier × reputation / divisor), minimum)
//! ```
//!
//! Multipliers are expressed in basis points (`20_000` = 2.0×) and every step
//! is integer arithmetic with a `u128` intermediate, so the same inputs always
//! produce the same price.

use serde::{Deserialize, Serialize};

use crate::amount::BPS_DENOMINATOR;
use crate::{Amount, CoreError, ReputationScore};

/// Content classification used to pick a multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Premium, exclusive or research content.
    Premium,
    /// News and articles.
    Standard,
    /// Anything else.
    Other,
}

/// Anything that can be priced: needs a reputation and a historical average.
pub trait PricingSubject {
    /// Current reputation on the `0..=1000` scale.
    fn reputation(&self) -> ReputationScore;

    /// Average historical payment for one access.
    fn average_payment(&self) -> Amount;
}

/// Configurable pricing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    /// Keywords that classify a descriptor as premium.
    pub premium_keywords: Vec<String>,
    /// Keywords that classify a descriptor as standard.
    pub standard_keywords: Vec<String>,
    /// Multiplier for premium content, in basis points.
    pub premium_multiplier_bps: u32,
    /// Multiplier for standard content, in basis points.
    pub standard_multiplier_bps: u32,
    /// Multiplier for unclassified content, in basis points.
    pub default_multiplier_bps: u32,
    /// Stored reputation is divided by this to get the reputation multiplier.
    pub reputation_divisor: u32,
    /// Prices never go below this amount.
    pub minimum_amount: Amount,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            premium_keywords: vec!["research".into(), "premium".into(), "exclusive".into()],
            standard_keywords: vec!["news".into(), "article".into()],
            premium_multiplier_bps: 20_000,
            standard_multiplier_bps: 10_000,
            default_multiplier_bps: 5_000,
            reputation_divisor: 100,
            minimum_amount: Amount::from_micro(1_000),
        }
    }
}

impl PricingPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the price floor.
    #[must_use]
    pub fn with_minimum_amount(mut self, minimum: Amount) -> Self {
        self.minimum_amount = minimum;
        self
    }

    /// Replaces the premium keyword set.
    #[must_use]
    pub fn with_premium_keywords(mut self, keywords: Vec<String>) -> Self {
        self.premium_keywords = keywords;
        self
    }

    /// Replaces the standard keyword set.
    #[must_use]
    pub fn with_standard_keywords(mut self, keywords: Vec<String>) -> Self {
        self.standard_keywords = keywords;
        self
    }

    /// Sets the reputation divisor.
    #[must_use]
    pub const fn with_reputation_divisor(mut self, divisor: u32) -> Self {
        self.reputation_divisor = divisor;
        self
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if the divisor is zero or a keyword is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reputation_divisor == 0 {
            return Err(CoreError::Config("reputation_divisor must be positive".into()));
        }
        let blank = self
            .premium_keywords
            .iter()
            .chain(&self.standard_keywords)
            .any(|k| k.trim().is_empty());
        if blank {
            return Err(CoreError::Config("pricing keywords cannot be blank".into()));
        }
        Ok(())
    }

    /// Classifies a content descriptor. Premium wins over standard.
    #[must_use]
    pub fn classify(&self, descriptor: &str) -> ContentClass {
        let descriptor = descriptor.to_lowercase();
        let matches = |keywords: &[String]| {
            keywords
                .iter()
                .any(|k| descriptor.contains(k.to_lowercase().as_str()))
        };

        if matches(&self.premium_keywords) {
            ContentClass::Premium
        } else if matches(&self.standard_keywords) {
            ContentClass::Standard
        } else {
            ContentClass::Other
        }
    }

    /// Returns the multiplier for a content class, in basis points.
    #[must_use]
    pub const fn multiplier_bps(&self, class: ContentClass) -> u32 {
        match class {
            ContentClass::Premium => self.premium_multiplier_bps,
            ContentClass::Standard => self.standard_multiplier_bps,
            ContentClass::Other => self.default_multiplier_bps,
        }
    }

    /// Prices one access to `website` for the given content descriptor.
    #[must_use]
    pub fn price<W: PricingSubject + ?Sized>(&self, website: &W, descriptor: &str) -> Amount {
        self.price_for(website.reputation(), website.average_payment(), descriptor)
    }

    /// Prices one access from raw inputs.
    ///
    /// Never fails: unknown content falls back to the default multiplier and
    /// oversized results saturate at [`Amount::MAX`].
    #[must_use]
    pub fn price_for(
        &self,
        reputation: ReputationScore,
        average_payment: Amount,
        descriptor: &str,
    ) -> Amount {
        let multiplier = u128::from(self.multiplier_bps(self.classify(descriptor)));
        let divisor = u128::from(BPS_DENOMINATOR) * u128::from(self.reputation_divisor.max(1));

        let raw = u128::from(average_payment.as_micro()) * multiplier
            * u128::from(reputation.value())
            / divisor;
        let raw = Amount::from_micro(u64::try_from(raw).unwrap_or(u64::MAX));

        raw.max(self.minimum_amount)
    }
}
