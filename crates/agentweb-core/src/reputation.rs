//! Reputation scoring for agents and websites.
//!
//! Scores live on a `0..=1000` integer scale. Adjustments clamp to the
//! bounds; going out of range is never an error.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::CoreError;

/// A reputation score in `[0, 1000]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReputationScore(u16);

impl ReputationScore {
    /// Lowest score.
    pub const MIN: Self = Self(0);

    /// Highest score.
    pub const MAX: Self = Self(1000);

    /// Score assigned to newly registered participants.
    pub const INITIAL: Self = Self(100);

    /// Creates a score, rejecting values above [`Self::MAX`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if `value > 1000`.
    pub fn new(value: u16) -> Result<Self, CoreError> {
        if value > Self::MAX.0 {
            return Err(CoreError::Config(format!(
                "reputation must be between 0 and 1000, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Creates a score from any integer, clamping into range.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0)) as u16)
    }

    /// Returns the raw score.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns `clamp(self + delta, 0, 1000)`.
    #[must_use]
    pub fn adjusted(self, delta: i64) -> Self {
        Self::clamped(i64::from(self.0).saturating_add(delta))
    }
}

impl Default for ReputationScore {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for ReputationScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/1000", self.0)
    }
}

impl<'de> Deserialize<'de> for ReputationScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u16::deserialize(deserializer)?;
        Self::new(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initial_score_is_100() {
        assert_eq!(ReputationScore::default().value(), 100);
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert!(ReputationScore::new(1001).is_err());
        assert!(ReputationScore::new(1000).is_ok());
        assert!(ReputationScore::new(0).is_ok());
    }

    #[test]
    fn adjusted_clamps_at_bounds() {
        let score = ReputationScore::new(950).unwrap();
        assert_eq!(score.adjusted(100), ReputationScore::MAX);
        assert_eq!(score.adjusted(-5000), ReputationScore::MIN);
        assert_eq!(score.adjusted(-50).value(), 900);
    }

    #[test]
    fn adjusted_handles_extreme_deltas() {
        let score = ReputationScore::INITIAL;
        assert_eq!(score.adjusted(i64::MAX), ReputationScore::MAX);
        assert_eq!(score.adjusted(i64::MIN), ReputationScore::MIN);
    }

    #[test]
    fn deserialize_validates_range() {
        assert!(serde_json::from_str::<ReputationScore>("850").is_ok());
        assert!(serde_json::from_str::<ReputationScore>("1200").is_err());
    }

    proptest! {
        #[test]
        fn adjusted_always_in_bounds(start in 0u16..=1000, delta in any::<i64>()) {
            let score = ReputationScore::new(start).unwrap().adjusted(delta);
            prop_assert!(score.value() <= 1000);
        }

        #[test]
        fn adjusted_is_exact_inside_bounds(start in 0u16..=1000, delta in -1000i64..=1000) {
            let expected = (i64::from(start) + delta).clamp(0, 1000);
            let score = ReputationScore::new(start).unwrap().adjusted(delta);
            prop_assert_eq!(i64::from(score.value()), expected);
        }
    }
}
