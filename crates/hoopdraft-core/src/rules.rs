// Game rules: budget, pool composition, scoring depth, advisor limits.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::draft::pool::{Tier, POOL_SIZE};

#[derive(Debug, Error, PartialEq)]
#[error("invalid rule `{field}`: {message}")]
pub struct RulesError {
    pub field: String,
    pub message: String,
}

impl RulesError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        RulesError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Number of players drawn from each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierQuotas {
    pub elite: usize,
    pub good: usize,
    pub mid: usize,
    pub role: usize,
}

impl Default for TierQuotas {
    fn default() -> Self {
        TierQuotas {
            elite: 2,
            good: 4,
            mid: 4,
            role: 2,
        }
    }
}

impl TierQuotas {
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Elite => self.elite,
            Tier::Good => self.good,
            Tier::Mid => self.mid,
            Tier::Role => self.role,
        }
    }

    pub fn total(&self) -> usize {
        self.elite + self.good + self.mid + self.role
    }
}

/// Share of the catalog (sorted by fantasy points, descending) that falls
/// into each tier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TierFractions {
    pub elite: f64,
    pub good: f64,
    pub mid: f64,
    pub role: f64,
}

impl Default for TierFractions {
    fn default() -> Self {
        TierFractions {
            elite: 0.15,
            good: 0.35,
            mid: 0.35,
            role: 0.15,
        }
    }
}

impl TierFractions {
    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Elite => self.elite,
            Tier::Good => self.good,
            Tier::Mid => self.mid,
            Tier::Role => self.role,
        }
    }
}

/// Strategy Advisor call limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdvisorRules {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra attempts after a failed one before the fallback applies.
    pub max_retries: u8,
}

impl Default for AdvisorRules {
    fn default() -> Self {
        AdvisorRules {
            timeout_ms: 20_000,
            max_retries: 1,
        }
    }
}

impl AdvisorRules {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The complete rule set for one game.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub starting_budget: u32,
    pub quotas: TierQuotas,
    pub tier_fractions: TierFractions,
    /// Only this many best picks count toward a bot's score.
    pub scored_roster_size: usize,
    /// Whether a bot with no credits may still nominate at a bid of 0.
    pub allow_free_nominations: bool,
    pub advisor: AdvisorRules,
    /// Capacity of the live event channel per subscriber.
    pub event_buffer: usize,
    pub max_strategy_chars: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            starting_budget: 100,
            quotas: TierQuotas::default(),
            tier_fractions: TierFractions::default(),
            scored_roster_size: 5,
            allow_free_nominations: false,
            advisor: AdvisorRules::default(),
            event_buffer: 256,
            max_strategy_chars: 2000,
        }
    }
}

impl RulesConfig {
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.starting_budget == 0 {
            return Err(RulesError::new("starting_budget", "must be greater than 0"));
        }

        if self.quotas.total() != POOL_SIZE {
            return Err(RulesError::new(
                "quotas",
                format!(
                    "tier quotas must sum to {POOL_SIZE}, got {}",
                    self.quotas.total()
                ),
            ));
        }

        let mut sum = 0.0;
        for tier in Tier::ALL {
            let frac = self.tier_fractions.get(tier);
            if !(frac > 0.0 && frac <= 1.0) {
                return Err(RulesError::new(
                    &format!("tier_fractions.{}", tier.as_str()),
                    format!("must be in (0, 1], got {frac}"),
                ));
            }
            sum += frac;
        }
        if (sum - 1.0).abs() > 1e-6 {
            return Err(RulesError::new(
                "tier_fractions",
                format!("must sum to 1.0, got {sum}"),
            ));
        }

        if self.scored_roster_size == 0 {
            return Err(RulesError::new("scored_roster_size", "must be greater than 0"));
        }

        if self.advisor.timeout_ms == 0 {
            return Err(RulesError::new("advisor.timeout_ms", "must be greater than 0"));
        }
        if self.advisor.max_retries > 1 {
            return Err(RulesError::new(
                "advisor.max_retries",
                format!("at most 1 retry per decision, got {}", self.advisor.max_retries),
            ));
        }

        if self.event_buffer == 0 {
            return Err(RulesError::new("event_buffer", "must be greater than 0"));
        }
        if self.max_strategy_chars == 0 {
            return Err(RulesError::new("max_strategy_chars", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let rules = RulesConfig::default();
        assert_eq!(rules.validate(), Ok(()));
        assert_eq!(rules.quotas.total(), 12);
        assert_eq!(rules.advisor.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let rules: RulesConfig = from_json(
            r#"{"starting_budget": 50, "advisor": {"timeout_ms": 500}}"#,
        );
        assert_eq!(rules.starting_budget, 50);
        assert_eq!(rules.advisor.timeout_ms, 500);
        assert_eq!(rules.advisor.max_retries, 1);
        assert_eq!(rules.scored_roster_size, 5);
    }

    fn from_json(json: &str) -> RulesConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn rejects_quotas_not_summing_to_pool_size() {
        let mut rules = RulesConfig::default();
        rules.quotas.elite = 3;
        let err = rules.validate().unwrap_err();
        assert_eq!(err.field, "quotas");
    }

    #[test]
    fn rejects_fractions_not_summing_to_one() {
        let mut rules = RulesConfig::default();
        rules.tier_fractions.role = 0.3;
        assert_eq!(rules.validate().unwrap_err().field, "tier_fractions");
    }

    #[test]
    fn rejects_zero_fraction() {
        let mut rules = RulesConfig::default();
        rules.tier_fractions.mid = 0.0;
        assert_eq!(rules.validate().unwrap_err().field, "tier_fractions.mid");
    }

    #[test]
    fn rejects_more_than_one_retry() {
        let mut rules = RulesConfig::default();
        rules.advisor.max_retries = 2;
        assert_eq!(rules.validate().unwrap_err().field, "advisor.max_retries");
    }

    #[test]
    fn rejects_zero_budget_and_buffer() {
        let mut rules = RulesConfig::default();
        rules.starting_budget = 0;
        assert_eq!(rules.validate().unwrap_err().field, "starting_budget");

        let mut rules = RulesConfig::default();
        rules.event_buffer = 0;
        assert_eq!(rules.validate().unwrap_err().field, "event_buffer");
    }
}
