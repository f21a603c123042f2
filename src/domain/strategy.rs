//! Strategy configuration and the state carried between hook calls.

use crate::domain::factor::FactorSpec;
use crate::domain::scoring::{FactorFailurePolicy, ScoreTable};
use crate::domain::trend_filter::TrendFilter;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_REFRESH_TRADING_DAY: u32 = 4;
pub const DEFAULT_FACTOR_LOOKBACK: usize = 10;
pub const DEFAULT_SHORT_WINDOW: usize = 12;
pub const DEFAULT_LONG_WINDOW: usize = 26;
pub const DEFAULT_OBSERVATION: usize = 50;

/// Factors where a higher value is better.
pub const DEFAULT_FACTORS_UP: [&str; 3] = [
    "basic_earnings_per_share",
    "return_on_invested_capital_lyr",
    "return_on_equity_lyr",
];

/// Factors where a lower value is better.
pub const DEFAULT_FACTORS_DOWN: [&str; 3] =
    ["market_cap", "debt_to_asset_ratio_lyr", "pb_ratio_lyr"];

pub fn default_factors() -> Vec<FactorSpec> {
    DEFAULT_FACTORS_UP
        .iter()
        .map(|name| FactorSpec::up(name))
        .chain(DEFAULT_FACTORS_DOWN.iter().map(|name| FactorSpec::down(name)))
        .collect()
}

/// How the daily hook moves toward the candidate set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyVariant {
    /// Exit non-candidates, equal-weight every candidate.
    Simple,
    /// Gate exits and entries with the moving-average trend filter.
    TrendFiltered {
        filter: TrendFilter,
        observation: usize,
    },
}

impl StrategyVariant {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyVariant::Simple => "simple",
            StrategyVariant::TrendFiltered { .. } => "trend",
        }
    }
}

/// What the daily hook does when the candidate set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyCandidatePolicy {
    #[default]
    Hold,
    Liquidate,
}

impl FromStr for EmptyCandidatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hold" => Ok(EmptyCandidatePolicy::Hold),
            "liquidate" => Ok(EmptyCandidatePolicy::Liquidate),
            other => Err(format!("unknown empty candidate policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub index_id: String,
    pub factors: Vec<FactorSpec>,
    pub top_n: usize,
    pub factor_lookback: usize,
    pub refresh_trading_day: u32,
    /// Calendar day of month the daily hook trades on; every day if `None`.
    pub rebalance_day: Option<u32>,
    pub variant: StrategyVariant,
    pub factor_failure: FactorFailurePolicy,
    pub empty_candidates: EmptyCandidatePolicy,
    pub initial_candidates: Vec<String>,
}

impl StrategyConfig {
    pub fn new(index_id: &str, variant: StrategyVariant) -> Self {
        StrategyConfig {
            name: "Multi-factor".to_string(),
            index_id: index_id.to_string(),
            factors: default_factors(),
            top_n: DEFAULT_TOP_N,
            factor_lookback: DEFAULT_FACTOR_LOOKBACK,
            refresh_trading_day: DEFAULT_REFRESH_TRADING_DAY,
            rebalance_day: None,
            variant,
            factor_failure: FactorFailurePolicy::default(),
            empty_candidates: EmptyCandidatePolicy::default(),
            initial_candidates: Vec::new(),
        }
    }
}

/// State shared by the refresh and rebalance hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyState {
    pub universe: Vec<String>,
    pub candidates: Vec<String>,
    pub scores: ScoreTable,
    pub last_refresh: Option<NaiveDate>,
}

impl StrategyState {
    pub fn new(config: &StrategyConfig) -> Self {
        StrategyState {
            candidates: config.initial_candidates.clone(),
            ..StrategyState::default()
        }
    }

    pub fn is_candidate(&self, code: &str) -> bool {
        self.candidates.iter().any(|c| c == code)
    }

    /// Equal weight per candidate, or `None` when there are no candidates.
    pub fn candidate_weight(&self) -> Option<f64> {
        if self.candidates.is_empty() {
            None
        } else {
            Some(1.0 / self.candidates.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factor::FactorDirection;

    #[test]
    fn default_catalogue_has_three_each_way() {
        let factors = default_factors();
        assert_eq!(factors.len(), 6);
        let ups = factors
            .iter()
            .filter(|f| f.direction == FactorDirection::Up)
            .count();
        assert_eq!(ups, 3);
        assert_eq!(factors[0].name, "basic_earnings_per_share");
        assert_eq!(factors[3].name, "market_cap");
        assert_eq!(factors[3].direction, FactorDirection::Down);
    }

    #[test]
    fn config_defaults() {
        let config = StrategyConfig::new("000300.XSHG", StrategyVariant::Simple);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.refresh_trading_day, 4);
        assert_eq!(config.factor_lookback, 10);
        assert_eq!(config.rebalance_day, None);
        assert_eq!(config.variant.name(), "simple");
        assert_eq!(config.empty_candidates, EmptyCandidatePolicy::Hold);
    }

    #[test]
    fn state_starts_with_initial_candidates() {
        let mut config = StrategyConfig::new("IDX", StrategyVariant::Simple);
        config.initial_candidates = vec!["300122.XSHE".to_string()];
        let state = StrategyState::new(&config);
        assert!(state.is_candidate("300122.XSHE"));
        assert_eq!(state.candidate_weight(), Some(1.0));
        assert!(state.last_refresh.is_none());
    }

    #[test]
    fn candidate_weight_empty() {
        let state = StrategyState::default();
        assert_eq!(state.candidate_weight(), None);
    }

    #[test]
    fn candidate_weight_is_equal_split() {
        let state = StrategyState {
            candidates: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            ..StrategyState::default()
        };
        assert_eq!(state.candidate_weight(), Some(0.25));
    }

    #[test]
    fn empty_policy_parses() {
        assert_eq!(
            "Liquidate".parse::<EmptyCandidatePolicy>(),
            Ok(EmptyCandidatePolicy::Liquidate)
        );
        assert!("panic".parse::<EmptyCandidatePolicy>().is_err());
    }
}
