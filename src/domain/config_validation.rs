//! Configuration validation.
//!
//! Checks every section before a strategy is built or replayed.

use crate::domain::error::FactorTraderError;
use crate::domain::scoring::FactorFailurePolicy;
use crate::domain::strategy::{
    DEFAULT_FACTOR_LOOKBACK, DEFAULT_LONG_WINDOW, DEFAULT_OBSERVATION,
    DEFAULT_REFRESH_TRADING_DAY, DEFAULT_SHORT_WINDOW, DEFAULT_TOP_N, EmptyCandidatePolicy,
};
use crate::domain::trend_filter::DEFAULT_DIVERGENCE_THRESHOLD;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Longest possible run of trading dates in one month.
pub const MAX_TRADING_DAY: i64 = 23;

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    validate_index(config)?;
    validate_top_n(config)?;
    let variant = validate_variant(config)?;
    validate_refresh_day(config)?;
    validate_rebalance_day(config)?;
    validate_lookback(config)?;
    validate_policies(config)?;
    validate_factor_config(config)?;
    if variant == "trend" {
        validate_trend_config(config)?;
    }
    Ok(())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    match config.get_string("replay", "data_dir") {
        Some(s) if !s.trim().is_empty() => {}
        _ => return Err(missing("replay", "data_dir")),
    }

    let start = parse_date(config, "replay", "start_date")?;
    let end = parse_date(config, "replay", "end_date")?;
    if start > end {
        return Err(invalid("replay", "start_date", "start_date must not be after end_date"));
    }
    Ok(())
}

pub fn validate_factor_config(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    let up = config.get_list("factors", "up");
    let down = config.get_list("factors", "down");
    if up.is_none() && down.is_none() {
        return Ok(());
    }

    let up = up.unwrap_or_default();
    let down = down.unwrap_or_default();
    if up.is_empty() && down.is_empty() {
        return Err(invalid("factors", "up", "at least one factor is required"));
    }

    let mut seen = HashSet::new();
    for (key, name) in up
        .iter()
        .map(|n| ("up", n))
        .chain(down.iter().map(|n| ("down", n)))
    {
        if !seen.insert(name.as_str()) {
            return Err(invalid(
                "factors",
                key,
                &format!("factor '{}' listed more than once", name),
            ));
        }
    }
    Ok(())
}

pub fn validate_trend_config(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    let short = int_value(config, "trend", "short_window", DEFAULT_SHORT_WINDOW as i64)?;
    let long = int_value(config, "trend", "long_window", DEFAULT_LONG_WINDOW as i64)?;
    let observation = int_value(config, "trend", "observation", DEFAULT_OBSERVATION as i64)?;
    let threshold = float_value(
        config,
        "trend",
        "divergence_threshold",
        DEFAULT_DIVERGENCE_THRESHOLD,
    )?;

    if short < 1 {
        return Err(invalid("trend", "short_window", "short_window must be at least 1"));
    }
    if long <= short {
        return Err(invalid(
            "trend",
            "long_window",
            "long_window must be greater than short_window",
        ));
    }
    if observation < long {
        return Err(invalid(
            "trend",
            "observation",
            "observation must be at least long_window",
        ));
    }
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(invalid(
            "trend",
            "divergence_threshold",
            "divergence_threshold must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_index(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    match config.get_string("strategy", "index") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(missing("strategy", "index")),
    }
}

fn validate_top_n(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    if int_value(config, "strategy", "top_n", DEFAULT_TOP_N as i64)? < 1 {
        return Err(invalid("strategy", "top_n", "top_n must be at least 1"));
    }
    Ok(())
}

fn validate_variant(config: &dyn ConfigPort) -> Result<String, FactorTraderError> {
    let variant = config
        .get_string("strategy", "variant")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "simple".to_string());
    match variant.as_str() {
        "simple" | "trend" => Ok(variant),
        other => Err(invalid(
            "strategy",
            "variant",
            &format!("unknown variant '{}', expected simple or trend", other),
        )),
    }
}

fn validate_refresh_day(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    let day = int_value(
        config,
        "strategy",
        "refresh_trading_day",
        DEFAULT_REFRESH_TRADING_DAY as i64,
    )?;
    if !(1..=MAX_TRADING_DAY).contains(&day) {
        return Err(invalid(
            "strategy",
            "refresh_trading_day",
            &format!("refresh_trading_day must be between 1 and {}", MAX_TRADING_DAY),
        ));
    }
    Ok(())
}

fn validate_rebalance_day(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    let Some(raw) = config.get_string("strategy", "rebalance_day") else {
        return Ok(());
    };
    match raw.trim().parse::<u32>() {
        Ok(day) if (1..=31).contains(&day) => Ok(()),
        _ => Err(invalid(
            "strategy",
            "rebalance_day",
            "rebalance_day must be a day of month between 1 and 31",
        )),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    let lookback = int_value(
        config,
        "strategy",
        "factor_lookback",
        DEFAULT_FACTOR_LOOKBACK as i64,
    )?;
    if lookback < 1 {
        return Err(invalid(
            "strategy",
            "factor_lookback",
            "factor_lookback must be at least 1",
        ));
    }
    Ok(())
}

fn validate_policies(config: &dyn ConfigPort) -> Result<(), FactorTraderError> {
    if let Some(raw) = config.get_string("strategy", "factor_failure") {
        raw.parse::<FactorFailurePolicy>()
            .map_err(|e| invalid("strategy", "factor_failure", &e))?;
    }
    if let Some(raw) = config.get_string("strategy", "empty_candidates") {
        raw.parse::<EmptyCandidatePolicy>()
            .map_err(|e| invalid("strategy", "empty_candidates", &e))?;
    }
    Ok(())
}

pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, FactorTraderError> {
    match config.get_string(section, key) {
        None => Err(missing(section, key)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                section,
                key,
                &format!("invalid {} format, expected YYYY-MM-DD", key),
            )
        }),
    }
}

/// Integer value of `key`, `default` when absent. Present but unparseable is an error.
fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, FactorTraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            invalid(
                section,
                key,
                &format!("{} must be an integer, got '{}'", key, raw.trim()),
            )
        }),
    }
}

fn float_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, FactorTraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            invalid(
                section,
                key,
                &format!("{} must be a number, got '{}'", key, raw.trim()),
            )
        }),
    }
}

fn missing(section: &str, key: &str) -> FactorTraderError {
    FactorTraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> FactorTraderError {
    FactorTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
