//! Strategy entry points invoked by the host scheduler.
//!
//! `monthly_refresh` rescores the index universe and replaces the candidate
//! set held in [`StrategyState`]. `daily_rebalance` issues target-weight
//! directives toward that set, either directly or gated by the trend filter.
//! Index, price and trading call failures end the invocation; factor fetch
//! failures follow [`FactorFailurePolicy`](crate::domain::scoring::FactorFailurePolicy).

use crate::domain::error::FactorTraderError;
use crate::domain::ohlcv::{BarField, BarSize};
use crate::domain::scoring::{ScoringReport, score_and_select};
use crate::domain::strategy::{EmptyCandidatePolicy, StrategyConfig, StrategyState, StrategyVariant};
use crate::domain::trend_filter::{Signal, TrendFilter, evaluate_entry, evaluate_exit};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::scheduler_port::{Cadence, Hook, SchedulerPort};
use crate::ports::trading_port::TradingPort;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightReason {
    /// Held but no longer a candidate.
    NotCandidate,
    /// Equal-weight allocation to a candidate.
    Candidate,
    /// First allocation into an empty portfolio.
    InitialEntry,
    TrendExit,
    TrendEntry,
    /// Candidate set is empty and the policy is to exit everything.
    Liquidate,
}

impl fmt::Display for WeightReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeightReason::NotCandidate => "not_candidate",
            WeightReason::Candidate => "candidate",
            WeightReason::InitialEntry => "initial_entry",
            WeightReason::TrendExit => "trend_exit",
            WeightReason::TrendEntry => "trend_entry",
            WeightReason::Liquidate => "liquidate",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightDirective {
    pub code: String,
    pub weight: f64,
    pub reason: WeightReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceReport {
    pub date: NaiveDate,
    pub directives: Vec<WeightDirective>,
    /// The hook did not trade on this date.
    pub skipped: bool,
    /// Instruments whose trend evaluation lacked price history.
    pub insufficient_history: Vec<String>,
}

impl RebalanceReport {
    fn new(date: NaiveDate) -> Self {
        RebalanceReport {
            date,
            directives: Vec::new(),
            skipped: false,
            insufficient_history: Vec::new(),
        }
    }

    fn skipped(date: NaiveDate) -> Self {
        RebalanceReport {
            skipped: true,
            ..RebalanceReport::new(date)
        }
    }

    pub fn weight_for(&self, code: &str) -> Option<f64> {
        self.directives
            .iter()
            .rev()
            .find(|d| d.code == code)
            .map(|d| d.weight)
    }
}

/// Register the refresh and rebalance hooks with the host scheduler.
pub fn register_hooks(config: &StrategyConfig, scheduler: &mut dyn SchedulerPort) {
    scheduler.register(
        Cadence::Monthly {
            trading_day: config.refresh_trading_day,
        },
        Hook::Refresh,
    );
    scheduler.register(Cadence::Daily, Hook::Rebalance);
}

/// Order-preserving de-duplication of index members.
pub fn dedupe_universe(members: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    members
        .into_iter()
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

pub fn monthly_refresh(
    config: &StrategyConfig,
    state: &mut StrategyState,
    data: &dyn MarketDataPort,
    as_of: NaiveDate,
) -> Result<ScoringReport, FactorTraderError> {
    let members = data.get_index_members(&config.index_id)?;
    let universe = dedupe_universe(members);
    if universe.is_empty() {
        return Err(FactorTraderError::EmptyUniverse {
            index: config.index_id.clone(),
        });
    }
    info!(index = %config.index_id, members = universe.len(), %as_of, "refreshing candidates");

    let report = score_and_select(
        &universe,
        &config.factors,
        config.top_n,
        config.factor_failure,
        |spec| data.get_factor_values(&universe, &spec.name, config.factor_lookback, as_of),
    )?;

    if report.candidates.is_empty() {
        warn!(%as_of, "scoring produced no candidates");
    } else {
        debug!(candidates = ?report.candidates, "new candidate set");
    }

    state.universe = universe;
    state.candidates = report.candidates.clone();
    state.scores = report.table.clone();
    state.last_refresh = Some(as_of);
    Ok(report)
}

pub fn daily_rebalance(
    config: &StrategyConfig,
    state: &StrategyState,
    data: &dyn MarketDataPort,
    trading: &mut dyn TradingPort,
    date: NaiveDate,
) -> Result<RebalanceReport, FactorTraderError> {
    if let Some(day) = config.rebalance_day {
        if date.day() != day {
            return Ok(RebalanceReport::skipped(date));
        }
    }

    let held = trading.get_current_positions()?;
    let mut report = RebalanceReport::new(date);

    let Some(weight) = state.candidate_weight() else {
        match config.empty_candidates {
            EmptyCandidatePolicy::Hold => {
                warn!(%date, "candidate set is empty, holding current positions");
                report.skipped = true;
            }
            EmptyCandidatePolicy::Liquidate => {
                warn!(%date, held = held.len(), "candidate set is empty, liquidating");
                for code in &held {
                    issue(trading, &mut report, code, 0.0, WeightReason::Liquidate)?;
                }
            }
        }
        return Ok(report);
    };

    match config.variant {
        StrategyVariant::Simple => {
            for code in held.iter().filter(|c| !state.is_candidate(c)) {
                issue(trading, &mut report, code, 0.0, WeightReason::NotCandidate)?;
            }
            for code in &state.candidates {
                issue(trading, &mut report, code, weight, WeightReason::Candidate)?;
            }
        }
        StrategyVariant::TrendFiltered {
            filter,
            observation,
        } => {
            rebalance_with_trend(
                state,
                data,
                trading,
                &mut report,
                &held,
                &filter,
                observation,
                weight,
            )?;
        }
    }

    info!(%date, directives = report.directives.len(), "rebalance complete");
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn rebalance_with_trend(
    state: &StrategyState,
    data: &dyn MarketDataPort,
    trading: &mut dyn TradingPort,
    report: &mut RebalanceReport,
    held: &[String],
    filter: &TrendFilter,
    observation: usize,
    weight: f64,
) -> Result<(), FactorTraderError> {
    let date = report.date;

    if held.is_empty() {
        for code in &state.candidates {
            issue(trading, report, code, weight, WeightReason::InitialEntry)?;
        }
        return Ok(());
    }

    for code in held {
        let prices = data.get_price_history(code, observation, BarSize::Day, BarField::Close, date)?;
        let eval = evaluate_exit(&prices, filter);
        if let Some(gap) = eval.insufficient {
            info!(%code, bars = gap.bars, required = gap.required, "insufficient history for exit check");
            report.insufficient_history.push(code.clone());
            continue;
        }
        if eval.signal == Signal::Sell {
            if let Some(ma) = eval.snapshot {
                info!(%code, short = ma.short, long = ma.long, triggers = ?eval.sell_triggers, "sell signal");
            }
            issue(trading, report, code, 0.0, WeightReason::TrendExit)?;
        }
    }

    for code in state.candidates.iter().filter(|c| !held.contains(*c)) {
        let prices = data.get_price_history(code, observation, BarSize::Day, BarField::Close, date)?;
        let eval = evaluate_entry(&prices, filter);
        if let Some(gap) = eval.insufficient {
            info!(%code, bars = gap.bars, required = gap.required, "insufficient history for entry check");
            report.insufficient_history.push(code.clone());
            continue;
        }
        if let Some(ma) = eval.snapshot {
            debug!(
                %code,
                golden_state = ma.golden_state(),
                short_rising = ma.short_rising(),
                price_above_short = ma.price_above_short(),
                "entry check"
            );
        }
        if eval.signal == Signal::Buy {
            issue(trading, report, code, weight, WeightReason::TrendEntry)?;
        }
    }
    Ok(())
}

fn issue(
    trading: &mut dyn TradingPort,
    report: &mut RebalanceReport,
    code: &str,
    weight: f64,
    reason: WeightReason,
) -> Result<(), FactorTraderError> {
    trading.set_target_weight(code, weight)?;
    debug!(%code, weight, %reason, "target weight set");
    report.directives.push(WeightDirective {
        code: code.to_string(),
        weight,
        reason,
    });
    Ok(())
}
