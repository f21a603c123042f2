//! Dual moving-average trend filter.
//!
//! Held instruments are checked for exits, unheld candidates for entries.
//!
//! # Exit (either fires)
//!
//! - Divergence: short SMA below long SMA by more than `divergence_threshold`
//!   of the long SMA
//! - Death cross confirmation: price below a falling short SMA
//!
//! # Entry (all required)
//!
//! - Golden state: short SMA above long SMA
//! - Short SMA rising
//! - Price above short SMA

use crate::domain::error::FactorTraderError;
use crate::domain::indicator::sma::calculate_sma;
use std::fmt;

pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellTrigger {
    Divergence,
    DeathCross,
}

/// Short/long windows with `0 < short < long`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendWindows {
    short: usize,
    long: usize,
}

impl TrendWindows {
    pub fn new(short: usize, long: usize) -> Result<Self, FactorTraderError> {
        if short == 0 {
            return Err(FactorTraderError::invalid_input(
                "short window must be positive",
            ));
        }
        if short >= long {
            return Err(FactorTraderError::invalid_input(format!(
                "short window {} must be shorter than long window {}",
                short, long
            )));
        }
        Ok(TrendWindows { short, long })
    }

    pub fn short(&self) -> usize {
        self.short
    }

    pub fn long(&self) -> usize {
        self.long
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFilter {
    pub windows: TrendWindows,
    pub divergence_threshold: f64,
}

impl TrendFilter {
    pub fn new(windows: TrendWindows) -> Self {
        TrendFilter {
            windows,
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
        }
    }
}

/// Moving averages at the latest and previous bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaSnapshot {
    pub price: f64,
    pub short: f64,
    pub long: f64,
    pub prev_short: f64,
    pub prev_long: Option<f64>,
}

impl MaSnapshot {
    pub fn compute(prices: &[f64], windows: TrendWindows) -> Option<Self> {
        let short_series = calculate_sma(prices, windows.short);
        let long_series = calculate_sma(prices, windows.long);
        Some(MaSnapshot {
            price: *prices.last()?,
            short: short_series.latest()?,
            long: long_series.latest()?,
            prev_short: short_series.from_end(1)?,
            prev_long: long_series.from_end(1),
        })
    }

    /// `(long - short) / long` when short is below long and long is positive.
    pub fn divergence_ratio(&self) -> Option<f64> {
        if self.short < self.long && self.long > 0.0 {
            Some((self.long - self.short) / self.long)
        } else {
            None
        }
    }

    pub fn golden_state(&self) -> bool {
        self.short > self.long
    }

    pub fn short_rising(&self) -> bool {
        self.short > self.prev_short
    }

    pub fn price_above_short(&self) -> bool {
        self.price > self.short
    }

    pub fn death_cross(&self) -> bool {
        self.price < self.short && self.short < self.prev_short
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientHistory {
    pub bars: usize,
    pub required: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendEvaluation {
    pub signal: Signal,
    pub snapshot: Option<MaSnapshot>,
    pub sell_triggers: Vec<SellTrigger>,
    pub insufficient: Option<InsufficientHistory>,
}

impl TrendEvaluation {
    fn insufficient(bars: usize, required: usize) -> Self {
        TrendEvaluation {
            signal: Signal::Hold,
            snapshot: None,
            sell_triggers: Vec::new(),
            insufficient: Some(InsufficientHistory { bars, required }),
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.insufficient.is_some()
    }
}

/// Evaluate exits for a held instrument or entries for an unheld one.
pub fn evaluate_signal(prices: &[f64], filter: &TrendFilter, holding: bool) -> TrendEvaluation {
    if holding {
        evaluate_exit(prices, filter)
    } else {
        evaluate_entry(prices, filter)
    }
}

pub fn evaluate_exit(prices: &[f64], filter: &TrendFilter) -> TrendEvaluation {
    let snapshot = match snapshot_or_insufficient(prices, filter.windows) {
        Ok(s) => s,
        Err(eval) => return eval,
    };

    let mut sell_triggers = Vec::new();
    if snapshot
        .divergence_ratio()
        .is_some_and(|ratio| ratio > filter.divergence_threshold)
    {
        sell_triggers.push(SellTrigger::Divergence);
    }
    if snapshot.death_cross() {
        sell_triggers.push(SellTrigger::DeathCross);
    }

    let signal = if sell_triggers.is_empty() {
        Signal::Hold
    } else {
        Signal::Sell
    };

    TrendEvaluation {
        signal,
        snapshot: Some(snapshot),
        sell_triggers,
        insufficient: None,
    }
}

pub fn evaluate_entry(prices: &[f64], filter: &TrendFilter) -> TrendEvaluation {
    let snapshot = match snapshot_or_insufficient(prices, filter.windows) {
        Ok(s) => s,
        Err(eval) => return eval,
    };

    let buy = snapshot.golden_state() && snapshot.short_rising() && snapshot.price_above_short();

    TrendEvaluation {
        signal: if buy { Signal::Buy } else { Signal::Hold },
        snapshot: Some(snapshot),
        sell_triggers: Vec::new(),
        insufficient: None,
    }
}

fn snapshot_or_insufficient(
    prices: &[f64],
    windows: TrendWindows,
) -> Result<MaSnapshot, TrendEvaluation> {
    if prices.len() < windows.long {
        return Err(TrendEvaluation::insufficient(prices.len(), windows.long));
    }
    // long > short, so one extra bar for the previous short SMA always exists.
    MaSnapshot::compute(prices, windows)
        .ok_or_else(|| TrendEvaluation::insufficient(prices.len(), windows.long))
}
