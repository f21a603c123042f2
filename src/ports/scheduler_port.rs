//! Scheduler port: binds strategy hooks to the host's clock.

use crate::domain::error::FactorTraderError;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// The `trading_day`-th trading date of each month (1-based).
    Monthly { trading_day: u32 },
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Rescore the universe and replace the candidate set.
    Refresh,
    /// Move target weights toward the candidate set.
    Rebalance,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Refresh => write!(f, "refresh"),
            Hook::Rebalance => write!(f, "rebalance"),
        }
    }
}

pub trait SchedulerPort {
    fn register(&mut self, cadence: Cadence, hook: Hook);
}

/// Receives hook invocations from a scheduler.
pub trait HookHandler {
    fn on_hook(&mut self, hook: Hook, date: NaiveDate) -> Result<(), FactorTraderError>;
}
