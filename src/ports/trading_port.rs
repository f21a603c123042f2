//! Host order-directive port trait.

use crate::domain::error::FactorTraderError;
use chrono::NaiveDate;

pub trait TradingPort {
    /// Converge the portfolio weight of `code` to `fraction` (0 exits fully).
    fn set_target_weight(&mut self, code: &str, fraction: f64) -> Result<(), FactorTraderError>;

    /// Instruments currently held with a nonzero weight.
    fn get_current_positions(&self) -> Result<Vec<String>, FactorTraderError>;

    /// Trading date of the directives that follow.
    fn begin_session(&mut self, _date: NaiveDate) {}
}
