//! Host market data port trait.

use crate::domain::error::FactorTraderError;
use crate::domain::factor::FactorSnapshot;
use crate::domain::ohlcv::{BarField, BarSize};
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Members of `index_id` in the host's order.
    fn get_index_members(&self, index_id: &str) -> Result<Vec<String>, FactorTraderError>;

    /// Values of `factor` for `codes` at the latest date on or before `as_of`,
    /// searching at most `lookback` dates back.
    fn get_factor_values(
        &self,
        codes: &[String],
        factor: &str,
        lookback: usize,
        as_of: NaiveDate,
    ) -> Result<FactorSnapshot, FactorTraderError>;

    /// The last `count` values of `field`, chronological, ending on or before `as_of`.
    fn get_price_history(
        &self,
        code: &str,
        count: usize,
        bar_size: BarSize,
        field: BarField,
        as_of: NaiveDate,
    ) -> Result<Vec<f64>, FactorTraderError>;
}
