//! Moving-average series over closing prices.
//!
//! - `IndicatorPoint`: one point of a series, flagged invalid during warmup
//! - `IndicatorSeries`: a series aligned index-for-index with its input prices

pub mod sma;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub period: usize,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Valid value `back` points before the last one (`back = 0` is the latest).
    pub fn from_end(&self, back: usize) -> Option<f64> {
        let idx = self.values.len().checked_sub(back + 1)?;
        let point = self.values[idx];
        point.valid.then_some(point.value)
    }

    pub fn latest(&self) -> Option<f64> {
        self.from_end(0)
    }
}

impl fmt::Display for IndicatorSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SMA({})", self.period)
    }
}
