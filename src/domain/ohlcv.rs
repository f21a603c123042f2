//! Daily bar representation and bar field selection.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarSize {
    Day,
}

impl fmt::Display for BarSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarSize::Day => write!(f, "1d"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl OhlcvBar {
    pub fn field(&self, field: BarField) -> f64 {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => self.volume as f64,
        }
    }
}
