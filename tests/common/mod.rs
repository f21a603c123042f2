#![allow(dead_code)]

use chrono::NaiveDate;
use factortrend::domain::error::FactorTraderError;
use factortrend::domain::factor::FactorSnapshot;
use factortrend::domain::ohlcv::{BarField, BarSize};
use factortrend::ports::market_data_port::MarketDataPort;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// In-memory host with per-factor and per-code failure injection.
pub struct MockHost {
    pub members: Vec<String>,
    pub factors: HashMap<String, Vec<(String, Option<f64>)>>,
    pub prices: HashMap<String, Vec<f64>>,
    pub failing_factors: HashSet<String>,
    pub index_error: Option<String>,
    pub factor_calls: RefCell<Vec<String>>,
}

impl MockHost {
    pub fn new(members: &[&str]) -> Self {
        Self {
            members: codes(members),
            factors: HashMap::new(),
            prices: HashMap::new(),
            failing_factors: HashSet::new(),
            index_error: None,
            factor_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_factor(mut self, name: &str, values: &[(&str, Option<f64>)]) -> Self {
        self.factors.insert(
            name.to_string(),
            values.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
        );
        self
    }

    pub fn with_failing_factor(mut self, name: &str) -> Self {
        self.failing_factors.insert(name.to_string());
        self
    }

    pub fn with_prices(mut self, code: &str, prices: Vec<f64>) -> Self {
        self.prices.insert(code.to_string(), prices);
        self
    }

    pub fn with_index_error(mut self, reason: &str) -> Self {
        self.index_error = Some(reason.to_string());
        self
    }
}

impl MarketDataPort for MockHost {
    fn get_index_members(&self, _index_id: &str) -> Result<Vec<String>, FactorTraderError> {
        if let Some(reason) = &self.index_error {
            return Err(FactorTraderError::external("get_index_members", reason.clone()));
        }
        Ok(self.members.clone())
    }

    fn get_factor_values(
        &self,
        codes: &[String],
        factor: &str,
        _lookback: usize,
        as_of: NaiveDate,
    ) -> Result<FactorSnapshot, FactorTraderError> {
        self.factor_calls.borrow_mut().push(factor.to_string());
        if self.failing_factors.contains(factor) {
            return Err(FactorTraderError::external("get_factor_values", "timeout"));
        }
        match self.factors.get(factor) {
            Some(values) => {
                let aligned = codes
                    .iter()
                    .map(|c| {
                        let v = values.iter().find(|(code, _)| code == c).and_then(|(_, v)| *v);
                        (c.clone(), v)
                    })
                    .collect();
                Ok(FactorSnapshot::new(factor, Some(as_of), aligned))
            }
            None => Ok(FactorSnapshot::missing(factor, codes)),
        }
    }

    fn get_price_history(
        &self,
        code: &str,
        count: usize,
        _bar_size: BarSize,
        _field: BarField,
        _as_of: NaiveDate,
    ) -> Result<Vec<f64>, FactorTraderError> {
        let prices = self
            .prices
            .get(code)
            .ok_or_else(|| FactorTraderError::external("get_price_history", code))?;
        let start = prices.len().saturating_sub(count);
        Ok(prices[start..].to_vec())
    }
}

pub fn codes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Strictly increasing closes `1.0, 2.0, ..., n`.
pub fn rising(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

/// Weekday dates from `start` through `end`.
pub fn weekdays(start: &str, end: &str) -> Vec<NaiveDate> {
    use chrono::{Datelike, Weekday};
    let end = date(end);
    date(start)
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
