//! In-memory target weight book for replays.

use crate::domain::error::FactorTraderError;
use crate::ports::trading_port::TradingPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One accepted target-weight directive.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub date: Option<NaiveDate>,
    pub code: String,
    pub weight: f64,
}

/// Records target weights without simulating fills.
#[derive(Debug, Default)]
pub struct PaperBook {
    weights: BTreeMap<String, f64>,
    session: Option<NaiveDate>,
    journal: Vec<JournalEntry>,
}

impl PaperBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, code: &str) -> Option<f64> {
        self.weights.get(code).copied()
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Sum of all target weights.
    pub fn gross_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

impl TradingPort for PaperBook {
    fn set_target_weight(&mut self, code: &str, fraction: f64) -> Result<(), FactorTraderError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(FactorTraderError::external(
                "set_target_weight",
                format!("weight {} for {} outside [0, 1]", fraction, code),
            ));
        }
        if fraction == 0.0 {
            self.weights.remove(code);
        } else {
            self.weights.insert(code.to_string(), fraction);
        }
        self.journal.push(JournalEntry {
            date: self.session,
            code: code.to_string(),
            weight: fraction,
        });
        Ok(())
    }

    fn get_current_positions(&self) -> Result<Vec<String>, FactorTraderError> {
        Ok(self.weights.keys().cloned().collect())
    }

    fn begin_session(&mut self, date: NaiveDate) {
        self.session = Some(date);
    }
}
