//! CSV file host data adapter.
//!
//! Layout under the base directory:
//!
//! - `index_members.csv`: `index,code`
//! - `factors.csv`: `date,code,factor,value` (empty value = missing)
//! - `prices/<code>.csv`: `date,open,high,low,close,volume`
//!
//! `factors.csv` is parsed on first use and kept for the adapter's lifetime.

use crate::domain::calendar::build_unified_timeline;
use crate::domain::error::FactorTraderError;
use crate::domain::factor::FactorSnapshot;
use crate::domain::ohlcv::{BarField, BarSize, OhlcvBar};
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvHostAdapter {
    base_path: PathBuf,
    factor_rows: OnceCell<Vec<FactorRow>>,
}

struct FactorRow {
    date: NaiveDate,
    code: String,
    factor: String,
    value: Option<f64>,
}

impl CsvHostAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            factor_rows: OnceCell::new(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join("index_members.csv")
    }

    fn factors_path(&self) -> PathBuf {
        self.base_path.join("factors.csv")
    }

    fn price_path(&self, code: &str) -> PathBuf {
        self.base_path.join("prices").join(format!("{}.csv", code))
    }

    fn read(&self, path: &Path, operation: &str) -> Result<String, FactorTraderError> {
        fs::read_to_string(path).map_err(|e| {
            FactorTraderError::external(operation, format!("failed to read {}: {}", path.display(), e))
        })
    }

    fn factor_rows(&self) -> Result<&[FactorRow], FactorTraderError> {
        if let Some(rows) = self.factor_rows.get() {
            return Ok(rows);
        }
        let rows = self.read_factor_rows()?;
        debug!(rows = rows.len(), "loaded factor table");
        Ok(self.factor_rows.get_or_init(|| rows))
    }

    fn read_factor_rows(&self) -> Result<Vec<FactorRow>, FactorTraderError> {
        const OP: &str = "get_factor_values";
        let content = self.read(&self.factors_path(), OP)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| FactorTraderError::external(OP, format!("CSV parse error: {}", e)))?;
            let date = parse_date(record.get(0), OP)?;
            let code = field(&record, 1, "code", OP)?.to_string();
            let factor = field(&record, 2, "factor", OP)?.to_string();
            let raw = record.get(3).unwrap_or("").trim();
            let value = if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(raw.parse::<f64>().map_err(|e| {
                    FactorTraderError::external(OP, format!("invalid value '{}': {}", raw, e))
                })?)
            };
            rows.push(FactorRow {
                date,
                code,
                factor,
                value,
            });
        }
        Ok(rows)
    }

    /// Daily bars for `code`, sorted by date.
    pub fn load_bars(&self, code: &str) -> Result<Vec<OhlcvBar>, FactorTraderError> {
        const OP: &str = "get_price_history";
        let content = self.read(&self.price_path(code), OP)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| FactorTraderError::external(OP, format!("CSV parse error: {}", e)))?;
            let date = parse_date(record.get(0), OP)?;
            let number = |idx: usize, name: &str| -> Result<f64, FactorTraderError> {
                field(&record, idx, name, OP)?
                    .parse::<f64>()
                    .map_err(|e| FactorTraderError::external(OP, format!("invalid {} value: {}", name, e)))
            };
            bars.push(OhlcvBar {
                date,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")? as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// Union of the bar dates of `codes` within `[start, end]`.
    ///
    /// Codes without a price file are skipped.
    pub fn trading_dates(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, FactorTraderError> {
        let mut series = Vec::with_capacity(codes.len());
        for code in codes {
            if !self.price_path(code).exists() {
                warn!(%code, "no price file, excluded from trading calendar");
                continue;
            }
            let bars = self.load_bars(code)?;
            series.push(
                bars.into_iter()
                    .map(|b| b.date)
                    .filter(|d| *d >= start && *d <= end)
                    .collect::<Vec<_>>(),
            );
        }
        Ok(build_unified_timeline(series))
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    idx: usize,
    name: &str,
    operation: &str,
) -> Result<&'a str, FactorTraderError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| FactorTraderError::external(operation, format!("missing {} column", name)))
}

fn parse_date(raw: Option<&str>, operation: &str) -> Result<NaiveDate, FactorTraderError> {
    let raw = raw.ok_or_else(|| FactorTraderError::external(operation, "missing date column"))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| FactorTraderError::external(operation, format!("invalid date format: {}", e)))
}

impl MarketDataPort for CsvHostAdapter {
    fn get_index_members(&self, index_id: &str) -> Result<Vec<String>, FactorTraderError> {
        const OP: &str = "get_index_members";
        let content = self.read(&self.index_path(), OP)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut members = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| FactorTraderError::external(OP, format!("CSV parse error: {}", e)))?;
            if field(&record, 0, "index", OP)? == index_id {
                members.push(field(&record, 1, "code", OP)?.to_string());
            }
        }
        Ok(members)
    }

    fn get_factor_values(
        &self,
        codes: &[String],
        factor: &str,
        lookback: usize,
        as_of: NaiveDate,
    ) -> Result<FactorSnapshot, FactorTraderError> {
        let rows = self.factor_rows()?;

        // The last `lookback` dates with any factor data form the search window.
        let dates: BTreeSet<NaiveDate> = rows
            .iter()
            .map(|r| r.date)
            .filter(|d| *d <= as_of)
            .collect();
        let window_start = dates.iter().rev().nth(lookback.max(1) - 1).or(dates.iter().next());

        let latest = rows
            .iter()
            .filter(|r| r.factor == factor && r.date <= as_of)
            .filter(|r| window_start.is_none_or(|start| r.date >= *start))
            .map(|r| r.date)
            .max();

        let Some(latest) = latest else {
            return Ok(FactorSnapshot::missing(factor, codes));
        };

        let values: HashMap<&str, Option<f64>> = rows
            .iter()
            .filter(|r| r.factor == factor && r.date == latest)
            .map(|r| (r.code.as_str(), r.value))
            .collect();

        Ok(FactorSnapshot::new(
            factor,
            Some(latest),
            codes
                .iter()
                .map(|c| (c.clone(), values.get(c.as_str()).copied().flatten()))
                .collect(),
        ))
    }

    fn get_price_history(
        &self,
        code: &str,
        count: usize,
        bar_size: BarSize,
        field: BarField,
        as_of: NaiveDate,
    ) -> Result<Vec<f64>, FactorTraderError> {
        debug!(%code, %bar_size, ?field, %as_of, count, "loading price history");
        let bars = self.load_bars(code)?;
        let available: Vec<&OhlcvBar> = bars.iter().filter(|b| b.date <= as_of).collect();
        let start = available.len().saturating_sub(count);
        Ok(available[start..].iter().map(|b| b.field(field)).collect())
    }
}
