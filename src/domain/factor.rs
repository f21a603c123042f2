//! Factor definitions and cross-sectional snapshots.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Whether a higher or lower raw value ranks better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorDirection {
    Up,
    Down,
}

impl fmt::Display for FactorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorDirection::Up => write!(f, "up"),
            FactorDirection::Down => write!(f, "down"),
        }
    }
}

impl FromStr for FactorDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(FactorDirection::Up),
            "down" => Ok(FactorDirection::Down),
            other => Err(format!("unknown factor direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactorSpec {
    pub name: String,
    pub direction: FactorDirection,
}

impl FactorSpec {
    pub fn up(name: &str) -> Self {
        FactorSpec {
            name: name.to_string(),
            direction: FactorDirection::Up,
        }
    }

    pub fn down(name: &str) -> Self {
        FactorSpec {
            name: name.to_string(),
            direction: FactorDirection::Down,
        }
    }
}

impl fmt::Display for FactorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.direction)
    }
}

/// Raw values of one factor at a single date.
///
/// `values` keeps the order in which identifiers were requested. A `None`
/// entry marks an instrument with no value for this factor on `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSnapshot {
    pub factor: String,
    pub date: Option<NaiveDate>,
    pub values: Vec<(String, Option<f64>)>,
}

impl FactorSnapshot {
    pub fn new(factor: &str, date: Option<NaiveDate>, values: Vec<(String, Option<f64>)>) -> Self {
        FactorSnapshot {
            factor: factor.to_string(),
            date,
            values,
        }
    }

    /// A snapshot with every requested identifier marked missing.
    pub fn missing(factor: &str, codes: &[String]) -> Self {
        FactorSnapshot {
            factor: factor.to_string(),
            date: None,
            values: codes.iter().map(|c| (c.clone(), None)).collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(c, _)| c == code)
            .and_then(|(_, v)| *v)
            .filter(|v| v.is_finite())
    }

    /// Entries with a finite value, in snapshot order.
    pub fn present(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().filter_map(|(code, value)| match value {
            Some(v) if v.is_finite() => Some((code.as_str(), *v)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_case_insensitive() {
        assert_eq!("UP".parse::<FactorDirection>(), Ok(FactorDirection::Up));
        assert_eq!(" down ".parse::<FactorDirection>(), Ok(FactorDirection::Down));
        assert!("sideways".parse::<FactorDirection>().is_err());
    }

    #[test]
    fn spec_display() {
        assert_eq!(FactorSpec::up("roe").to_string(), "roe(up)");
        assert_eq!(FactorSpec::down("pb_ratio").to_string(), "pb_ratio(down)");
    }

    #[test]
    fn present_skips_missing_and_nan() {
        let snap = FactorSnapshot::new(
            "roe",
            None,
            vec![
                ("A".into(), Some(1.0)),
                ("B".into(), None),
                ("C".into(), Some(f64::NAN)),
                ("D".into(), Some(-2.0)),
            ],
        );
        let present: Vec<_> = snap.present().collect();
        assert_eq!(present, vec![("A", 1.0), ("D", -2.0)]);
        assert_eq!(snap.get("C"), None);
        assert_eq!(snap.get("D"), Some(-2.0));
    }

    #[test]
    fn missing_snapshot_marks_everything() {
        let codes = vec!["A".to_string(), "B".to_string()];
        let snap = FactorSnapshot::missing("roe", &codes);
        assert_eq!(snap.values.len(), 2);
        assert_eq!(snap.present().count(), 0);
    }
}
