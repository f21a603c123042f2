//! Multi-factor scoring and top-N selection.
//!
//! Each factor ranks the instruments that have a value for it, using the
//! "min" method (tied values share the best rank among them). A rank `r`
//! among `n` ranked instruments scores `n + 1 - r`. Scores are summed per
//! instrument and the top `top_n` totals form the candidate set. Ties on
//! the total keep universe order.

use crate::domain::error::FactorTraderError;
use crate::domain::factor::{FactorDirection, FactorSnapshot, FactorSpec};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What to do when fetching one factor's values fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorFailurePolicy {
    /// Drop the factor from this cycle and keep scoring the others.
    #[default]
    Skip,
    /// Abort the whole scoring cycle with the first error.
    Abort,
}

impl FromStr for FactorFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(FactorFailurePolicy::Skip),
            "abort" => Ok(FactorFailurePolicy::Abort),
            other => Err(format!("unknown factor failure policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub code: String,
    pub scores: Vec<(String, f64)>,
}

impl ScoreRow {
    pub fn total(&self) -> f64 {
        self.scores.iter().map(|(_, s)| s).sum()
    }

    pub fn score(&self, factor: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(name, _)| name == factor)
            .map(|(_, s)| *s)
    }

    pub fn is_scored(&self) -> bool {
        !self.scores.is_empty()
    }
}

/// Per-instrument, per-factor scores in universe order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    rows: Vec<ScoreRow>,
    index: HashMap<String, usize>,
}

impl ScoreTable {
    pub fn new(universe: &[String]) -> Self {
        let mut table = ScoreTable::default();
        for code in universe {
            if table.index.contains_key(code) {
                continue;
            }
            table.index.insert(code.clone(), table.rows.len());
            table.rows.push(ScoreRow {
                code: code.clone(),
                scores: Vec::new(),
            });
        }
        table
    }

    /// Record a factor score. Returns `false` if `code` is not in the table.
    pub fn record(&mut self, code: &str, factor: &str, score: f64) -> bool {
        match self.index.get(code) {
            Some(&i) => {
                let row = &mut self.rows[i];
                match row.scores.iter_mut().find(|(name, _)| name == factor) {
                    Some(entry) => entry.1 = score,
                    None => row.scores.push((factor.to_string(), score)),
                }
                true
            }
            None => false,
        }
    }

    pub fn row(&self, code: &str) -> Option<&ScoreRow> {
        self.index.get(code).map(|&i| &self.rows[i])
    }

    pub fn total(&self, code: &str) -> Option<f64> {
        self.row(code).map(ScoreRow::total)
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Instruments with at least one score, total descending, stable on ties.
    pub fn ranked(&self) -> Vec<&ScoreRow> {
        let mut scored: Vec<&ScoreRow> = self.rows.iter().filter(|r| r.is_scored()).collect();
        scored.sort_by(|a, b| b.total().total_cmp(&a.total()));
        scored
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactorOutcome {
    Scored { ranked: usize },
    /// No instrument had a value for this factor.
    Missing,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorReport {
    pub spec: FactorSpec,
    pub outcome: FactorOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringReport {
    pub candidates: Vec<String>,
    pub table: ScoreTable,
    pub factors: Vec<FactorReport>,
}

impl ScoringReport {
    pub fn scored_factor_count(&self) -> usize {
        self.factors
            .iter()
            .filter(|f| matches!(f.outcome, FactorOutcome::Scored { .. }))
            .count()
    }
}

/// "min" ranks for `values`: 1 is best, tied values share the lowest rank.
pub fn rank_min(values: &[f64], direction: FactorDirection) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    match direction {
        FactorDirection::Up => order.sort_by(|&a, &b| values[b].total_cmp(&values[a])),
        FactorDirection::Down => order.sort_by(|&a, &b| values[a].total_cmp(&values[b])),
    }

    let mut ranks = vec![0; values.len()];
    let mut prev: Option<(f64, usize)> = None;
    for (pos, &i) in order.iter().enumerate() {
        let rank = match prev {
            Some((value, rank)) if value == values[i] => rank,
            _ => pos + 1,
        };
        ranks[i] = rank;
        prev = Some((values[i], rank));
    }
    ranks
}

/// `n + 1 - rank` for each rank, where `n` is the number of ranks.
pub fn ranks_to_scores(ranks: &[usize]) -> Vec<f64> {
    let n = ranks.len();
    ranks.iter().map(|&r| (n + 1 - r) as f64).collect()
}

/// Score one factor snapshot into `table`. Returns the number of ranked instruments.
pub fn score_factor(table: &mut ScoreTable, spec: &FactorSpec, snapshot: &FactorSnapshot) -> usize {
    let present: Vec<(&str, f64)> = snapshot
        .present()
        .filter(|(code, _)| table.row(code).is_some())
        .collect();
    if present.is_empty() {
        return 0;
    }

    let values: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
    let ranks = rank_min(&values, spec.direction);
    let scores = ranks_to_scores(&ranks);

    for ((code, _), score) in present.iter().zip(scores) {
        table.record(code, &spec.name, score);
    }
    present.len()
}

/// Rank `universe` on every factor in `specs` and select the `top_n` best totals.
///
/// `fetch` supplies the snapshot for one factor. A failed fetch is isolated to
/// that factor under [`FactorFailurePolicy::Skip`].
pub fn score_and_select<F>(
    universe: &[String],
    specs: &[FactorSpec],
    top_n: usize,
    policy: FactorFailurePolicy,
    mut fetch: F,
) -> Result<ScoringReport, FactorTraderError>
where
    F: FnMut(&FactorSpec) -> Result<FactorSnapshot, FactorTraderError>,
{
    if specs.is_empty() {
        return Err(FactorTraderError::invalid_input("no factors to score"));
    }
    if top_n == 0 {
        return Err(FactorTraderError::invalid_input("top_n must be at least 1"));
    }
    if universe.is_empty() {
        return Err(FactorTraderError::EmptyUniverse {
            index: "universe".to_string(),
        });
    }

    let mut table = ScoreTable::new(universe);
    let mut factors = Vec::with_capacity(specs.len());

    for spec in specs {
        let outcome = match fetch(spec) {
            Ok(snapshot) => match score_factor(&mut table, spec, &snapshot) {
                0 => {
                    warn!(factor = %spec.name, "no valid values, factor skipped");
                    FactorOutcome::Missing
                }
                ranked => {
                    debug!(factor = %spec.name, ranked, date = ?snapshot.date, "factor scored");
                    FactorOutcome::Scored { ranked }
                }
            },
            Err(e) => {
                if policy == FactorFailurePolicy::Abort {
                    return Err(e);
                }
                warn!(factor = %spec.name, error = %e, "factor retrieval failed, skipped");
                FactorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        factors.push(FactorReport {
            spec: spec.clone(),
            outcome,
        });
    }

    let candidates: Vec<String> = table
        .ranked()
        .into_iter()
        .take(top_n)
        .map(|row| row.code.clone())
        .collect();

    info!(
        universe = table.len(),
        candidates = candidates.len(),
        top_n,
        "scoring cycle complete"
    );

    Ok(ScoringReport {
        candidates,
        table,
        factors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn codes(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn snapshot(factor: &str, values: &[(&str, Option<f64>)]) -> FactorSnapshot {
        FactorSnapshot::new(
            factor,
            None,
            values.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
        )
    }

    #[test]
    fn rank_min_up_with_ties() {
        let ranks = rank_min(&[10.0, 10.0, 5.0], FactorDirection::Up);
        assert_eq!(ranks, vec![1, 1, 3]);
    }

    #[test]
    fn rank_min_down_with_ties() {
        let ranks = rank_min(&[3.0, 1.0, 3.0, 2.0], FactorDirection::Down);
        assert_eq!(ranks, vec![3, 1, 3, 2]);
    }

    #[test]
    fn rank_min_all_equal() {
        let ranks = rank_min(&[7.0, 7.0, 7.0], FactorDirection::Up);
        assert_eq!(ranks, vec![1, 1, 1]);
    }

    #[test]
    fn scores_from_ranks() {
        assert_eq!(ranks_to_scores(&[1, 1, 3]), vec![3.0, 3.0, 1.0]);
        assert_eq!(ranks_to_scores(&[2, 1]), vec![1.0, 2.0]);
    }

    #[test]
    fn score_table_ignores_unknown_codes() {
        let mut table = ScoreTable::new(&codes(&["A", "B"]));
        assert!(table.record("A", "roe", 2.0));
        assert!(!table.record("Z", "roe", 1.0));
        assert_eq!(table.total("A"), Some(2.0));
        assert_eq!(table.total("Z"), None);
    }

    #[test]
    fn score_table_dedupes_universe() {
        let table = ScoreTable::new(&codes(&["A", "B", "A"]));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn tie_scenario_excludes_missing() {
        let universe = codes(&["A", "B", "C", "D"]);
        let specs = vec![FactorSpec::up("roic")];
        let report = score_and_select(&universe, &specs, 2, FactorFailurePolicy::Skip, |_| {
            Ok(snapshot(
                "roic",
                &[
                    ("A", Some(10.0)),
                    ("B", Some(10.0)),
                    ("C", Some(5.0)),
                    ("D", None),
                ],
            ))
        })
        .unwrap();

        assert_eq!(report.candidates, codes(&["A", "B"]));
        assert_eq!(report.table.total("A"), Some(3.0));
        assert_eq!(report.table.total("B"), Some(3.0));
        assert_eq!(report.table.total("C"), Some(1.0));
        assert_eq!(report.table.total("D"), Some(0.0));
        assert!(!report.table.row("D").unwrap().is_scored());
    }

    #[test]
    fn down_factor_prefers_low_values() {
        let universe = codes(&["A", "B", "C"]);
        let specs = vec![FactorSpec::down("pb_ratio")];
        let report = score_and_select(&universe, &specs, 3, FactorFailurePolicy::Skip, |_| {
            Ok(snapshot(
                "pb_ratio",
                &[("A", Some(4.0)), ("B", Some(1.0)), ("C", Some(2.5))],
            ))
        })
        .unwrap();
        assert_eq!(report.candidates, codes(&["B", "C", "A"]));
    }

    #[test]
    fn totals_sum_across_factors() {
        let universe = codes(&["A", "B", "C"]);
        let specs = vec![FactorSpec::up("roe"), FactorSpec::down("market_cap")];
        let report = score_and_select(&universe, &specs, 3, FactorFailurePolicy::Skip, |spec| {
            Ok(match spec.name.as_str() {
                "roe" => snapshot("roe", &[("A", Some(0.3)), ("B", Some(0.2)), ("C", Some(0.1))]),
                _ => snapshot(
                    "market_cap",
                    &[("A", Some(900.0)), ("B", Some(100.0)), ("C", None)],
                ),
            })
        })
        .unwrap();

        // roe: A=3 B=2 C=1; market_cap (n=2): B=2 A=1
        let a = report.table.row("A").unwrap();
        assert_relative_eq!(a.score("roe").unwrap(), 3.0);
        assert_relative_eq!(a.score("market_cap").unwrap(), 1.0);
        assert_relative_eq!(a.total(), 4.0);
        assert_relative_eq!(report.table.total("B").unwrap(), 4.0);
        assert_relative_eq!(report.table.total("C").unwrap(), 1.0);
        assert_eq!(report.candidates, codes(&["A", "B", "C"]));
    }

    #[test]
    fn failed_factor_is_isolated() {
        let universe = codes(&["A", "B"]);
        let specs = vec![FactorSpec::up("broken"), FactorSpec::up("roe")];
        let report = score_and_select(&universe, &specs, 1, FactorFailurePolicy::Skip, |spec| {
            if spec.name == "broken" {
                Err(FactorTraderError::external("get_factor_values", "timeout"))
            } else {
                Ok(snapshot("roe", &[("A", Some(1.0)), ("B", Some(2.0))]))
            }
        })
        .unwrap();

        assert_eq!(report.candidates, codes(&["B"]));
        assert!(matches!(
            report.factors[0].outcome,
            FactorOutcome::Failed { .. }
        ));
        assert_eq!(report.factors[1].outcome, FactorOutcome::Scored { ranked: 2 });
        assert_eq!(report.scored_factor_count(), 1);
    }

    #[test]
    fn abort_policy_propagates() {
        let universe = codes(&["A"]);
        let specs = vec![FactorSpec::up("broken")];
        let result = score_and_select(&universe, &specs, 1, FactorFailurePolicy::Abort, |_| {
            Err(FactorTraderError::external("get_factor_values", "timeout"))
        });
        assert!(matches!(result, Err(FactorTraderError::ExternalCall { .. })));
    }

    #[test]
    fn all_factors_missing_yields_empty_candidates() {
        let universe = codes(&["A", "B"]);
        let specs = vec![FactorSpec::up("roe")];
        let report = score_and_select(&universe, &specs, 2, FactorFailurePolicy::Skip, |_| {
            Ok(FactorSnapshot::missing("roe", &universe))
        })
        .unwrap();
        assert!(report.candidates.is_empty());
        assert_eq!(report.factors[0].outcome, FactorOutcome::Missing);
    }

    #[test]
    fn fewer_scored_than_top_n() {
        let universe = codes(&["A", "B", "C"]);
        let specs = vec![FactorSpec::up("roe")];
        let report = score_and_select(&universe, &specs, 3, FactorFailurePolicy::Skip, |_| {
            Ok(snapshot("roe", &[("A", Some(1.0)), ("B", None), ("C", None)]))
        })
        .unwrap();
        assert_eq!(report.candidates, codes(&["A"]));
    }

    #[test]
    fn snapshot_codes_outside_universe_are_ignored() {
        let universe = codes(&["A", "B"]);
        let specs = vec![FactorSpec::up("roe")];
        let report = score_and_select(&universe, &specs, 2, FactorFailurePolicy::Skip, |_| {
            Ok(snapshot(
                "roe",
                &[("A", Some(1.0)), ("B", Some(2.0)), ("X", Some(99.0))],
            ))
        })
        .unwrap();
        // n = 2, so B scores 2 and A scores 1
        assert_eq!(report.table.total("B"), Some(2.0));
        assert_eq!(report.candidates, codes(&["B", "A"]));
    }

    #[test]
    fn rejects_invalid_input() {
        let universe = codes(&["A"]);
        let no_fetch = |_: &FactorSpec| -> Result<FactorSnapshot, FactorTraderError> {
            panic!("should not fetch")
        };
        assert!(matches!(
            score_and_select(&universe, &[], 1, FactorFailurePolicy::Skip, no_fetch),
            Err(FactorTraderError::InvalidInput { .. })
        ));
        assert!(matches!(
            score_and_select(&universe, &[FactorSpec::up("roe")], 0, FactorFailurePolicy::Skip, no_fetch),
            Err(FactorTraderError::InvalidInput { .. })
        ));
        assert!(matches!(
            score_and_select(&[], &[FactorSpec::up("roe")], 1, FactorFailurePolicy::Skip, no_fetch),
            Err(FactorTraderError::EmptyUniverse { .. })
        ));
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!(
            "Skip".parse::<FactorFailurePolicy>(),
            Ok(FactorFailurePolicy::Skip)
        );
        assert_eq!(
            "abort".parse::<FactorFailurePolicy>(),
            Ok(FactorFailurePolicy::Abort)
        );
        assert!("retry".parse::<FactorFailurePolicy>().is_err());
    }
}
