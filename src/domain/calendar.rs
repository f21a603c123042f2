//! Trading calendar helpers.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

/// Sorted, de-duplicated union of every date in `series`.
pub fn build_unified_timeline<I, S>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = NaiveDate>,
{
    let unique_dates: BTreeSet<NaiveDate> = series.into_iter().flatten().collect();
    unique_dates.into_iter().collect()
}

/// 1-based position of `date` among the trading dates of its month, if it is one.
pub fn trading_day_of_month(timeline: &[NaiveDate], date: NaiveDate) -> Option<u32> {
    let idx = timeline.binary_search(&date).ok()?;
    let same_month = |d: &NaiveDate| d.year() == date.year() && d.month() == date.month();
    let first = timeline[..idx]
        .iter()
        .rposition(|d| !same_month(d))
        .map_or(0, |p| p + 1);
    Some((idx - first + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn unified_timeline_merges_and_sorts() {
        let a = vec![d(2024, 1, 2), d(2024, 1, 5)];
        let b = vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)];
        let timeline = build_unified_timeline([a, b]);
        assert_eq!(
            timeline,
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 5)]
        );
    }

    #[test]
    fn unified_timeline_empty() {
        let timeline = build_unified_timeline(Vec::<Vec<NaiveDate>>::new());
        assert!(timeline.is_empty());
    }

    #[test]
    fn trading_day_counts_within_month() {
        let timeline = vec![
            d(2024, 1, 30),
            d(2024, 1, 31),
            d(2024, 2, 1),
            d(2024, 2, 2),
            d(2024, 2, 5),
            d(2024, 2, 6),
        ];
        assert_eq!(trading_day_of_month(&timeline, d(2024, 1, 31)), Some(2));
        assert_eq!(trading_day_of_month(&timeline, d(2024, 2, 1)), Some(1));
        assert_eq!(trading_day_of_month(&timeline, d(2024, 2, 5)), Some(3));
        assert_eq!(trading_day_of_month(&timeline, d(2024, 2, 3)), None);
    }
}
