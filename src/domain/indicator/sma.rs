//! Simple Moving Average.
//!
//! O(n) sliding window sum.
//! SMA(n)[i] = (P[i-n+1] + ... + P[i]) / n
//! Warmup: first (n-1) points are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries};

pub fn calculate_sma(prices: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || prices.is_empty() {
        return IndicatorSeries {
            period,
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(prices.len());
    let mut window_sum: f64 = 0.0;

    for (i, &price) in prices.iter().enumerate() {
        window_sum += price;
        if i >= period {
            window_sum -= prices[i - period];
        }

        let valid = i + 1 >= period;
        let sma = if valid { window_sum / period as f64 } else { 0.0 };

        values.push(IndicatorPoint { valid, value: sma });
    }

    IndicatorSeries { period, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_warmup() {
        let series = calculate_sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn sma_sliding_window() {
        let series = calculate_sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert_relative_eq!(series.values[2].value, 20.0);
        assert_relative_eq!(series.values[3].value, 30.0);
        assert_relative_eq!(series.values[4].value, 40.0);
    }

    #[test]
    fn sma_period_1_is_price() {
        let series = calculate_sma(&[3.0, 7.0], 1);
        assert!(series.values.iter().all(|p| p.valid));
        assert_relative_eq!(series.values[1].value, 7.0);
    }

    #[test]
    fn sma_period_longer_than_input() {
        let series = calculate_sma(&[1.0, 2.0], 5);
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest(), None);
    }

    #[test]
    fn sma_empty_and_zero_period() {
        assert!(calculate_sma(&[], 3).is_empty());
        assert!(calculate_sma(&[1.0, 2.0], 0).is_empty());
    }
}
