//! Simple Moving Average.
//!
//! SMA(n)[i] = sum(C[i-n+1..=i]) / n
//! Warmup: first (n-1) values are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_sma(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Sma(period), values.len());
    }

    let out = (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect();

    IndicatorSeries::new(IndicatorType::Sma(period), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup() {
        let series = calculate_sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), None);
        assert!((series.get(2).unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((series.get(3).unwrap() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_period_1_is_identity() {
        let series = calculate_sma(&[5.0, 7.0], 1);
        assert_eq!(series.values, vec![Some(5.0), Some(7.0)]);
    }

    #[test]
    fn sma_period_longer_than_data() {
        let series = calculate_sma(&[1.0, 2.0], 5);
        assert_eq!(series.len(), 2);
        assert!(series.first_valid().is_none());
    }

    #[test]
    fn sma_period_0() {
        let series = calculate_sma(&[1.0, 2.0], 0);
        assert_eq!(series.values, vec![None, None]);
    }
}
