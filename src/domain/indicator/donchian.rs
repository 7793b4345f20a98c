//! Donchian channel over closing prices, current bar included.
//!
//! Warmup: first (n-1) values are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

/// Returns `(high, low)` channel series.
pub fn calculate_donchian(values: &[f64], period: usize) -> (IndicatorSeries, IndicatorSeries) {
    if period == 0 {
        return (
            IndicatorSeries::empty(IndicatorType::DonchianHigh(period), values.len()),
            IndicatorSeries::empty(IndicatorType::DonchianLow(period), values.len()),
        );
    }

    let mut highs = Vec::with_capacity(values.len());
    let mut lows = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            highs.push(None);
            lows.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        highs.push(Some(window.iter().copied().fold(f64::NEG_INFINITY, f64::max)));
        lows.push(Some(window.iter().copied().fold(f64::INFINITY, f64::min)));
    }

    (
        IndicatorSeries::new(IndicatorType::DonchianHigh(period), highs),
        IndicatorSeries::new(IndicatorType::DonchianLow(period), lows),
    )
}
