//! Average True Range.
//!
//! ATR(n) = EMA(TrueRange, n). The first bar's true range is its high-low
//! span since there is no previous close.

use crate::domain::bar::Bar;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn true_range_series(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut prev_close: Option<f64> = None;
    bars.iter()
        .map(|bar| {
            let tr = bar.true_range(prev_close);
            prev_close = Some(bar.close);
            Some(tr)
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let tr = true_range_series(bars);
    let ema = calculate_ema(&tr, period);
    IndicatorSeries::new(IndicatorType::Atr(period), ema.values)
}
