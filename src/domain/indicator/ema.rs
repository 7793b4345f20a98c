//! Exponential Moving Average.
//!
//! k = 2/(n+1). The first valid sample seeds the average directly (no SMA
//! seed), then EMA[i] = X[i]*k + EMA[i-1]*(1-k). A missing sample produces a
//! missing output and leaves the running average untouched.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_ema(values: &[Option<f64>], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Ema(period), values.len());
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;
    let mut out = Vec::with_capacity(values.len());

    for &x in values {
        let Some(x) = x else {
            out.push(None);
            continue;
        };
        let ema = match prev {
            None => x,
            Some(p) => x * k + p * (1.0 - k),
        };
        prev = Some(ema);
        out.push(Some(ema));
    }

    IndicatorSeries::new(IndicatorType::Ema(period), out)
}

/// EMA over a dense series (every sample present).
pub fn calculate_ema_dense(values: &[f64], period: usize) -> IndicatorSeries {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    calculate_ema(&wrapped, period)
}
