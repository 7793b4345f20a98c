//! Technical indicator implementations.
//!
//! Every indicator produces an [`IndicatorSeries`] aligned one-to-one with
//! its input: index `i` of the series belongs to bar `i`. Values that need a
//! full window which is not yet available are `None`, never zero.

pub mod atr;
pub mod donchian;
pub mod ema;
pub mod roc;
pub mod sma;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Atr(usize),
    DonchianHigh(usize),
    DonchianLow(usize),
    Return(usize),
    /// close / SMA(n) - 1
    SmaMomentum(usize),
    /// EMA(fast) / EMA(slow) - 1
    EmaMomentum { fast: usize, slow: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType, values: Vec<Option<f64>>) -> Self {
        Self {
            indicator_type,
            values,
        }
    }

    /// Series of the given length with no valid values.
    pub fn empty(indicator_type: IndicatorType, len: usize) -> Self {
        Self::new(indicator_type, vec![None; len])
    }

    /// Value at bar `i`; `None` during warm-up or past the end.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the first valid value, if any.
    #[cfg(test)]
    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }
}

/// `num / den - 1`, or `None` when either side is missing or `den == 0`.
pub fn ratio_minus_one(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d - 1.0),
        _ => None,
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::DonchianHigh(period) => write!(f, "DONCHIAN_HIGH({})", period),
            IndicatorType::DonchianLow(period) => write!(f, "DONCHIAN_LOW({})", period),
            IndicatorType::Return(period) => write!(f, "RET({})", period),
            IndicatorType::SmaMomentum(period) => write!(f, "MOM_SMA({})", period),
            IndicatorType::EmaMomentum { fast, slow } => write!(f, "MOM_EMA({},{})", fast, slow),
        }
    }
}
