//! Windowed return (rate of change as a fraction).
//!
//! RET(n)[i] = C[i] / C[i-n] - 1
//! Invalid for the first n bars and wherever C[i-n] == 0.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_return(values: &[f64], period: usize) -> IndicatorSeries {
    let out = (0..values.len())
        .map(|i| {
            let j = i.checked_sub(period)?;
            let base = values[j];
            if base == 0.0 {
                None
            } else {
                Some(values[i] / base - 1.0)
            }
        })
        .collect();

    IndicatorSeries::new(IndicatorType::Return(period), out)
}
