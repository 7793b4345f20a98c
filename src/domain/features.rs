//! Per-symbol feature arrays.
//!
//! All series are aligned with the symbol's own bar sequence and computed
//! once before simulation starts.

use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::donchian::calculate_donchian;
use crate::domain::indicator::ema::calculate_ema_dense;
use crate::domain::indicator::roc::calculate_return;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, ratio_minus_one};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub ret_l: IndicatorSeries,
    pub sma: IndicatorSeries,
    pub ema_fast: IndicatorSeries,
    pub ema_slow: IndicatorSeries,
    /// close / SMA - 1
    pub mom1: IndicatorSeries,
    /// EMA_fast / EMA_slow - 1
    pub mom2: IndicatorSeries,
    pub donchian_high: IndicatorSeries,
    pub donchian_low: IndicatorSeries,
    pub atr: IndicatorSeries,
    pub mom_l1: IndicatorSeries,
    pub mom_l2: IndicatorSeries,
}

/// Snapshot of the features a selection or stop decision reads at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub ret_l: Option<f64>,
    pub mom1: Option<f64>,
    pub mom2: Option<f64>,
    pub donchian_high: Option<f64>,
    pub donchian_low: Option<f64>,
    pub atr: Option<f64>,
    pub mom_l1: Option<f64>,
    pub mom_l2: Option<f64>,
}

impl FeatureRow {
    /// ATR with a missing value read as zero, which disables ATR-driven logic.
    pub fn atr_or_zero(&self) -> f64 {
        self.atr.unwrap_or(0.0)
    }

    /// Pool ranking score; missing momenta contribute nothing.
    pub fn pool_score(&self) -> f64 {
        self.mom_l1.unwrap_or(0.0) + self.mom_l2.unwrap_or(0.0)
    }
}

impl FeatureSet {
    pub fn compute(bars: &[Bar], config: &StrategyConfig) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let sma = calculate_sma(&closes, config.lookback_sma);
        let ema_fast = calculate_ema_dense(&closes, config.ema_fast);
        let ema_slow = calculate_ema_dense(&closes, config.ema_slow);

        let mom1 = IndicatorSeries::new(
            IndicatorType::SmaMomentum(config.lookback_sma),
            closes
                .iter()
                .zip(&sma.values)
                .map(|(&c, &s)| ratio_minus_one(Some(c), s))
                .collect(),
        );
        let mom2 = IndicatorSeries::new(
            IndicatorType::EmaMomentum {
                fast: config.ema_fast,
                slow: config.ema_slow,
            },
            ema_fast
                .values
                .iter()
                .zip(&ema_slow.values)
                .map(|(&f, &s)| ratio_minus_one(f, s))
                .collect(),
        );

        let (donchian_high, donchian_low) = calculate_donchian(&closes, config.donchian_n);

        FeatureSet {
            ret_l: calculate_return(&closes, config.l_ret),
            sma,
            ema_fast,
            ema_slow,
            mom1,
            mom2,
            donchian_high,
            donchian_low,
            atr: calculate_atr(bars, config.atr_n),
            mom_l1: calculate_return(&closes, config.pool_mom_l1.max(1)),
            mom_l2: calculate_return(&closes, config.pool_mom_l2.max(1)),
        }
    }

    pub fn row(&self, i: usize) -> FeatureRow {
        FeatureRow {
            ret_l: self.ret_l.get(i),
            mom1: self.mom1.get(i),
            mom2: self.mom2.get(i),
            donchian_high: self.donchian_high.get(i),
            donchian_low: self.donchian_low.get(i),
            atr: self.atr.get(i),
            mom_l1: self.mom_l1.get(i),
            mom_l2: self.mom_l2.get(i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                ts: i as i64 * 60_000,
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn small_config() -> StrategyConfig {
        StrategyConfig {
            l_ret: 3,
            lookback_sma: 4,
            ema_fast: 2,
            ema_slow: 4,
            donchian_n: 3,
            atr_n: 3,
            pool_mom_l1: 2,
            pool_mom_l2: 5,
            ..Default::default()
        }
    }

    #[test]
    fn arrays_are_aligned() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let f = FeatureSet::compute(&bars, &small_config());
        for s in [
            &f.ret_l, &f.sma, &f.mom1, &f.mom2, &f.donchian_high, &f.donchian_low, &f.atr,
            &f.mom_l1, &f.mom_l2,
        ] {
            assert_eq!(s.len(), bars.len());
        }
    }

    #[test]
    fn warmup_nulls() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let f = FeatureSet::compute(&bars, &small_config());
        assert_eq!(f.ret_l.first_valid(), Some(3));
        assert_eq!(f.mom1.first_valid(), Some(3));
        assert_eq!(f.mom2.first_valid(), Some(0));
        assert_eq!(f.donchian_high.first_valid(), Some(2));
        assert_eq!(f.mom_l2.first_valid(), Some(5));
    }

    #[test]
    fn mom1_matches_definition() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0]);
        let f = FeatureSet::compute(&bars, &small_config());
        let sma = (10.0 + 11.0 + 12.0 + 13.0) / 4.0;
        assert!((f.mom1.get(3).unwrap() - (13.0 / sma - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn mom2_zero_on_flat_series() {
        let bars = make_bars(&[50.0; 8]);
        let f = FeatureSet::compute(&bars, &small_config());
        assert_eq!(f.mom2.get(7), Some(0.0));
        assert_eq!(f.ret_l.get(7), Some(0.0));
    }

    #[test]
    fn pool_window_zero_treated_as_one() {
        let bars = make_bars(&[10.0, 20.0]);
        let config = StrategyConfig {
            pool_mom_l1: 0,
            ..small_config()
        };
        let f = FeatureSet::compute(&bars, &config);
        assert!((f.mom_l1.get(1).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn row_pool_score_treats_missing_as_zero() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let f = FeatureSet::compute(&bars, &small_config());
        let row = f.row(2);
        assert_eq!(row.mom_l2, None);
        assert!((row.pool_score() - (12.0 / 10.0 - 1.0)).abs() < 1e-12);
    }
}
