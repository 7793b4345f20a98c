//! Risk-based position sizing under portfolio and per-symbol exposure caps.
//!
//! Both fresh entries and pyramid adds size from the same risk formula:
//! `risk_amount / (m1_init_sl_atr * ATR)` units, raised toward the
//! minimum-leverage floor and clipped by the headroom left under the
//! leverage cap and the per-symbol cap.

use crate::domain::config::StrategyConfig;
use crate::domain::execution::MIN_DENOMINATOR;

/// Account snapshot at the instant of a sizing decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingContext {
    /// Mark-to-market equity.
    pub equity_now: f64,
    /// Sum of |qty * close| over open positions.
    pub exposure_now: f64,
}

impl SizingContext {
    /// Unused room under `max_actual_leverage * equity_now`, never negative.
    pub fn headroom(&self, config: &StrategyConfig) -> f64 {
        (config.max_actual_leverage * self.equity_now - self.exposure_now).max(0.0)
    }

    pub fn per_symbol_cap(&self, config: &StrategyConfig) -> f64 {
        config.per_symbol_exposure_max * self.equity_now
    }

    fn min_notional(&self, config: &StrategyConfig) -> f64 {
        if config.min_actual_leverage > 0.0 {
            config.min_actual_leverage * self.equity_now
        } else {
            0.0
        }
    }
}

/// Result of a sizing decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub notional: f64,
    pub qty: f64,
}

impl Sizing {
    fn from_notional(notional: f64, close: f64) -> Self {
        Sizing {
            notional,
            qty: notional / close.max(MIN_DENOMINATOR),
        }
    }
}

/// Sizes a fresh entry. `None` means the entry is skipped.
pub fn size_entry(config: &StrategyConfig, ctx: &SizingContext, atr: f64, close: f64) -> Option<Sizing> {
    let risk_amount = ctx.equity_now * config.risk_per_trade;
    if risk_amount <= 0.0 {
        return None;
    }
    let stop_dist = config.m1_init_sl_atr * atr;
    let qty = risk_amount / stop_dist.max(MIN_DENOMINATOR);
    let desired = (qty * close).abs().max(ctx.min_notional(config));

    let allowed = ctx.per_symbol_cap(config).min(ctx.headroom(config));
    if allowed <= 0.0 {
        return None;
    }
    let notional = desired.min(allowed);
    if notional <= 0.0 {
        return None;
    }
    Some(Sizing::from_notional(notional, close))
}

/// Sizes a pyramid add onto a position currently worth `position_notional`
/// (|qty * close|) with `adds_done` adds behind it.
pub fn size_add(
    config: &StrategyConfig,
    ctx: &SizingContext,
    atr: f64,
    close: f64,
    adds_done: usize,
    position_notional: f64,
) -> Option<Sizing> {
    let risk_amount = ctx.equity_now * config.risk_per_trade * config.pyramid_multiplier(adds_done);
    let stop_dist = config.m1_init_sl_atr * atr;
    if risk_amount <= 0.0 || stop_dist <= 0.0 {
        return None;
    }
    let add_notional = (risk_amount / stop_dist * close).abs();
    // The floor only tops up toward the portfolio-wide minimum.
    let desired = add_notional.max(ctx.min_notional(config) - ctx.exposure_now);

    let allowed = ctx
        .headroom(config)
        .min(ctx.per_symbol_cap(config) - position_notional);
    if allowed <= 0.0 {
        return None;
    }
    let notional = desired.min(allowed);
    if notional <= 0.0 {
        return None;
    }
    Some(Sizing::from_notional(notional, close))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roomy_config() -> StrategyConfig {
        StrategyConfig {
            risk_per_trade: 0.01,
            m1_init_sl_atr: 2.0,
            max_actual_leverage: 10.0,
            per_symbol_exposure_max: 10.0,
            ..Default::default()
        }
    }

    fn ctx(equity_now: f64, exposure_now: f64) -> SizingContext {
        SizingContext {
            equity_now,
            exposure_now,
        }
    }

    #[test]
    fn entry_uncapped_is_risk_over_stop_distance() {
        let config = roomy_config();
        // risk 100, stop 2 * 5 = 10 => 10 units at 50
        let s = size_entry(&config, &ctx(10_000.0, 0.0), 5.0, 50.0).unwrap();
        assert!((s.qty - 10.0).abs() < 1e-12);
        assert!((s.notional - 500.0).abs() < 1e-12);
    }

    #[test]
    fn entry_clipped_by_per_symbol_cap() {
        let config = StrategyConfig {
            per_symbol_exposure_max: 0.02,
            ..roomy_config()
        };
        let s = size_entry(&config, &ctx(10_000.0, 0.0), 5.0, 50.0).unwrap();
        assert!((s.notional - 200.0).abs() < 1e-9);
        assert!((s.qty - 4.0).abs() < 1e-9);
    }

    #[test]
    fn entry_clipped_by_leverage_headroom() {
        let config = StrategyConfig {
            max_actual_leverage: 1.0,
            ..roomy_config()
        };
        let s = size_entry(&config, &ctx(10_000.0, 9_800.0), 5.0, 50.0).unwrap();
        assert!((s.notional - 200.0).abs() < 1e-9);
    }

    #[test]
    fn entry_skipped_without_headroom() {
        let config = StrategyConfig {
            max_actual_leverage: 1.0,
            ..roomy_config()
        };
        assert!(size_entry(&config, &ctx(10_000.0, 10_000.0), 5.0, 50.0).is_none());
        assert!(size_entry(&config, &ctx(10_000.0, 12_000.0), 5.0, 50.0).is_none());
    }

    #[test]
    fn entry_skipped_on_zero_risk() {
        let config = StrategyConfig {
            risk_per_trade: 0.0,
            ..roomy_config()
        };
        assert!(size_entry(&config, &ctx(10_000.0, 0.0), 5.0, 50.0).is_none());
        assert!(size_entry(&roomy_config(), &ctx(-5.0, 0.0), 5.0, 50.0).is_none());
    }

    #[test]
    fn entry_raised_to_min_leverage() {
        let config = StrategyConfig {
            min_actual_leverage: 0.5,
            ..roomy_config()
        };
        let s = size_entry(&config, &ctx(10_000.0, 0.0), 5.0, 50.0).unwrap();
        assert!((s.notional - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn add_uses_pyramid_multiplier() {
        let config = StrategyConfig {
            pyramid_risk_multipliers: vec![1.0, 2.0],
            ..roomy_config()
        };
        let first = size_add(&config, &ctx(10_000.0, 0.0), 5.0, 50.0, 0, 0.0).unwrap();
        let second = size_add(&config, &ctx(10_000.0, 0.0), 5.0, 50.0, 1, 0.0).unwrap();
        let later = size_add(&config, &ctx(10_000.0, 0.0), 5.0, 50.0, 7, 0.0).unwrap();
        assert!((first.notional - 500.0).abs() < 1e-9);
        assert!((second.notional - 1_000.0).abs() < 1e-9);
        assert_eq!(second, later);
    }

    #[test]
    fn add_respects_existing_symbol_exposure() {
        let config = StrategyConfig {
            per_symbol_exposure_max: 0.1,
            ..roomy_config()
        };
        let s = size_add(&config, &ctx(10_000.0, 800.0), 5.0, 50.0, 0, 800.0).unwrap();
        assert!((s.notional - 200.0).abs() < 1e-9);
        assert!(size_add(&config, &ctx(10_000.0, 1_000.0), 5.0, 50.0, 0, 1_000.0).is_none());
    }

    #[test]
    fn add_skipped_on_zero_atr() {
        assert!(size_add(&roomy_config(), &ctx(10_000.0, 0.0), 0.0, 50.0, 0, 0.0).is_none());
    }

    #[test]
    fn headroom_never_negative() {
        let config = StrategyConfig {
            max_actual_leverage: 1.0,
            ..Default::default()
        };
        assert_eq!(ctx(1_000.0, 5_000.0).headroom(&config), 0.0);
    }
}
