//! Per-step stop management for open positions.
//!
//! A position carries a single ratcheting stop line (`trail_stop`). Three
//! rules may tighten it each step; none may loosen it.

use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::position::{ExitReason, Position};

/// Tracks the favorable extreme and ratchets the stop line.
///
/// With `atr <= 0` only the favorable extreme is tracked; the trail,
/// breakeven and lock rules are skipped for this step.
pub fn update_stops(position: &mut Position, bar: &Bar, atr: f64, config: &StrategyConfig) {
    position.update_max_favorable(bar);
    if atr <= 0.0 {
        return;
    }
    let sign = position.side.sign();

    let trail = position.max_fav_price - sign * config.m2_trail_sl_atr * atr;
    position.ratchet_stop(trail);

    if position.adds_done >= config.be_after_adds
        && position.favorable_move(bar.close) >= config.be_rr * position.atr_mult * atr
    {
        position.ratchet_stop(position.entry_price);
    }

    if position.adds_done >= config.lock_after_adds && position.last_add_price != 0.0 {
        let lock = position.last_add_price - sign * config.lock_atr_mult * atr;
        position.ratchet_stop(lock);
    }
}

/// Stop breach first, then the holding-time limit.
pub fn check_exit(position: &Position, bar: &Bar, config: &StrategyConfig) -> Option<ExitReason> {
    if position.stop_breached(bar) {
        Some(ExitReason::TrailStop)
    } else if position.bars_since_entry >= config.time_stop_bars {
        Some(ExitReason::TimeStop)
    } else {
        None
    }
}
