//! Fill simulation and trade accounting.
//!
//! Every fill is shifted against the trader by `slippage_bps`. Fees are
//! charged once, at exit, on accumulated entry notional plus exit notional.
//! Only realized pnl ever touches cash.

use crate::domain::bar::Bar;
use crate::domain::config::{RoiMode, StrategyConfig};
use crate::domain::portfolio::Portfolio;
use crate::domain::position::{ExitReason, Position, Side, Trade};

/// Floor for denominators that must not reach zero.
pub const MIN_DENOMINATOR: f64 = 1e-9;

/// Price offset for `bps` basis points.
pub fn slippage_amount(price: f64, slippage_bps: f64) -> f64 {
    price * (slippage_bps / 10_000.0)
}

/// Long entry (buy): close + slip
pub fn apply_slippage_long_entry(market_price: f64, slippage_bps: f64) -> f64 {
    market_price + slippage_amount(market_price, slippage_bps)
}

/// Short entry (sell short): close - slip
pub fn apply_slippage_short_entry(market_price: f64, slippage_bps: f64) -> f64 {
    market_price - slippage_amount(market_price, slippage_bps)
}

/// Long exit (sell): close - slip
pub fn apply_slippage_long_exit(market_price: f64, slippage_bps: f64) -> f64 {
    market_price - slippage_amount(market_price, slippage_bps)
}

/// Short exit (buy to cover): close + slip
pub fn apply_slippage_short_exit(market_price: f64, slippage_bps: f64) -> f64 {
    market_price + slippage_amount(market_price, slippage_bps)
}

/// Fill price for opening or adding to a position.
pub fn entry_fill(side: Side, market_price: f64, slippage_bps: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_long_entry(market_price, slippage_bps),
        Side::Short => apply_slippage_short_entry(market_price, slippage_bps),
    }
}

/// Fill price for closing a position.
pub fn exit_fill(side: Side, market_price: f64, slippage_bps: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_long_exit(market_price, slippage_bps),
        Side::Short => apply_slippage_short_exit(market_price, slippage_bps),
    }
}

pub fn calculate_fees(entry_notional: f64, exit_notional: f64, fee_rate: f64) -> f64 {
    fee_rate * (entry_notional + exit_notional)
}

/// Builds a fresh position filled at `bar.close` shifted by slippage.
///
/// `stop_dist` is `m1_init_sl_atr * ATR`; `equity_now` is the
/// mark-to-market equity the size was computed from.
pub fn open_position(
    symbol: &str,
    side: Side,
    bar: &Bar,
    qty: f64,
    stop_dist: f64,
    equity_now: f64,
    config: &StrategyConfig,
) -> Position {
    let entry_price = entry_fill(side, bar.close, config.slippage_bps);
    let init_stop = entry_price - side.sign() * stop_dist;
    let max_fav_price = match side {
        Side::Long => bar.high,
        Side::Short => bar.low,
    };
    let exposure_notional = (qty * entry_price).abs();

    Position {
        symbol: symbol.to_string(),
        side,
        entry_ts: bar.ts,
        entry_price,
        qty,
        init_stop,
        trail_stop: init_stop,
        atr_mult: config.m1_init_sl_atr,
        max_fav_price,
        adds_done: 0,
        last_add_price: entry_price,
        acc_entry_notional: exposure_notional,
        exposure_notional,
        exposure_frac: exposure_notional / equity_now.max(MIN_DENOMINATOR),
        equity_entry: equity_now,
        init_stop_dist: stop_dist,
        bars_since_entry: 0,
    }
}

/// Pyramids `add_qty` into the position at `close` shifted by slippage.
///
/// Returns false (and leaves the position unchanged) when the resulting
/// quantity would not be positive.
pub fn apply_add(
    position: &mut Position,
    add_qty: f64,
    close: f64,
    equity_now: f64,
    config: &StrategyConfig,
) -> bool {
    let add_price = entry_fill(position.side, close, config.slippage_bps);
    let new_qty = position.qty + add_qty;
    if new_qty <= 0.0 {
        return false;
    }

    position.entry_price = (position.entry_price * position.qty + add_price * add_qty) / new_qty;
    position.qty = new_qty;
    position.exposure_notional = (position.qty * add_price).abs();
    position.exposure_frac = position.exposure_notional / equity_now.max(MIN_DENOMINATOR);
    position.adds_done += 1;
    position.last_add_price = add_price;
    position.acc_entry_notional += (add_qty * add_price).abs();
    true
}

/// Return figure reported on the trade; pure reporting transform.
pub fn report_pnl_pct(pnl: f64, entry_notional: f64, equity_entry: f64, config: &StrategyConfig) -> f64 {
    let base = pnl / entry_notional.max(MIN_DENOMINATOR);
    match config.roi_mode {
        RoiMode::Notional => base,
        RoiMode::Margin => base * config.report_leverage,
        RoiMode::Equity => pnl / equity_entry.max(MIN_DENOMINATOR),
    }
}

/// Consumes a position and settles it at `bar.close` shifted by slippage.
pub fn close_position(position: Position, bar: &Bar, reason: ExitReason, config: &StrategyConfig) -> Trade {
    let exit_price = exit_fill(position.side, bar.close, config.slippage_bps);
    let gross = position.side.sign() * position.qty * (exit_price - position.entry_price);

    let entry_notional = if position.acc_entry_notional != 0.0 {
        position.acc_entry_notional
    } else {
        (position.qty * position.entry_price).abs()
    };
    let exit_notional = (position.qty * exit_price).abs();
    let fees = calculate_fees(entry_notional, exit_notional, config.fee_rate);
    let pnl = gross - fees;

    Trade {
        pnl_pct: report_pnl_pct(pnl, entry_notional, position.equity_entry, config),
        symbol: position.symbol,
        side: position.side,
        entry_ts: position.entry_ts,
        entry_price: position.entry_price,
        exit_ts: bar.ts,
        exit_price,
        qty: position.qty,
        pnl,
        fees,
        reason,
        equity_entry: position.equity_entry,
        exposure_notional: position.exposure_notional,
        exposure_frac: position.exposure_frac,
        adds_done: position.adds_done,
    }
}

/// Exits the symbol's position, books realized pnl into cash and records
/// the trade. Returns the realized pnl, or `None` if nothing was open.
pub fn exit_position(
    portfolio: &mut Portfolio,
    symbol: &str,
    bar: &Bar,
    reason: ExitReason,
    config: &StrategyConfig,
) -> Option<f64> {
    let position = portfolio.remove_position(symbol)?;
    let trade = close_position(position, bar, reason, config);
    let pnl = trade.pnl;
    portfolio.cash += pnl;
    portfolio.record_trade(trade);
    Some(pnl)
}
