//! Open positions and closed trades.

use crate::domain::bar::Bar;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TrailStop,
    AlignmentLost,
    TimeStop,
    Eod,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TrailStop => "trail_stop",
            ExitReason::AlignmentLost => "alignment_lost",
            ExitReason::TimeStop => "time_stop",
            ExitReason::Eod => "eod",
        }
    }

    /// Exits raised by the per-step stop checks.
    pub fn is_stop(self) -> bool {
        matches!(self, ExitReason::TrailStop | ExitReason::TimeStop)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_ts: i64,
    /// Quantity-weighted average fill across the entry and every add.
    pub entry_price: f64,
    pub qty: f64,
    pub init_stop: f64,
    pub trail_stop: f64,
    pub atr_mult: f64,
    pub max_fav_price: f64,
    pub adds_done: usize,
    pub last_add_price: f64,
    pub acc_entry_notional: f64,
    pub exposure_notional: f64,
    pub exposure_frac: f64,
    pub equity_entry: f64,
    pub init_stop_dist: f64,
    pub bars_since_entry: usize,
}

impl Position {
    /// Absolute notional at `price`.
    pub fn notional(&self, price: f64) -> f64 {
        (self.qty * price).abs()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * self.qty * (price - self.entry_price)
    }

    /// Favorable close move since entry, in price units.
    pub fn favorable_move(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price)
    }

    /// Tracks the best high (long) or low (short) seen since entry.
    pub fn update_max_favorable(&mut self, bar: &Bar) {
        self.max_fav_price = match self.side {
            Side::Long => self.max_fav_price.max(bar.high),
            Side::Short => self.max_fav_price.min(bar.low),
        };
    }

    /// Moves the stop toward `level` only if that tightens it.
    pub fn ratchet_stop(&mut self, level: f64) {
        self.trail_stop = match self.side {
            Side::Long => self.trail_stop.max(level),
            Side::Short => self.trail_stop.min(level),
        };
    }

    /// Intrabar stop breach.
    pub fn stop_breached(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.low <= self.trail_stop,
            Side::Short => bar.high >= self.trail_stop,
        }
    }
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub entry_ts: i64,
    pub entry_price: f64,
    pub exit_ts: i64,
    pub exit_price: f64,
    pub qty: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub fees: f64,
    pub reason: ExitReason,
    pub equity_entry: f64,
    pub exposure_notional: f64,
    pub exposure_frac: f64,
    pub adds_done: usize,
}

impl Trade {
    /// Holding time in fractional days.
    pub fn holding_days(&self) -> f64 {
        ((self.exit_ts - self.entry_ts) as f64 / 86_400_000.0).max(0.0)
    }
}
