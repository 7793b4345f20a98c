//! Portfolio state and equity tracking.
//!
//! Positions are kept in insertion order; every per-step pass over the book
//! walks them in that order so repeated runs produce identical results.

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub ts: i64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    /// Starting equity plus realized pnl. Entries and adds never debit it.
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: Vec<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Appends a position; an existing one for the same symbol is replaced in place.
    pub fn add_position(&mut self, position: Position) {
        match self.positions.iter_mut().find(|p| p.symbol == position.symbol) {
            Some(existing) => *existing = position,
            None => self.positions.push(position),
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    pub fn get_position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.iter_mut().find(|p| p.symbol == symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.get_position(symbol).is_some()
    }

    /// Removes and returns the position, keeping the order of the rest.
    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        let idx = self.positions.iter().position(|p| p.symbol == symbol)?;
        Some(self.positions.remove(idx))
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Symbols of open positions in book order.
    pub fn open_symbols(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.symbol.clone()).collect()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, ts: i64, equity: f64) {
        self.equity_curve.push(EquityPoint { ts, equity });
    }

    /// cash + unrealized pnl. Positions without a price are skipped.
    pub fn mark_to_market<F>(&self, close_of: F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        let unrealized: f64 = self
            .positions
            .iter()
            .filter_map(|pos| close_of(&pos.symbol).map(|price| pos.unrealized_pnl(price)))
            .sum();
        self.cash + unrealized
    }

    /// Sum of |qty * close| over open positions.
    pub fn gross_exposure<F>(&self, close_of: F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.positions
            .iter()
            .filter_map(|pos| close_of(&pos.symbol).map(|price| pos.notional(price)))
            .sum()
    }
}
