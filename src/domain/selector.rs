//! Cross-sectional candidate selection.
//!
//! At each rebalance tick symbols are scored against the same-tick
//! population, narrowed to a momentum pool and screened for a directional
//! breakout. Output order is deterministic: scan order is the symbol order of
//! the loaded data and the final sort is stable.

use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::features::FeatureRow;
use crate::domain::position::Side;
use std::collections::{BTreeMap, HashSet};

/// Population z-scores. A zero standard deviation maps every value to zero.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    if sd == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / sd).collect()
}

/// A symbol's state at the current tick.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub symbol: &'a str,
    pub bar: Bar,
    pub row: FeatureRow,
}

/// A member of the scoring population with its z-scores attached.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub snapshot: Snapshot<'a>,
    pub z1: f64,
    pub z2: f64,
}

impl Scored<'_> {
    pub fn composite(&self) -> f64 {
        self.z1 + self.z2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub side: Side,
    pub score: f64,
}

/// Symbols with both momenta present, z-scored against each other.
pub fn scoring_population<'a>(snapshots: &[Snapshot<'a>]) -> Vec<Scored<'a>> {
    let members: Vec<(Snapshot<'a>, f64, f64)> = snapshots
        .iter()
        .filter_map(|s| match (s.row.mom1, s.row.mom2) {
            (Some(m1), Some(m2)) => Some((*s, m1, m2)),
            _ => None,
        })
        .collect();

    let z1 = zscore(&members.iter().map(|m| m.1).collect::<Vec<_>>());
    let z2 = zscore(&members.iter().map(|m| m.2).collect::<Vec<_>>());

    members
        .into_iter()
        .zip(z1.into_iter().zip(z2))
        .map(|((snapshot, _, _), (z1, z2))| Scored { snapshot, z1, z2 })
        .collect()
}

/// Top `width` symbols of the population by pool momentum.
pub fn build_pool<'a>(population: &[Scored<'a>], width: usize) -> HashSet<&'a str> {
    let mut ranked: Vec<(&'a str, f64)> = population
        .iter()
        .map(|s| (s.snapshot.symbol, s.snapshot.row.pool_score()))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(width).map(|(s, _)| s).collect()
}

/// `ret_L` above `theta` and close at or above the Donchian high.
pub fn long_breakout(row: &FeatureRow, close: f64, theta: f64) -> bool {
    matches!((row.ret_l, row.donchian_high), (Some(r), Some(hi)) if r > theta && close >= hi)
}

/// `ret_L` below `-theta` and close at or below the Donchian low.
pub fn short_breakout(row: &FeatureRow, close: f64, theta: f64) -> bool {
    matches!((row.ret_l, row.donchian_low), (Some(r), Some(lo)) if r < -theta && close <= lo)
}

pub fn breakout(side: Side, row: &FeatureRow, close: f64, theta: f64) -> bool {
    match side {
        Side::Long => long_breakout(row, close, theta),
        Side::Short => short_breakout(row, close, theta),
    }
}

/// Whether the position's side disagrees with the sign of `ret_L`.
/// A missing `ret_L` never counts as a disagreement.
pub fn alignment_lost(side: Side, row: &FeatureRow) -> bool {
    match (side, row.ret_l) {
        (Side::Long, Some(r)) => r < 0.0,
        (Side::Short, Some(r)) => r > 0.0,
        _ => false,
    }
}

/// Market regime read from the reference symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketFilter {
    Off,
    On { ret: Option<f64> },
}

impl MarketFilter {
    /// A weak or unknown regime suppresses every candidate.
    fn blocks_all(&self, theta: f64) -> bool {
        match *self {
            MarketFilter::Off => false,
            MarketFilter::On { ret: None } => true,
            MarketFilter::On { ret: Some(r) } => r.abs() < theta,
        }
    }

    fn allows(&self, side: Side, theta: f64) -> bool {
        match (*self, side) {
            (MarketFilter::Off, _) => true,
            (MarketFilter::On { ret: Some(r) }, Side::Long) => r > theta,
            (MarketFilter::On { ret: Some(r) }, Side::Short) => r < -theta,
            (MarketFilter::On { ret: None }, _) => false,
        }
    }
}

/// Re-entry hold-off counters, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cooldowns {
    counters: BTreeMap<String, usize>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the hold-off to at least `bars`.
    pub fn arm(&mut self, symbol: &str, bars: usize) {
        let counter = self.counters.entry(symbol.to_string()).or_insert(0);
        *counter = (*counter).max(bars);
    }

    /// Removes exhausted counters and decrements the rest.
    pub fn tick(&mut self) {
        self.counters.retain(|_, c| *c > 0);
        for c in self.counters.values_mut() {
            *c -= 1;
        }
    }

    pub fn is_cooling(&self, symbol: &str) -> bool {
        self.counters.get(symbol).is_some_and(|c| *c > 0)
    }

    pub fn remaining(&self, symbol: &str) -> Option<usize> {
        self.counters.get(symbol).copied()
    }
}

fn side_eligible(side: Side, scored: &Scored<'_>, market: MarketFilter, config: &StrategyConfig) -> bool {
    let row = &scored.snapshot.row;
    let allowed = match side {
        Side::Long => config.allow_long,
        Side::Short => config.allow_short,
    };
    if !allowed || !breakout(side, row, scored.snapshot.bar.close, config.theta_ret) {
        return false;
    }
    if config.momentum_gate {
        let gate = match (side, row.mom1, row.mom2) {
            (Side::Long, Some(m1), Some(m2)) => m1 > 0.0 && m2 > 0.0,
            (Side::Short, Some(m1), Some(m2)) => m1 < 0.0 && m2 < 0.0,
            _ => false,
        };
        if !gate {
            return false;
        }
    }
    let score = side.sign() * scored.composite();
    if config.z_score_thresh > 0.0 && score < config.z_score_thresh {
        return false;
    }
    market.allows(side, config.market_theta)
}

/// Ranked candidates for this tick, best score first.
pub fn select_candidates(
    population: &[Scored<'_>],
    pool: &HashSet<&str>,
    cooldowns: &Cooldowns,
    market: MarketFilter,
    config: &StrategyConfig,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if market.blocks_all(config.market_theta) {
        return candidates;
    }

    for scored in population {
        let symbol = scored.snapshot.symbol;
        if !pool.contains(symbol) || cooldowns.is_cooling(symbol) {
            continue;
        }
        if scored.snapshot.row.ret_l.is_none() {
            continue;
        }
        let side = if side_eligible(Side::Long, scored, market, config) {
            Side::Long
        } else if side_eligible(Side::Short, scored, market, config) {
            Side::Short
        } else {
            continue;
        };
        candidates.push(Candidate {
            symbol: symbol.to_string(),
            side,
            score: side.sign() * scored.composite(),
        });
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}
