//! SymbolData struct and the global timestamp axis.

use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::features::{FeatureRow, FeatureSet};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub features: FeatureSet,
}

impl SymbolData {
    /// Builds the symbol's feature arrays. `bars` must be ascending with
    /// unique timestamps.
    pub fn new(symbol: String, bars: Vec<Bar>, config: &StrategyConfig) -> Self {
        let features = FeatureSet::compute(&bars, config);
        Self {
            symbol,
            bars,
            features,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Sorted, deduplicated union of every symbol's timestamps.
pub fn build_global_timeline(symbols: &[SymbolData]) -> Vec<i64> {
    let unique: BTreeSet<i64> = symbols
        .iter()
        .flat_map(|sd| sd.bars.iter().map(|bar| bar.ts))
        .collect();
    unique.into_iter().collect()
}

/// Sorts bars by timestamp and keeps the last bar seen for a duplicated
/// timestamp.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.ts);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.ts == bar.ts => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// All symbols of a run with a cursor onto each one's latest bar.
///
/// A cursor only moves forward. A symbol without a bar at the current
/// global timestamp keeps its previous bar.
#[derive(Debug, Clone)]
pub struct Universe {
    symbols: Vec<SymbolData>,
    index: HashMap<String, usize>,
    cursors: Vec<Option<usize>>,
}

impl Universe {
    pub fn new(symbols: Vec<SymbolData>) -> Self {
        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, sd)| (sd.symbol.clone(), i))
            .collect();
        let cursors = vec![None; symbols.len()];
        Self {
            symbols,
            index,
            cursors,
        }
    }

    pub fn symbols(&self) -> &[SymbolData] {
        &self.symbols
    }

    pub fn position_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// Moves every cursor to the last bar with `bar.ts <= ts`.
    pub fn advance(&mut self, ts: i64) {
        for (sd, cursor) in self.symbols.iter().zip(self.cursors.iter_mut()) {
            let mut next = cursor.map_or(0, |i| i + 1);
            while next < sd.bars.len() && sd.bars[next].ts <= ts {
                *cursor = Some(next);
                next += 1;
            }
        }
    }

    /// Index of the symbol's current bar, if it has one yet.
    pub fn cursor(&self, idx: usize) -> Option<usize> {
        self.cursors.get(idx).copied().flatten()
    }

    pub fn current(&self, idx: usize) -> Option<(Bar, FeatureRow)> {
        let i = self.cursor(idx)?;
        let sd = &self.symbols[idx];
        Some((sd.bars[i], sd.features.row(i)))
    }

    pub fn current_of(&self, symbol: &str) -> Option<(Bar, FeatureRow)> {
        self.current(self.position_of(symbol)?)
    }

    pub fn close_of(&self, symbol: &str) -> Option<f64> {
        self.current_of(symbol).map(|(bar, _)| bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(ts: i64, close: f64) -> Bar {
        Bar {
            ts,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn symbol_data_computes_features() {
        let bars = vec![make_bar(1, 100.0), make_bar(2, 101.0), make_bar(3, 102.0)];
        let sd = SymbolData::new("BTC".into(), bars, &StrategyConfig::default());
        assert_eq!(sd.bar_count(), 3);
        assert_eq!(sd.features.atr.len(), 3);
        assert_eq!(sd.closes(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn global_timeline_merges_and_sorts() {
        let config = StrategyConfig::default();
        let a = SymbolData::new("A".into(), vec![make_bar(2, 100.0), make_bar(5, 101.0)], &config);
        let b = SymbolData::new("B".into(), vec![make_bar(1, 50.0), make_bar(2, 51.0), make_bar(3, 52.0)], &config);

        let timeline = build_global_timeline(&[a, b]);
        assert_eq!(timeline, vec![1, 2, 3, 5]);
    }

    #[test]
    fn global_timeline_empty() {
        assert!(build_global_timeline(&[]).is_empty());
    }

    #[test]
    fn normalize_sorts_and_dedupes_keeping_last() {
        let bars = vec![make_bar(3, 3.0), make_bar(1, 1.0), make_bar(3, 33.0), make_bar(2, 2.0)];
        let out = normalize_bars(bars);
        let ts: Vec<i64> = out.iter().map(|b| b.ts).collect();
        assert_eq!(ts, vec![1, 2, 3]);
        assert_eq!(out[2].close, 33.0);
    }

    #[test]
    fn universe_cursor_holds_through_gaps() {
        let config = StrategyConfig::default();
        let a = SymbolData::new("A".into(), vec![make_bar(1, 10.0), make_bar(3, 30.0)], &config);
        let b = SymbolData::new("B".into(), vec![make_bar(2, 20.0), make_bar(3, 21.0)], &config);
        let mut universe = Universe::new(vec![a, b]);

        universe.advance(1);
        assert_eq!(universe.close_of("A"), Some(10.0));
        assert_eq!(universe.close_of("B"), None);

        universe.advance(2);
        assert_eq!(universe.close_of("A"), Some(10.0));
        assert_eq!(universe.close_of("B"), Some(20.0));
        assert_eq!(universe.cursor(0), Some(0));

        universe.advance(3);
        assert_eq!(universe.close_of("A"), Some(30.0));
        assert_eq!(universe.close_of("B"), Some(21.0));
        assert_eq!(universe.close_of("C"), None);
    }

    #[test]
    fn universe_advance_skips_to_latest_bar() {
        let config = StrategyConfig::default();
        let a = SymbolData::new(
            "A".into(),
            vec![make_bar(1, 1.0), make_bar(2, 2.0), make_bar(5, 5.0)],
            &config,
        );
        let mut universe = Universe::new(vec![a]);
        universe.advance(4);
        assert_eq!(universe.cursor(0), Some(1));
        let (bar, _) = universe.current_of("A").unwrap();
        assert_eq!(bar.ts, 2);
    }
}
