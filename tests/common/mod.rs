#![allow(dead_code)]

use crosstrend::domain::bar::Bar;
use crosstrend::domain::config::StrategyConfig;
use crosstrend::domain::error::CrosstrendError;
use crosstrend::ports::data_port::DataPort;
use std::collections::HashMap;

pub const HOUR_MS: i64 = 3_600_000;

/// 2024-01-01T00:00:00Z
pub const START_MS: i64 = 1_704_067_200_000;

pub fn ts(i: usize) -> i64 {
    START_MS + i as i64 * HOUR_MS
}

/// Bar with a one-unit range centred on `close`.
pub fn make_bar(i: usize, close: f64) -> Bar {
    Bar {
        ts: ts(i),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1.0,
    }
}

pub fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
    (0..n).map(|i| make_bar(i, price)).collect()
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(i, close))
        .collect()
}

/// `warmup` flat bars at `base`, then `trend` bars rising by `step` each.
pub fn flat_then_uptrend(warmup: usize, trend: usize, base: f64, step: f64) -> Vec<Bar> {
    (0..warmup + trend)
        .map(|i| {
            let close = if i < warmup {
                base
            } else {
                base + step * (i - warmup + 1) as f64
            };
            make_bar(i, close)
        })
        .collect()
}

/// Deterministic pseudo-random noise in `[base - amp, base + amp)`.
pub fn noise_bars(n: usize, base: f64, amp: f64, seed: u64) -> Vec<Bar> {
    let mut state = seed;
    (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            make_bar(i, base + amp * (2.0 * u - 1.0))
        })
        .collect()
}

/// Default parameters with pyramiding and trading costs switched off.
pub fn frictionless_config() -> StrategyConfig {
    StrategyConfig {
        pyramid_max_adds: 0,
        fee_rate: 0.0,
        slippage_bps: 0.0,
        ..Default::default()
    }
}

/// In-memory bar source.
pub struct MockBarSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockBarSource {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, CrosstrendError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CrosstrendError::DataLoad {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(CrosstrendError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, CrosstrendError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Writes bars in the CSV layout read by `CsvAdapter`.
pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.ts, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    out
}
