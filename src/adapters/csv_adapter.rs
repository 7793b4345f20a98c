//! CSV file bar source.
//!
//! One file per symbol, `<base_path>/<symbol>.csv`, with a header row. The
//! timestamp column is the first of `timestamp`, `time`, `ts`, `date`; price
//! columns are looked up by name.

use crate::domain::bar::Bar;
use crate::domain::error::CrosstrendError;
use crate::domain::symbol_data::normalize_bars;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "time", "ts", "date"];

/// Epoch values above this are milliseconds, otherwise seconds.
const EPOCH_MS_THRESHOLD: f64 = 10_000_000_000.0;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Parses an epoch number or a calendar timestamp into epoch milliseconds.
/// Timestamps without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }

    if let Ok(iv) = v.parse::<i64>() {
        if iv as f64 > EPOCH_MS_THRESHOLD {
            return Some(iv);
        }
        let ms = iv.checked_mul(1000);
        if ms.is_none() {
            warn!(value = iv, "epoch seconds out of range");
        }
        return ms;
    }
    if let Ok(fv) = v.parse::<f64>() {
        if !fv.is_finite() {
            return None;
        }
        return Some(if fv > EPOCH_MS_THRESHOLD {
            fv as i64
        } else {
            (fv * 1000.0) as i64
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.timestamp_millis());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, CrosstrendError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| CrosstrendError::DataLoad {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let ts_col = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|&name| column(name))
            .ok_or_else(|| CrosstrendError::DataLoad {
                reason: format!("{} has no timestamp column", path.display()),
            })?;
        let (open_col, high_col, low_col, close_col, volume_col) = (
            column("open"),
            column("high"),
            column("low"),
            column("close"),
            column("volume"),
        );

        let mut bars = Vec::new();
        let mut skipped = 0usize;
        for record in rdr.records() {
            let record = record?;
            let field = |col: Option<usize>| col.and_then(|c| record.get(c));

            let ts = record.get(ts_col).and_then(parse_timestamp);
            let prices = (
                parse_number(field(open_col)),
                parse_number(field(high_col)),
                parse_number(field(low_col)),
                parse_number(field(close_col)),
            );
            match (ts, prices) {
                (Some(ts), (Some(open), Some(high), Some(low), Some(close))) => bars.push(Bar {
                    ts,
                    open,
                    high,
                    low,
                    close,
                    volume: parse_number(field(volume_col)).unwrap_or(0.0),
                }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(symbol, skipped, "skipped unparseable rows");
        }
        if bars.is_empty() {
            return Err(CrosstrendError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let bars = normalize_bars(bars);
        debug!(symbol, bars = bars.len(), "loaded bars");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CrosstrendError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CrosstrendError::DataLoad {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
