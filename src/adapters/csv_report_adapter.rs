//! CSV report writer.
//!
//! Writes `trades.csv`, `equity.csv` and `summary.csv` into the output
//! directory. `summary.csv` is long-format (`bucket,metric,value`) so every
//! bucket and the equity-curve statistics share one layout. Undefined
//! statistics are written as empty cells.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CrosstrendError;
use crate::domain::metrics::{QUANTILES, Summary, TradeStats};
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;
use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

/// Header of `trades.csv`; written even when there are no trades. Must match
/// the field order of `TradeRow`.
const TRADE_COLUMNS: [&str; 21] = [
    "symbol",
    "side",
    "entry_ts",
    "entry_time",
    "entry_price",
    "exit_ts",
    "exit_time",
    "exit_price",
    "qty",
    "pnl",
    "pnl_pct",
    "fees",
    "reason",
    "equity_entry",
    "exposure_notional",
    "exposure_frac",
    "adds_done",
    "holding_days",
    "cum_pnl",
    "trade_drawdown",
    "return_on_equity",
];

#[derive(Serialize)]
struct TradeRow<'a> {
    symbol: &'a str,
    side: &'static str,
    entry_ts: i64,
    entry_time: String,
    entry_price: f64,
    exit_ts: i64,
    exit_time: String,
    exit_price: f64,
    qty: f64,
    pnl: f64,
    pnl_pct: f64,
    fees: f64,
    reason: &'static str,
    equity_entry: f64,
    exposure_notional: f64,
    exposure_frac: f64,
    adds_done: usize,
    holding_days: f64,
    cum_pnl: f64,
    /// Drawdown of the realized-pnl path, in trade order.
    trade_drawdown: f64,
    return_on_equity: Option<f64>,
}

#[derive(Serialize)]
struct EquityRow {
    ts: i64,
    time: String,
    equity: f64,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    bucket: &'a str,
    metric: &'a str,
    value: Option<f64>,
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn trade_rows(trades: &[Trade], initial_equity: f64) -> Vec<TradeRow<'_>> {
    let mut cum_pnl = 0.0;
    let mut peak = initial_equity;
    trades
        .iter()
        .map(|t| {
            cum_pnl += t.pnl;
            let equity = initial_equity + cum_pnl;
            peak = peak.max(equity);
            let trade_drawdown = if peak > 0.0 {
                (peak - equity) / peak
            } else {
                0.0
            };
            TradeRow {
                symbol: &t.symbol,
                side: t.side.as_str(),
                entry_ts: t.entry_ts,
                entry_time: format_ts(t.entry_ts),
                entry_price: t.entry_price,
                exit_ts: t.exit_ts,
                exit_time: format_ts(t.exit_ts),
                exit_price: t.exit_price,
                qty: t.qty,
                pnl: t.pnl,
                pnl_pct: t.pnl_pct,
                fees: t.fees,
                reason: t.reason.as_str(),
                equity_entry: t.equity_entry,
                exposure_notional: t.exposure_notional,
                exposure_frac: t.exposure_frac,
                adds_done: t.adds_done,
                holding_days: t.holding_days(),
                cum_pnl,
                trade_drawdown,
                return_on_equity: (t.equity_entry > 0.0).then(|| t.pnl / t.equity_entry),
            }
        })
        .collect()
}

fn quantile_label(q: f64) -> String {
    format!("p{:02}", (q * 100.0).round() as u32)
}

fn stats_metrics(stats: &TradeStats) -> Vec<(String, Option<f64>)> {
    let mut metrics = vec![
        ("count".to_string(), Some(stats.count as f64)),
        ("wins".to_string(), Some(stats.wins as f64)),
        ("losses".to_string(), Some(stats.losses as f64)),
        ("win_rate".to_string(), stats.win_rate),
        ("payoff".to_string(), stats.payoff),
        ("total_pnl".to_string(), Some(stats.total_pnl)),
        ("mean_pnl".to_string(), stats.mean_pnl),
        ("mean_pnl_pct".to_string(), stats.mean_pnl_pct),
        ("std_pnl_pct".to_string(), stats.std_pnl_pct),
        ("min_pnl_pct".to_string(), stats.min_pnl_pct),
        ("max_pnl_pct".to_string(), stats.max_pnl_pct),
        ("skew_pnl_pct".to_string(), stats.skew_pnl_pct),
    ];
    for (i, q) in QUANTILES.iter().enumerate() {
        metrics.push((quantile_label(*q), stats.quantiles.map(|qs| qs[i])));
    }
    metrics.extend([
        ("max_drawdown".to_string(), Some(stats.max_drawdown)),
        ("total_fees".to_string(), Some(stats.total_fees)),
        ("profit_factor".to_string(), stats.profit_factor),
        ("avg_win".to_string(), stats.avg_win),
        ("avg_loss".to_string(), stats.avg_loss),
        ("mean_hold_days".to_string(), stats.mean_hold_days),
        ("median_hold_days".to_string(), stats.median_hold_days),
        ("mean_exposure_frac".to_string(), stats.mean_exposure_frac),
    ]);
    metrics
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_trades(&self, result: &BacktestResult, path: &Path) -> Result<(), CrosstrendError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        wtr.write_record(TRADE_COLUMNS)?;
        for row in trade_rows(&result.trades, result.initial_equity) {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_equity(&self, result: &BacktestResult, path: &Path) -> Result<(), CrosstrendError> {
        let mut wtr = csv::Writer::from_path(path)?;
        for point in &result.equity_curve {
            wtr.serialize(EquityRow {
                ts: point.ts,
                time: format_ts(point.ts),
                equity: point.equity,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(&self, summary: &Summary, path: &Path) -> Result<(), CrosstrendError> {
        let mut wtr = csv::Writer::from_path(path)?;
        for (bucket, stats) in &summary.rows {
            let label = bucket.label();
            for (metric, value) in stats_metrics(stats) {
                wtr.serialize(SummaryRow {
                    bucket: &label,
                    metric: &metric,
                    value,
                })?;
            }
        }

        let equity = &summary.equity;
        let equity_metrics = [
            ("initial_equity", equity.initial_equity),
            ("final_equity", equity.final_equity),
            ("total_return", equity.total_return),
            ("max_drawdown", equity.max_drawdown),
            ("max_drawdown_duration", equity.max_drawdown_duration as f64),
        ];
        for (metric, value) in equity_metrics {
            wtr.serialize(SummaryRow {
                bucket: "equity",
                metric,
                value: Some(value),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        summary: &Summary,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, CrosstrendError> {
        fs::create_dir_all(out_dir).map_err(|e| CrosstrendError::Report {
            reason: format!("cannot create {}: {}", out_dir.display(), e),
        })?;

        let trades = out_dir.join(TRADES_FILE);
        let equity = out_dir.join(EQUITY_FILE);
        let summary_path = out_dir.join(SUMMARY_FILE);

        self.write_trades(result, &trades)?;
        self.write_equity(result, &equity)?;
        self.write_summary(summary, &summary_path)?;

        info!(dir = %out_dir.display(), trades = result.trades.len(), "reports written");
        Ok(vec![trades, equity, summary_path])
    }
}
