//! Trade statistics and equity-curve metrics for reporting.
//!
//! Statistics that are undefined for the bucket (no trades, no losers, ...)
//! are `None` rather than zero.

use super::backtest::BacktestResult;
use super::portfolio::EquityPoint;
use super::position::{Side, Trade};

/// Quantile levels reported for the pnl_pct distribution.
pub const QUANTILES: [f64; 9] = [0.01, 0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.99];

/// Equity base for the trade-sequence drawdown when the first trade has none.
const FALLBACK_BASE_EQUITY: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Option<f64>,
    /// Mean winning pnl_pct over |mean losing pnl_pct|.
    pub payoff: Option<f64>,
    pub total_pnl: f64,
    pub mean_pnl: Option<f64>,
    pub mean_pnl_pct: Option<f64>,
    pub std_pnl_pct: Option<f64>,
    pub min_pnl_pct: Option<f64>,
    pub max_pnl_pct: Option<f64>,
    pub skew_pnl_pct: Option<f64>,
    pub quantiles: Option<[f64; 9]>,
    /// Peak-to-trough decline of equity rebuilt from realized pnl, as a
    /// positive fraction.
    pub max_drawdown: f64,
    pub total_fees: f64,
    pub profit_factor: Option<f64>,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub mean_hold_days: Option<f64>,
    pub median_hold_days: Option<f64>,
    pub mean_exposure_frac: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Linear interpolation between closest ranks. `sorted` must be ascending
/// and non-empty.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let x = p * (n - 1) as f64;
    let i = x.floor() as usize;
    let j = (i + 1).min(n - 1);
    let w = x - i as f64;
    sorted[i] * (1.0 - w) + sorted[j] * w
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn trade_sequence_drawdown(trades: &[&Trade]) -> f64 {
    let Some(first) = trades.first() else {
        return 0.0;
    };
    let base = if first.equity_entry != 0.0 {
        first.equity_entry
    } else {
        FALLBACK_BASE_EQUITY
    };

    let mut cum = 0.0;
    let mut peak = base;
    let mut max_dd = 0.0_f64;
    for trade in trades {
        cum += trade.pnl;
        let equity = base + cum;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd
}

impl TradeStats {
    pub fn compute(trades: &[&Trade]) -> Self {
        let count = trades.len();
        let winners: Vec<&Trade> = trades.iter().copied().filter(|t| t.pnl > 0.0).collect();
        let losers: Vec<&Trade> = trades.iter().copied().filter(|t| t.pnl < 0.0).collect();

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let mut pcts: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let win_pcts: Vec<f64> = winners.iter().map(|t| t.pnl_pct).collect();
        let loss_pcts: Vec<f64> = losers.iter().map(|t| t.pnl_pct).collect();

        let payoff = match (mean(&win_pcts), mean(&loss_pcts)) {
            (Some(w), Some(l)) if l != 0.0 => Some(w / l.abs()),
            _ => None,
        };

        let mean_pct = mean(&pcts);
        let (std_pct, skew_pct) = match mean_pct {
            Some(m) => {
                let n = pcts.len() as f64;
                let var = pcts.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                let m3 = pcts.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
                let skew = if sd > 0.0 { m3 / sd.powi(3) } else { 0.0 };
                (Some(sd), Some(skew))
            }
            None => (None, None),
        };

        pcts.sort_by(f64::total_cmp);
        let quantiles = if pcts.is_empty() {
            None
        } else {
            Some(QUANTILES.map(|p| quantile(&pcts, p)))
        };

        let gross_profit: f64 = winners.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = -losers.iter().map(|t| t.pnl).sum::<f64>();
        let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);

        let mut holds: Vec<f64> = trades.iter().map(|t| t.holding_days()).collect();
        let mean_hold_days = mean(&holds);
        holds.sort_by(f64::total_cmp);

        let exposure: Vec<f64> = trades.iter().map(|t| t.exposure_frac).collect();

        TradeStats {
            count,
            wins: winners.len(),
            losses: losers.len(),
            win_rate: (count > 0).then(|| winners.len() as f64 / count as f64),
            payoff,
            total_pnl: pnls.iter().sum(),
            mean_pnl: mean(&pnls),
            mean_pnl_pct: mean_pct,
            std_pnl_pct: std_pct,
            min_pnl_pct: pcts.first().copied(),
            max_pnl_pct: pcts.last().copied(),
            skew_pnl_pct: skew_pct,
            quantiles,
            max_drawdown: trade_sequence_drawdown(trades),
            total_fees: trades.iter().map(|t| t.fees).sum(),
            profit_factor,
            avg_win: mean(&winners.iter().map(|t| t.pnl).collect::<Vec<_>>()),
            avg_loss: mean(&losers.iter().map(|t| t.pnl).collect::<Vec<_>>()),
            mean_hold_days,
            median_hold_days: median(&holds),
            mean_exposure_frac: mean(&exposure),
        }
    }
}

/// Splits trades by entry time into early, middle and late thirds. Fewer
/// than three trades stay in one stage.
pub fn split_stages(trades: &[Trade]) -> Vec<Vec<&Trade>> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.entry_ts);
    let k = ordered.len() / 3;
    if k == 0 {
        return vec![ordered];
    }
    let late = ordered.split_off(2 * k);
    let middle = ordered.split_off(k);
    vec![ordered, middle, late]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    All,
    Long,
    Short,
    Stage(usize),
}

impl Bucket {
    pub fn label(self) -> String {
        match self {
            Bucket::All => "all".to_string(),
            Bucket::Long => "long".to_string(),
            Bucket::Short => "short".to_string(),
            Bucket::Stage(0) => "early".to_string(),
            Bucket::Stage(1) => "middle".to_string(),
            Bucket::Stage(2) => "late".to_string(),
            Bucket::Stage(n) => format!("stage{}", n + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityStats {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive steps spent below a prior peak.
    pub max_drawdown_duration: usize,
}

impl EquityStats {
    /// `final_equity` is the cash left after liquidation.
    pub fn compute(equity_curve: &[EquityPoint], initial_equity: f64, final_equity: f64) -> Self {
        let total_return = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity
        } else {
            0.0
        };
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        EquityStats {
            initial_equity,
            final_equity,
            total_return,
            max_drawdown,
            max_drawdown_duration,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_duration = 0;
        } else if point.equity < peak && peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

/// Report-ready statistics of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub rows: Vec<(Bucket, TradeStats)>,
    pub equity: EquityStats,
}

impl Summary {
    pub fn compute(result: &BacktestResult) -> Self {
        let all: Vec<&Trade> = result.trades.iter().collect();
        let by_side = |side: Side| -> Vec<&Trade> {
            result.trades.iter().filter(|t| t.side == side).collect()
        };

        let mut rows = vec![
            (Bucket::All, TradeStats::compute(&all)),
            (Bucket::Long, TradeStats::compute(&by_side(Side::Long))),
            (Bucket::Short, TradeStats::compute(&by_side(Side::Short))),
        ];
        for (i, stage) in split_stages(&result.trades).iter().enumerate() {
            rows.push((Bucket::Stage(i), TradeStats::compute(stage)));
        }

        Summary {
            rows,
            equity: EquityStats::compute(&result.equity_curve, result.initial_equity, result.final_cash),
        }
    }

    pub fn stats(&self, bucket: Bucket) -> Option<&TradeStats> {
        self.rows.iter().find(|(b, _)| *b == bucket).map(|(_, s)| s)
    }
}
