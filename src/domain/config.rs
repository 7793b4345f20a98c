//! Strategy parameters for one backtest run.

use std::fmt;
use std::str::FromStr;

/// How `Trade::pnl_pct` is reported. Has no effect on sizing or pnl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoiMode {
    /// pnl / accumulated entry notional
    #[default]
    Notional,
    /// notional return scaled by `report_leverage`
    Margin,
    /// pnl / equity at entry
    Equity,
}

impl FromStr for RoiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notional" => Ok(RoiMode::Notional),
            "margin" => Ok(RoiMode::Margin),
            "equity" => Ok(RoiMode::Equity),
            other => Err(format!(
                "unknown roi_mode '{}', expected notional, margin or equity",
                other
            )),
        }
    }
}

impl fmt::Display for RoiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiMode::Notional => write!(f, "notional"),
            RoiMode::Margin => write!(f, "margin"),
            RoiMode::Equity => write!(f, "equity"),
        }
    }
}

/// Immutable parameter set. Window lengths are in bars of each symbol's own
/// series; `rebalance_every` counts steps of the global timestamp axis.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    // features
    pub l_ret: usize,
    pub lookback_sma: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub donchian_n: usize,
    pub atr_n: usize,

    // selection
    pub theta_ret: f64,
    pub rebalance_every: usize,
    pub top_k: usize,
    pub allow_long: bool,
    pub allow_short: bool,
    pub market_filter: bool,
    pub market_symbol: String,
    pub market_l: usize,
    pub market_theta: f64,
    pub momentum_gate: bool,
    pub z_score_thresh: f64,
    pub pool_size: usize,
    pub pool_mom_l1: usize,
    pub pool_mom_l2: usize,
    pub cooldown_bars: usize,

    // sizing and risk
    pub initial_equity: f64,
    pub risk_per_trade: f64,
    pub max_actual_leverage: f64,
    pub per_symbol_exposure_max: f64,
    pub min_actual_leverage: f64,
    pub pyramid_max_adds: usize,
    pub pyramid_step_atr: f64,
    pub pyramid_risk_multipliers: Vec<f64>,

    // stops
    pub m1_init_sl_atr: f64,
    pub m2_trail_sl_atr: f64,
    pub time_stop_bars: usize,
    pub be_after_adds: usize,
    pub be_rr: f64,
    pub lock_after_adds: usize,
    pub lock_atr_mult: f64,

    // costs
    pub fee_rate: f64,
    pub slippage_bps: f64,

    // reporting
    pub roi_mode: RoiMode,
    pub report_leverage: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            l_ret: 60,
            lookback_sma: 100,
            ema_fast: 20,
            ema_slow: 100,
            donchian_n: 20,
            atr_n: 14,
            theta_ret: 0.003,
            rebalance_every: 15,
            top_k: 5,
            allow_long: true,
            allow_short: true,
            market_filter: false,
            market_symbol: "BTC-USDT-SWAP".to_string(),
            market_l: 24,
            market_theta: 0.002,
            momentum_gate: false,
            z_score_thresh: 0.0,
            pool_size: 12,
            pool_mom_l1: 24 * 7,
            pool_mom_l2: 24 * 14,
            cooldown_bars: 24,
            initial_equity: 10_000.0,
            risk_per_trade: 0.005,
            max_actual_leverage: 1.0,
            per_symbol_exposure_max: 0.2,
            min_actual_leverage: 0.0,
            pyramid_max_adds: 3,
            pyramid_step_atr: 1.0,
            pyramid_risk_multipliers: vec![1.0, 1.25, 1.5],
            m1_init_sl_atr: 1.5,
            m2_trail_sl_atr: 2.0,
            time_stop_bars: 12 * 60,
            be_after_adds: 1,
            be_rr: 1.0,
            lock_after_adds: 2,
            lock_atr_mult: 1.0,
            fee_rate: 0.0006,
            slippage_bps: 1.0,
            roi_mode: RoiMode::Notional,
            report_leverage: 10.0,
        }
    }
}

impl StrategyConfig {
    /// Risk multiplier for the next pyramid add; the last entry repeats.
    pub fn pyramid_multiplier(&self, adds_done: usize) -> f64 {
        match self.pyramid_risk_multipliers.len() {
            0 => 1.0,
            n => self.pyramid_risk_multipliers[adds_done.min(n - 1)],
        }
    }

    /// Candidate pool width, never below one.
    pub fn pool_width(&self) -> usize {
        self.pool_size.max(1)
    }
}
