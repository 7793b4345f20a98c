//! Configuration validation.
//!
//! Rejects structurally invalid parameter sets before a run starts.

use crate::domain::config::StrategyConfig;
use crate::domain::error::CrosstrendError;

pub fn validate_strategy_config(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    validate_windows(config)?;
    validate_selection(config)?;
    validate_sizing(config)?;
    validate_stops(config)?;
    validate_costs(config)?;
    Ok(())
}

fn require_at_least_one(key: &str, value: usize) -> Result<(), CrosstrendError> {
    if value < 1 {
        return Err(CrosstrendError::invalid(
            key,
            format!("{} must be at least 1", key),
        ));
    }
    Ok(())
}

fn require_non_negative(key: &str, value: f64) -> Result<(), CrosstrendError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CrosstrendError::invalid(
            key,
            format!("{} must be a non-negative number", key),
        ));
    }
    Ok(())
}

fn require_positive(key: &str, value: f64) -> Result<(), CrosstrendError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CrosstrendError::invalid(
            key,
            format!("{} must be positive", key),
        ));
    }
    Ok(())
}

fn validate_windows(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    require_at_least_one("L_ret", config.l_ret)?;
    require_at_least_one("lookback_sma", config.lookback_sma)?;
    require_at_least_one("ema_fast", config.ema_fast)?;
    require_at_least_one("ema_slow", config.ema_slow)?;
    require_at_least_one("donchian_n", config.donchian_n)?;
    require_at_least_one("atr_n", config.atr_n)?;
    if config.market_filter {
        require_at_least_one("market_L", config.market_l)?;
    }
    Ok(())
}

fn validate_selection(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    require_at_least_one("top_k", config.top_k)?;
    require_at_least_one("rebalance_every", config.rebalance_every)?;
    if !config.theta_ret.is_finite() {
        return Err(CrosstrendError::invalid("theta_ret", "theta_ret must be finite"));
    }
    if !config.z_score_thresh.is_finite() {
        return Err(CrosstrendError::invalid(
            "z_score_thresh",
            "z_score_thresh must be finite",
        ));
    }
    if config.market_filter {
        require_non_negative("market_theta", config.market_theta)?;
        if config.market_symbol.trim().is_empty() {
            return Err(CrosstrendError::invalid(
                "market_symbol",
                "market_symbol is required when market_filter is enabled",
            ));
        }
    }
    Ok(())
}

fn validate_sizing(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    require_positive("initial_equity", config.initial_equity)?;
    require_non_negative("risk_per_trade", config.risk_per_trade)?;
    require_non_negative("max_actual_leverage", config.max_actual_leverage)?;
    require_non_negative("per_symbol_exposure_max", config.per_symbol_exposure_max)?;
    require_non_negative("min_actual_leverage", config.min_actual_leverage)?;
    if config.min_actual_leverage > config.max_actual_leverage {
        return Err(CrosstrendError::invalid(
            "min_actual_leverage",
            "min_actual_leverage must not exceed max_actual_leverage",
        ));
    }
    require_non_negative("pyramid_step_atr", config.pyramid_step_atr)?;
    for m in &config.pyramid_risk_multipliers {
        require_non_negative("pyramid_risk_multipliers", *m)?;
    }
    Ok(())
}

fn validate_stops(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    require_positive("m1_init_sl_atr", config.m1_init_sl_atr)?;
    require_non_negative("m2_trail_sl_atr", config.m2_trail_sl_atr)?;
    require_non_negative("be_rr", config.be_rr)?;
    require_non_negative("lock_atr_mult", config.lock_atr_mult)?;
    Ok(())
}

fn validate_costs(config: &StrategyConfig) -> Result<(), CrosstrendError> {
    require_non_negative("fee_rate", config.fee_rate)?;
    require_non_negative("slippage_bps", config.slippage_bps)?;
    require_non_negative("report_leverage", config.report_leverage)?;
    Ok(())
}
