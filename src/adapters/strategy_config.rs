//! Mapping from `[strategy]` INI keys onto `StrategyConfig`.
//!
//! Every field has a canonical key and optional alias spellings, including
//! the legacy Chinese names. The first spelling present wins. Missing keys
//! keep their defaults; a present but malformed value is an error.

use crate::domain::config::{RoiMode, StrategyConfig};
use crate::domain::error::CrosstrendError;
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_SECTION: &str = "strategy";

enum Field {
    Count(fn(&mut StrategyConfig) -> &mut usize),
    Real(fn(&mut StrategyConfig) -> &mut f64),
    Flag(fn(&mut StrategyConfig) -> &mut bool),
    Text(fn(&mut StrategyConfig) -> &mut String),
    RealList(fn(&mut StrategyConfig) -> &mut Vec<f64>),
    Roi(fn(&mut StrategyConfig) -> &mut RoiMode),
}

pub struct KeySpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    field: Field,
}

static STRATEGY_KEYS: &[KeySpec] = &[
    KeySpec { name: "L_ret", aliases: &["价格波幅窗口"], field: Field::Count(|c| &mut c.l_ret) },
    KeySpec { name: "lookback_sma", aliases: &["SMA回看期"], field: Field::Count(|c| &mut c.lookback_sma) },
    KeySpec { name: "ema_fast", aliases: &["EMA快线"], field: Field::Count(|c| &mut c.ema_fast) },
    KeySpec { name: "ema_slow", aliases: &["EMA慢线"], field: Field::Count(|c| &mut c.ema_slow) },
    KeySpec { name: "donchian_n", aliases: &["唐奇安窗口"], field: Field::Count(|c| &mut c.donchian_n) },
    KeySpec { name: "atr_n", aliases: &["ATR窗口"], field: Field::Count(|c| &mut c.atr_n) },
    KeySpec { name: "theta_ret", aliases: &["价格波幅阈值"], field: Field::Real(|c| &mut c.theta_ret) },
    KeySpec { name: "rebalance_every", aliases: &["调仓间隔"], field: Field::Count(|c| &mut c.rebalance_every) },
    KeySpec { name: "top_k", aliases: &["最多持仓数"], field: Field::Count(|c| &mut c.top_k) },
    KeySpec { name: "risk_per_trade", aliases: &["单笔风险占比"], field: Field::Real(|c| &mut c.risk_per_trade) },
    KeySpec { name: "max_actual_leverage", aliases: &["最大实际杠杆"], field: Field::Real(|c| &mut c.max_actual_leverage) },
    KeySpec { name: "per_symbol_exposure_max", aliases: &["单标的最大暴露占比"], field: Field::Real(|c| &mut c.per_symbol_exposure_max) },
    KeySpec { name: "min_actual_leverage", aliases: &[], field: Field::Real(|c| &mut c.min_actual_leverage) },
    KeySpec { name: "fee_rate", aliases: &["手续费率"], field: Field::Real(|c| &mut c.fee_rate) },
    KeySpec { name: "slippage_bps", aliases: &["滑点基点"], field: Field::Real(|c| &mut c.slippage_bps) },
    KeySpec { name: "m1_init_sl_atr", aliases: &["初始止损ATR倍数"], field: Field::Real(|c| &mut c.m1_init_sl_atr) },
    KeySpec { name: "m2_trail_sl_atr", aliases: &["移动止盈ATR倍数"], field: Field::Real(|c| &mut c.m2_trail_sl_atr) },
    KeySpec { name: "time_stop_bars", aliases: &["时间止损bar数"], field: Field::Count(|c| &mut c.time_stop_bars) },
    KeySpec { name: "initial_equity", aliases: &["初始资金"], field: Field::Real(|c| &mut c.initial_equity) },
    KeySpec { name: "allow_long", aliases: &["允许做多"], field: Field::Flag(|c| &mut c.allow_long) },
    KeySpec { name: "allow_short", aliases: &["允许做空"], field: Field::Flag(|c| &mut c.allow_short) },
    KeySpec { name: "market_filter", aliases: &["市场过滤"], field: Field::Flag(|c| &mut c.market_filter) },
    KeySpec { name: "market_symbol", aliases: &["市场基准"], field: Field::Text(|c| &mut c.market_symbol) },
    KeySpec { name: "market_L", aliases: &["市场窗口"], field: Field::Count(|c| &mut c.market_l) },
    KeySpec { name: "market_theta", aliases: &["市场阈值"], field: Field::Real(|c| &mut c.market_theta) },
    KeySpec { name: "momentum_gate", aliases: &["动量闸门"], field: Field::Flag(|c| &mut c.momentum_gate) },
    KeySpec { name: "z_score_thresh", aliases: &["Z分数阈值"], field: Field::Real(|c| &mut c.z_score_thresh) },
    KeySpec { name: "pyramid_max_adds", aliases: &["金字塔加仓次数"], field: Field::Count(|c| &mut c.pyramid_max_adds) },
    KeySpec { name: "pyramid_step_atr", aliases: &["金字塔步长ATR"], field: Field::Real(|c| &mut c.pyramid_step_atr) },
    KeySpec { name: "pyramid_risk_multipliers", aliases: &["金字塔风险乘数"], field: Field::RealList(|c| &mut c.pyramid_risk_multipliers) },
    KeySpec { name: "be_after_adds", aliases: &["保本加仓次数"], field: Field::Count(|c| &mut c.be_after_adds) },
    KeySpec { name: "be_rr", aliases: &["保本R阈值"], field: Field::Real(|c| &mut c.be_rr) },
    KeySpec { name: "lock_after_adds", aliases: &["锁盈加仓次数"], field: Field::Count(|c| &mut c.lock_after_adds) },
    KeySpec { name: "lock_atr_mult", aliases: &["锁盈ATR倍数"], field: Field::Real(|c| &mut c.lock_atr_mult) },
    KeySpec { name: "pool_size", aliases: &["候选池大小"], field: Field::Count(|c| &mut c.pool_size) },
    KeySpec { name: "pool_mom_L1", aliases: &["候选池7天窗口"], field: Field::Count(|c| &mut c.pool_mom_l1) },
    KeySpec { name: "pool_mom_L2", aliases: &["候选池14天窗口"], field: Field::Count(|c| &mut c.pool_mom_l2) },
    KeySpec { name: "cooldown_bars", aliases: &["冷却bars"], field: Field::Count(|c| &mut c.cooldown_bars) },
    KeySpec { name: "roi_mode", aliases: &["收益率口径"], field: Field::Roi(|c| &mut c.roi_mode) },
    KeySpec { name: "report_leverage", aliases: &["报告杠杆"], field: Field::Real(|c| &mut c.report_leverage) },
];

/// Every recognised strategy key, in table order.
pub fn strategy_keys() -> &'static [KeySpec] {
    STRATEGY_KEYS
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, CrosstrendError> {
    let value = match raw.parse::<i64>() {
        Ok(v) => v,
        // accept integral floats such as "60.0"
        Err(_) => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(CrosstrendError::invalid(key, format!("expected an integer, got {raw:?}"))),
        },
    };
    usize::try_from(value)
        .map_err(|_| CrosstrendError::invalid(key, format!("must not be negative, got {value}")))
}

fn parse_real(key: &str, raw: &str) -> Result<f64, CrosstrendError> {
    raw.parse::<f64>()
        .map_err(|_| CrosstrendError::invalid(key, format!("expected a number, got {raw:?}")))
}

impl KeySpec {
    fn lookup(&self, port: &dyn ConfigPort, section: &str) -> Option<String> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|key| port.get_string(section, key))
    }

    fn apply(&self, config: &mut StrategyConfig, raw: &str) -> Result<(), CrosstrendError> {
        let key = self.name;
        match &self.field {
            Field::Count(field) => *field(config) = parse_count(key, raw)?,
            Field::Real(field) => *field(config) = parse_real(key, raw)?,
            Field::Flag(field) => {
                *field(config) = parse_bool(raw)
                    .ok_or_else(|| CrosstrendError::invalid(key, format!("expected a boolean, got {raw:?}")))?
            }
            Field::Text(field) => *field(config) = raw.to_string(),
            Field::RealList(field) => {
                *field(config) = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_real(key, s))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Field::Roi(field) => {
                *field(config) = raw
                    .parse::<RoiMode>()
                    .map_err(|reason| CrosstrendError::invalid(key, reason))?
            }
        }
        Ok(())
    }
}

/// Reads `[strategy]` onto the defaults. Does not run semantic validation.
pub fn build_strategy_config(port: &dyn ConfigPort) -> Result<StrategyConfig, CrosstrendError> {
    let mut config = StrategyConfig::default();
    for key in STRATEGY_KEYS {
        if let Some(raw) = key.lookup(port, STRATEGY_SECTION) {
            key.apply(&mut config, &raw)?;
        }
    }
    Ok(config)
}
