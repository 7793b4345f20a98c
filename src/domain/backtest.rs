//! Backtest engine and event loop.
//!
//! One `Engine` owns every piece of mutable simulation state. Each global
//! step runs in a fixed order:
//!
//! 1. advance symbol cursors and age open positions
//! 2. ratchet stops and collect stop exits, then apply them
//! 3. on rebalance ticks: score, exit misaligned positions, pyramid, enter
//! 4. record mark-to-market equity
//!
//! Remaining positions are closed at their last bar when the timeline ends.

use tracing::{debug, info};

use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::config_validation::validate_strategy_config;
use crate::domain::error::CrosstrendError;
use crate::domain::execution::{apply_add, exit_position, open_position};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::roc::calculate_return;
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ExitReason, Side, Trade};
use crate::domain::selector::{
    Candidate, Cooldowns, MarketFilter, Snapshot, alignment_lost, breakout, build_pool,
    scoring_population, select_candidates,
};
use crate::domain::sizing::{SizingContext, size_add, size_entry};
use crate::domain::stops::{check_exit, update_stops};
use crate::domain::symbol_data::{SymbolData, Universe, build_global_timeline, normalize_bars};

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_equity: f64,
    pub final_cash: f64,
    pub symbols: Vec<String>,
    pub steps: usize,
}

impl BacktestResult {
    /// Realized pnl over the run; every position is flat after liquidation.
    pub fn net_pnl(&self) -> f64 {
        self.final_cash - self.initial_equity
    }
}

/// Reference-symbol return series for the market filter.
#[derive(Debug, Clone)]
struct MarketReference {
    symbol_idx: usize,
    returns: IndicatorSeries,
}

pub struct Engine<'a> {
    config: &'a StrategyConfig,
    universe: Universe,
    timeline: Vec<i64>,
    market: Option<MarketReference>,
    portfolio: Portfolio,
    cooldowns: Cooldowns,
    last_rebalance: Option<usize>,
}

impl<'a> Engine<'a> {
    /// Validates the config and precomputes every symbol's features.
    ///
    /// Bars are sorted and deduplicated per symbol; symbol order is kept as
    /// given and fixes the scan order of every cross-sectional pass.
    pub fn new(config: &'a StrategyConfig, data: Vec<(String, Vec<Bar>)>) -> Result<Self, CrosstrendError> {
        validate_strategy_config(config)?;

        let symbols: Vec<SymbolData> = data
            .into_iter()
            .map(|(symbol, bars)| SymbolData::new(symbol, normalize_bars(bars), config))
            .collect();
        let timeline = build_global_timeline(&symbols);
        let universe = Universe::new(symbols);

        let market = if config.market_filter {
            universe
                .position_of(&config.market_symbol)
                .filter(|&idx| universe.symbols()[idx].bar_count() > 0)
                .map(|symbol_idx| MarketReference {
                    symbol_idx,
                    returns: calculate_return(&universe.symbols()[symbol_idx].closes(), config.market_l),
                })
        } else {
            None
        };

        Ok(Engine {
            config,
            universe,
            timeline,
            market,
            portfolio: Portfolio::new(config.initial_equity),
            cooldowns: Cooldowns::new(),
            last_rebalance: None,
        })
    }

    pub fn timeline(&self) -> &[i64] {
        &self.timeline
    }

    /// Runs the simulation to completion.
    pub fn run(mut self) -> BacktestResult {
        let timeline = std::mem::take(&mut self.timeline);
        for (step, &ts) in timeline.iter().enumerate() {
            self.universe.advance(ts);
            self.age_positions();
            self.manage_stops();

            if self.rebalance_due(step) {
                self.last_rebalance = Some(step);
                self.rebalance();
            }

            let equity = self.mark_to_market();
            self.portfolio.record_equity(ts, equity);
        }
        self.close_all(ExitReason::Eod);

        let result = BacktestResult {
            trades: self.portfolio.closed_trades,
            equity_curve: self.portfolio.equity_curve,
            initial_equity: self.portfolio.initial_capital,
            final_cash: self.portfolio.cash,
            symbols: self
                .universe
                .symbols()
                .iter()
                .map(|sd| sd.symbol.clone())
                .collect(),
            steps: timeline.len(),
        };
        info!(
            symbols = result.symbols.len(),
            steps = result.steps,
            trades = result.trades.len(),
            final_cash = result.final_cash,
            net_pnl = result.net_pnl(),
            "backtest finished"
        );
        result
    }

    fn rebalance_due(&self, step: usize) -> bool {
        match self.last_rebalance {
            None => true,
            Some(last) => step - last >= self.config.rebalance_every,
        }
    }

    fn mark_to_market(&self) -> f64 {
        self.portfolio.mark_to_market(|s| self.universe.close_of(s))
    }

    fn sizing_context(&self) -> SizingContext {
        SizingContext {
            equity_now: self.mark_to_market(),
            exposure_now: self.portfolio.gross_exposure(|s| self.universe.close_of(s)),
        }
    }

    fn market_filter(&self) -> MarketFilter {
        match &self.market {
            None => MarketFilter::Off,
            Some(reference) => MarketFilter::On {
                ret: self
                    .universe
                    .cursor(reference.symbol_idx)
                    .and_then(|i| reference.returns.get(i)),
            },
        }
    }

    fn age_positions(&mut self) {
        for pos in self.portfolio.positions.iter_mut() {
            if self.universe.close_of(&pos.symbol).is_some() {
                pos.bars_since_entry += 1;
            }
        }
    }

    /// Ratchets every stop first, then applies the exits in book order.
    fn manage_stops(&mut self) {
        let mut exits: Vec<(String, Bar, ExitReason)> = Vec::new();
        for pos in self.portfolio.positions.iter_mut() {
            let Some((bar, row)) = self.universe.current_of(&pos.symbol) else {
                continue;
            };
            update_stops(pos, &bar, row.atr_or_zero(), self.config);
            if let Some(reason) = check_exit(pos, &bar, self.config) {
                exits.push((pos.symbol.clone(), bar, reason));
            }
        }

        for (symbol, bar, reason) in exits {
            let lost = self.close(&symbol, &bar, reason).is_some_and(|pnl| pnl < 0.0);
            if lost {
                self.cooldowns.arm(&symbol, self.config.cooldown_bars);
            }
        }
    }

    fn rebalance(&mut self) {
        let snapshots: Vec<Snapshot<'_>> = self
            .universe
            .symbols()
            .iter()
            .enumerate()
            .filter_map(|(idx, sd)| {
                self.universe.current(idx).map(|(bar, row)| Snapshot {
                    symbol: sd.symbol.as_str(),
                    bar,
                    row,
                })
            })
            .collect();
        let population = scoring_population(&snapshots);
        self.cooldowns.tick();
        let pool = build_pool(&population, self.config.pool_width());
        let candidates = select_candidates(
            &population,
            &pool,
            &self.cooldowns,
            self.market_filter(),
            self.config,
        );

        self.exit_misaligned();
        self.pyramid();
        self.enter(candidates);
    }

    fn exit_misaligned(&mut self) {
        let misaligned: Vec<(String, Bar)> = self
            .portfolio
            .positions
            .iter()
            .filter_map(|pos| {
                let (bar, row) = self.universe.current_of(&pos.symbol)?;
                alignment_lost(pos.side, &row).then(|| (pos.symbol.clone(), bar))
            })
            .collect();
        for (symbol, bar) in misaligned {
            self.close(&symbol, &bar, ExitReason::AlignmentLost);
        }
    }

    /// At most one add per open position.
    fn pyramid(&mut self) {
        let config = self.config;
        for symbol in self.portfolio.open_symbols() {
            let Some((bar, row)) = self.universe.current_of(&symbol) else {
                continue;
            };
            let Some(pos) = self.portfolio.get_position(&symbol) else {
                continue;
            };
            if pos.adds_done >= config.pyramid_max_adds {
                continue;
            }
            let atr = row.atr_or_zero();
            if atr <= 0.0 || !breakout(pos.side, &row, bar.close, config.theta_ret) {
                continue;
            }

            let anchor = if pos.last_add_price != 0.0 {
                pos.last_add_price
            } else {
                pos.entry_price
            };
            let step = config.pyramid_step_atr * atr;
            let advanced = match pos.side {
                Side::Long => bar.close >= anchor + step,
                Side::Short => bar.close <= anchor - step,
            };
            if !advanced {
                continue;
            }

            let (adds_done, position_notional) = (pos.adds_done, pos.notional(bar.close));
            let ctx = self.sizing_context();
            let Some(sizing) = size_add(config, &ctx, atr, bar.close, adds_done, position_notional) else {
                continue;
            };
            if let Some(pos) = self.portfolio.get_position_mut(&symbol) {
                if apply_add(pos, sizing.qty, bar.close, ctx.equity_now, config) {
                    debug!(
                        symbol = %symbol,
                        side = %pos.side,
                        ts = bar.ts,
                        add_qty = sizing.qty,
                        avg_price = pos.entry_price,
                        adds_done = pos.adds_done,
                        "pyramid add"
                    );
                }
            }
        }
    }

    fn enter(&mut self, candidates: Vec<Candidate>) {
        let config = self.config;
        for candidate in candidates {
            if self.portfolio.position_count() >= config.top_k {
                break;
            }
            if self.portfolio.has_position(&candidate.symbol) {
                continue;
            }
            let Some((bar, row)) = self.universe.current_of(&candidate.symbol) else {
                continue;
            };
            let atr = row.atr_or_zero();
            if atr <= 0.0 {
                continue;
            }

            let ctx = self.sizing_context();
            let Some(sizing) = size_entry(config, &ctx, atr, bar.close) else {
                continue;
            };
            let stop_dist = config.m1_init_sl_atr * atr;
            let pos = open_position(
                &candidate.symbol,
                candidate.side,
                &bar,
                sizing.qty,
                stop_dist,
                ctx.equity_now,
                config,
            );
            debug!(
                symbol = %pos.symbol,
                side = %pos.side,
                ts = bar.ts,
                price = pos.entry_price,
                qty = pos.qty,
                stop = pos.trail_stop,
                score = candidate.score,
                "entry"
            );
            self.portfolio.add_position(pos);
        }
    }

    /// Closes one position and logs the realized trade.
    fn close(&mut self, symbol: &str, bar: &Bar, reason: ExitReason) -> Option<f64> {
        let pnl = exit_position(&mut self.portfolio, symbol, bar, reason, self.config)?;
        debug!(
            symbol = %symbol,
            ts = bar.ts,
            reason = %reason,
            pnl = pnl,
            cash = self.portfolio.cash,
            "exit"
        );
        Some(pnl)
    }

    fn close_all(&mut self, reason: ExitReason) {
        for symbol in self.portfolio.open_symbols() {
            if let Some((bar, _)) = self.universe.current_of(&symbol) {
                self.close(&symbol, &bar, reason);
            }
        }
    }
}

/// Validates, runs and returns the result in one call.
pub fn run_backtest(
    config: &StrategyConfig,
    data: Vec<(String, Vec<Bar>)>,
) -> Result<BacktestResult, CrosstrendError> {
    Ok(Engine::new(config, data)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            ts,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1.0,
        }
    }

    fn fast_config() -> StrategyConfig {
        StrategyConfig {
            l_ret: 5,
            lookback_sma: 5,
            ema_fast: 3,
            ema_slow: 6,
            donchian_n: 5,
            atr_n: 5,
            rebalance_every: 1,
            pool_mom_l1: 5,
            pool_mom_l2: 10,
            slippage_bps: 0.0,
            fee_rate: 0.0,
            ..Default::default()
        }
    }

    fn uptrend(n: usize) -> Vec<Bar> {
        (0..n).map(|i| bar(i as i64 * 60_000, 100.0 + i as f64)).collect()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = StrategyConfig {
            top_k: 0,
            ..Default::default()
        };
        let err = Engine::new(&config, vec![]).err().unwrap();
        assert!(matches!(err, CrosstrendError::ConfigInvalid { .. }));
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let config = StrategyConfig::default();
        let result = run_backtest(&config, vec![]).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.is_empty());
        assert_eq!(result.final_cash, config.initial_equity);
        assert_eq!(result.net_pnl(), 0.0);
    }

    #[test]
    fn equity_curve_has_one_point_per_global_step() {
        let config = fast_config();
        let a: Vec<Bar> = uptrend(20);
        let b: Vec<Bar> = (0..10).map(|i| bar(i * 120_000 + 30_000, 50.0)).collect();
        let engine = Engine::new(&config, vec![("A".into(), a), ("B".into(), b)]).unwrap();
        let steps = engine.timeline().len();
        let result = engine.run();
        assert_eq!(result.equity_curve.len(), steps);
        assert_eq!(result.steps, steps);
        assert!(result.equity_curve.windows(2).all(|w| w[0].ts < w[1].ts));
    }

    #[test]
    fn uptrend_enters_long_and_closes_at_end() {
        let config = fast_config();
        let result = run_backtest(&config, vec![("A".into(), uptrend(30))]).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.side, Side::Long);
        assert_eq!(trade.reason, ExitReason::Eod);
        assert!(trade.pnl > 0.0);
        assert!((result.final_cash - (config.initial_equity + trade.pnl)).abs() < 1e-9);
    }

    #[test]
    fn rebalance_cadence_counts_global_steps() {
        let config = StrategyConfig {
            rebalance_every: 3,
            ..fast_config()
        };
        let engine = Engine::new(&config, vec![("A".into(), uptrend(10))]).unwrap();
        let due: Vec<usize> = {
            let mut e = engine;
            (0..10)
                .filter(|&step| {
                    let due = e.rebalance_due(step);
                    if due {
                        e.last_rebalance = Some(step);
                    }
                    due
                })
                .collect()
        };
        assert_eq!(due, vec![0, 3, 6, 9]);
    }

    #[test]
    fn market_filter_inactive_without_reference_data() {
        let config = StrategyConfig {
            market_filter: true,
            market_symbol: "MISSING".into(),
            ..fast_config()
        };
        let engine = Engine::new(&config, vec![("A".into(), uptrend(30))]).unwrap();
        assert_eq!(engine.market_filter(), MarketFilter::Off);
        assert_eq!(engine.run().trades.len(), 1);
    }

    #[test]
    fn market_filter_inactive_when_reference_has_no_bars() {
        let config = StrategyConfig {
            market_filter: true,
            market_symbol: "REF".into(),
            ..fast_config()
        };
        let engine = Engine::new(
            &config,
            vec![("A".into(), uptrend(30)), ("REF".into(), Vec::new())],
        )
        .unwrap();
        assert_eq!(engine.market_filter(), MarketFilter::Off);
        let result = engine.run();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].symbol, "A");
    }

    #[test]
    fn market_filter_blocks_until_reference_ready() {
        let config = StrategyConfig {
            market_filter: true,
            market_symbol: "REF".into(),
            market_l: 1_000,
            ..fast_config()
        };
        let flat_ref: Vec<Bar> = (0..30).map(|i| bar(i * 60_000, 10.0)).collect();
        let result = run_backtest(
            &config,
            vec![("A".into(), uptrend(30)), ("REF".into(), flat_ref)],
        )
        .unwrap();
        assert!(result.trades.is_empty());
    }
}
