//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::strategy_config::build_strategy_config;
use crate::domain::backtest::{BacktestResult, run_backtest};
use crate::domain::bar::Bar;
use crate::domain::config::StrategyConfig;
use crate::domain::config_validation::validate_strategy_config;
use crate::domain::error::CrosstrendError;
use crate::domain::metrics::{Bucket, Summary};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUT_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[command(name = "crosstrend", about = "Cross-sectional trend-following backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides `[data] dir`
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated symbols; overrides `[data] symbols`
        #[arg(long)]
        symbols: Option<String>,
        /// Overrides `[output] dir`
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Validate a configuration file and print the resolved parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in a data directory
    ListSymbols {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbols,
            out_dir,
        } => run_backtest_command(&config, data_dir, symbols.as_deref(), out_dir),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir } => run_list_symbols(&data_dir),
    }
}

fn fail(err: CrosstrendError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Builds the typed parameter set and rejects invalid combinations.
pub fn load_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, CrosstrendError> {
    let config = build_strategy_config(adapter)?;
    validate_strategy_config(&config)?;
    Ok(config)
}

fn dedup_symbols<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in items {
        if !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

/// Splits a comma-separated symbol list, dropping blanks and repeats.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    dedup_symbols(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
    )
}

fn resolve_symbols(
    symbols_override: Option<&str>,
    adapter: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, CrosstrendError> {
    if let Some(raw) = symbols_override {
        return Ok(parse_symbols(raw));
    }
    match adapter.get_list("data", "symbols") {
        Some(list) => Ok(dedup_symbols(list)),
        None => data_port.list_symbols(),
    }
}

/// Loads every requested symbol; the first one that fails aborts the run.
pub fn load_bars(
    data_port: &dyn DataPort,
    symbols: &[String],
) -> Result<Vec<(String, Vec<Bar>)>, CrosstrendError> {
    if symbols.is_empty() {
        return Err(CrosstrendError::DataLoad {
            reason: "no symbols with data to backtest".into(),
        });
    }

    let mut data = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = data_port.fetch_bars(symbol)?;
        data.push((symbol.clone(), bars));
    }
    Ok(data)
}

/// Warns when the market filter is on but its reference symbol is not
/// part of the run; the filter stays inactive in that case.
fn check_market_reference(config: &StrategyConfig, symbols: &[String]) {
    if config.market_filter && !symbols.contains(&config.market_symbol) {
        warn!(
            market_symbol = %config.market_symbol,
            "market reference not among loaded symbols, filter inactive"
        );
        eprintln!(
            "warning: market filter reference {} not loaded; filter inactive",
            config.market_symbol
        );
    }
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    symbols_override: Option<&str>,
    out_dir: Option<PathBuf>,
) -> ExitCode {
    // Stage 1: config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match load_strategy_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 2: data
    let data_dir = data_dir
        .or_else(|| adapter.get_string("data", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let out_dir = out_dir
        .or_else(|| adapter.get_string("output", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));

    let data_port = CsvAdapter::new(data_dir.clone());
    let symbols = match resolve_symbols(symbols_override, &adapter, &data_port) {
        Ok(s) if s.is_empty() => {
            return fail(CrosstrendError::DataLoad {
                reason: format!("no symbols configured or found in {}", data_dir.display()),
            });
        }
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("Loading {} symbols from {}", symbols.len(), data_dir.display());
    let data = match load_bars(&data_port, &symbols) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    check_market_reference(&config, &symbols);

    // Stage 3: run
    info!(symbols = data.len(), "starting backtest");
    let result = match run_backtest(&config, data) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let summary = Summary::compute(&result);
    print_summary(&result, &summary);

    // Stage 4: reports
    match CsvReportAdapter::new().write(&result, &summary, &out_dir) {
        Ok(files) => {
            eprintln!("\nReports written:");
            for f in &files {
                eprintln!("  {}", f.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn fmt_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn print_summary(result: &BacktestResult, summary: &Summary) {
    let equity = &summary.equity;
    eprintln!("\n=== Results ===");
    eprintln!("Symbols:          {}", result.symbols.len());
    eprintln!("Steps:            {}", result.steps);
    eprintln!("Final Equity:     {:.2}", equity.final_equity);
    eprintln!("Total Return:     {:.2}%", equity.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", equity.max_drawdown * 100.0);

    for (bucket, stats) in &summary.rows {
        if *bucket != Bucket::All && stats.count == 0 {
            continue;
        }
        eprintln!(
            "  {:<7} {:>4} trades, win rate {}, payoff {}, profit factor {}, pnl {:+.2}",
            bucket.label(),
            stats.count,
            fmt_pct(stats.win_rate),
            fmt_ratio(stats.payoff),
            fmt_ratio(stats.profit_factor),
            stats.total_pnl,
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match load_strategy_config(&adapter) {
        Ok(config) => {
            println!("{config:#?}");
            eprintln!("Config is valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_symbols(data_dir: &Path) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    match adapter.list_symbols() {
        Ok(symbols) if symbols.is_empty() => {
            eprintln!("No symbols found in {}", data_dir.display());
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{}", symbol);
            }
            eprintln!("{} symbols found", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbols_trims_and_dedups() {
        assert_eq!(
            parse_symbols(" BTC , ETH,,BTC, SOL "),
            vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()]
        );
        assert!(parse_symbols(" , ").is_empty());
    }

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "crosstrend",
            "backtest",
            "--config",
            "run.ini",
            "--data-dir",
            "bars",
            "--symbols",
            "A,B",
            "--out-dir",
            "out",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                data_dir,
                symbols,
                out_dir,
            } => {
                assert_eq!(config, PathBuf::from("run.ini"));
                assert_eq!(data_dir, Some(PathBuf::from("bars")));
                assert_eq!(symbols.as_deref(), Some("A,B"));
                assert_eq!(out_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_requires_config_for_validate() {
        assert!(Cli::try_parse_from(["crosstrend", "validate"]).is_err());
    }

    #[test]
    fn load_strategy_config_rejects_invalid() {
        let adapter = FileConfigAdapter::from_string("[strategy]\ntop_k = 0\n").unwrap();
        let err = load_strategy_config(&adapter).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn fmt_helpers() {
        assert_eq!(fmt_pct(Some(0.125)), "12.50%");
        assert_eq!(fmt_pct(None), "n/a");
        assert_eq!(fmt_ratio(Some(1.5)), "1.50");
    }
}
