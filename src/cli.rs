//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::config_validation::{load_backtest_config, load_strategy_params};
use crate::domain::error::ScoretraderError;
use crate::domain::indicator::engine::BuiltinIndicatorEngine;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::{Strategy, StrategyParams};
use crate::logging::{LogFormat, init_logging};
use crate::ports::data_port::DataPort;
use crate::ports::indicator_port::IndicatorEngine;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "scoretrader", about = "Score-based strategy backtester")]
pub struct Cli {
    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of <symbol>.csv files, or a single CSV file
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Directory for trades.csv, equity.csv and metrics.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show available symbols and their data range
    Info {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub symbol: String,
    pub strategy: Strategy,
    pub result: BacktestResult,
    pub metrics: Metrics,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level, cli.log_format);

    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            symbol,
            output,
        } => run_backtest_command(&config, &data, symbol.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data, symbol } => run_info(&data, symbol.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate both config sections from an INI file.
pub fn load_config(path: &Path) -> Result<(BacktestConfig, StrategyParams), ScoretraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let bt_config = load_backtest_config(&adapter)?;
    let params = load_strategy_params(&adapter)?;
    Ok((bt_config, params))
}

/// `--symbol`, then `[backtest] symbol`, then the stem of a single data file.
pub fn resolve_symbol(
    cli_symbol: Option<&str>,
    bt_config: &BacktestConfig,
    data_path: &Path,
) -> Result<String, ScoretraderError> {
    cli_symbol
        .map(str::to_string)
        .or_else(|| bt_config.symbol.clone())
        .or_else(|| {
            data_path
                .is_file()
                .then(|| data_path.file_stem())
                .flatten()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .ok_or_else(|| ScoretraderError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })
}

/// Fetch bars, compute indicators, replay, and score the result.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    engine: &dyn IndicatorEngine,
    bt_config: &BacktestConfig,
    params: &StrategyParams,
    symbol: &str,
) -> Result<BacktestRun, ScoretraderError> {
    let strategy = params.build();
    let bars = data_port.fetch_bars(symbol, bt_config.start_date, bt_config.end_date)?;
    let requirements = strategy.required_indicators();

    tracing::info!(
        symbol,
        strategy = %strategy.name,
        bars = bars.len(),
        rules = strategy.rules.len(),
        indicators = requirements.len(),
        "starting backtest"
    );

    let readings = engine.compute(&bars, &requirements)?;
    let result = run_backtest(&bars, &readings, &strategy, bt_config)?;
    let metrics = Metrics::compute(&result, bt_config.risk_free_rate);

    Ok(BacktestRun {
        symbol: symbol.to_string(),
        strategy,
        result,
        metrics,
    })
}

fn run_backtest_command(
    config_path: &Path,
    data_path: &Path,
    symbol: Option<&str>,
    output: Option<&Path>,
) -> Result<(), ScoretraderError> {
    let (bt_config, params) = load_config(config_path)?;
    let symbol = resolve_symbol(symbol, &bt_config, data_path)?;

    let data_port = CsvAdapter::new(data_path);
    let run = run_backtest_pipeline(
        &data_port,
        &BuiltinIndicatorEngine,
        &bt_config,
        &params,
        &symbol,
    )?;

    if let Some(dir) = output {
        CsvReportAdapter::new().write(&run.result, &run.metrics, dir)?;
    }

    print!("{}", format_summary(&run));
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ScoretraderError> {
    let (bt_config, params) = load_config(config_path)?;
    let strategy = params.build();

    println!("Config OK: {}", config_path.display());
    println!(
        "Strategy: {} (required score {})",
        strategy.name, strategy.required_score
    );
    let rules: Vec<&str> = strategy.rules.iter().map(|r| r.name.as_str()).collect();
    println!("Rules: {}", rules.join(", "));
    let indicators: Vec<String> = strategy
        .required_indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    println!("Indicators: {}", indicators.join(", "));
    println!(
        "Fill policy: {:?}, sizing: {:?}, shorting: {}",
        bt_config.fill_policy, bt_config.sizing, bt_config.allow_shorting
    );
    Ok(())
}

fn run_info(data_path: &Path, symbol: Option<&str>) -> Result<(), ScoretraderError> {
    let data_port = CsvAdapter::new(data_path);
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => data_port.list_symbols()?,
    };

    if symbols.is_empty() {
        println!("No symbols found in {}", data_path.display());
        return Ok(());
    }

    for s in &symbols {
        match data_port.get_data_range(s)? {
            Some((first, last, count)) => println!("{s}: {first} to {last} ({count} bars)"),
            None => println!("{s}: no data"),
        }
    }
    Ok(())
}

pub fn format_summary(run: &BacktestRun) -> String {
    let m = &run.metrics;
    let r = &run.result;
    let risk_adjusted = m
        .risk_adjusted_return
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    out.push_str(&format!("=== {} on {} ===\n", run.strategy.name, run.symbol));
    out.push_str(&format!("Bars:             {}\n", r.equity_curve.len()));
    out.push_str(&format!("Initial Capital:  {:.2}\n", r.initial_capital));
    out.push_str(&format!("Final Equity:     {:.2}\n", r.final_equity()));
    out.push_str(&format!("Total Return:     {:.2}%\n", m.total_return * 100.0));
    out.push_str(&format!("Annualized:       {:.2}%\n", m.annualized_return * 100.0));
    out.push_str(&format!("Risk-Adjusted:    {}\n", risk_adjusted));
    out.push_str(&format!("Sharpe Ratio:     {:.2}\n", m.sharpe_ratio));
    out.push_str(&format!("Sortino Ratio:    {:.2}\n", m.sortino_ratio));
    out.push_str(&format!("Max Drawdown:     -{:.1}%\n", m.max_drawdown * 100.0));
    out.push_str(&format!("Total Trades:     {}\n", m.trade_count));
    out.push_str(&format!("Win Rate:         {:.1}%\n", m.win_rate * 100.0));
    out.push_str(&format!("Profit Factor:    {:.2}\n", m.profit_factor));
    out.push_str(&format!("Rejected Orders:  {}\n", r.rejected_orders));
    if let Some(position) = &r.open_position {
        out.push_str(&format!(
            "Open Position:    {} {} @ {:.2}\n",
            position.side, position.size, position.entry_price
        ));
    }
    out
}
