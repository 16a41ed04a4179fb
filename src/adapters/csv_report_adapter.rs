//! CSV report adapter implementing ReportPort.
//!
//! Writes `trades.csv`, `equity.csv` and `metrics.csv` into the output
//! directory, creating it if needed.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ScoretraderError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const METRICS_FILE: &str = "metrics.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(path: &Path, e: csv::Error) -> ScoretraderError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => ScoretraderError::Io(io),
        other => ScoretraderError::DataSource {
            reason: format!("failed to write {}: {:?}", path.display(), other),
        },
    }
}

fn write_trades(result: &BacktestResult, path: &Path) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "side",
        "size",
        "entry_date",
        "exit_date",
        "entry_bar",
        "exit_bar",
        "entry_price",
        "exit_price",
        "commission",
        "profit_loss",
        "return_pct",
        "exit_reason",
    ])?;
    for t in &result.trades {
        wtr.write_record([
            t.side.to_string(),
            t.size.to_string(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            t.entry_bar.to_string(),
            t.exit_bar.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            format!("{:.4}", t.commission),
            format!("{:.4}", t.profit_loss),
            format!("{:.4}", t.return_pct),
            t.exit_reason.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_equity(result: &BacktestResult, path: &Path) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["date", "equity"])?;
    for point in &result.equity_curve {
        wtr.write_record([point.date.to_string(), format!("{:.4}", point.equity)])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_metrics(metrics: &Metrics, path: &Path) -> Result<(), csv::Error> {
    let risk_adjusted = metrics
        .risk_adjusted_return
        .map(|v| format!("{:.6}", v))
        .unwrap_or_default();
    let rows = [
        ("total_return", format!("{:.6}", metrics.total_return)),
        ("annualized_return", format!("{:.6}", metrics.annualized_return)),
        ("risk_adjusted_return", risk_adjusted),
        ("sharpe_ratio", format!("{:.6}", metrics.sharpe_ratio)),
        ("sortino_ratio", format!("{:.6}", metrics.sortino_ratio)),
        ("max_drawdown", format!("{:.6}", metrics.max_drawdown)),
        ("max_drawdown_duration", metrics.max_drawdown_duration.to_string()),
        ("trade_count", metrics.trade_count.to_string()),
        ("trades_won", metrics.trades_won.to_string()),
        ("trades_lost", metrics.trades_lost.to_string()),
        ("trades_breakeven", metrics.trades_breakeven.to_string()),
        ("win_rate", format!("{:.6}", metrics.win_rate)),
        ("profit_factor", format!("{:.6}", metrics.profit_factor)),
        ("avg_win", format!("{:.4}", metrics.avg_win)),
        ("avg_loss", format!("{:.4}", metrics.avg_loss)),
        ("largest_win", format!("{:.4}", metrics.largest_win)),
        ("largest_loss", format!("{:.4}", metrics.largest_loss)),
        ("avg_trade_duration", format!("{:.2}", metrics.avg_trade_duration)),
    ];

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["metric", "value"])?;
    for (name, value) in rows {
        wtr.write_record([name, value.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), ScoretraderError> {
        fs::create_dir_all(output_dir)?;

        let trades_path = output_dir.join(TRADES_FILE);
        write_trades(result, &trades_path).map_err(|e| csv_error(&trades_path, e))?;

        let equity_path = output_dir.join(EQUITY_FILE);
        write_equity(result, &equity_path).map_err(|e| csv_error(&equity_path, e))?;

        let metrics_path = output_dir.join(METRICS_FILE);
        write_metrics(metrics, &metrics_path).map_err(|e| csv_error(&metrics_path, e))?;

        tracing::info!(
            dir = %output_dir.display(),
            trades = result.trades.len(),
            equity_points = result.equity_curve.len(),
            "report written"
        );
        Ok(())
    }
}
