//! Performance metrics and statistics.
//!
//! Pure functions of a [`BacktestResult`]; every ratio is guarded against
//! empty input and division by zero.

use super::backtest::{BacktestResult, EquityPoint};
use super::position::TradeRecord;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Mean over standard deviation of per-bar returns, not annualized.
    pub risk_adjusted_return: Option<f64>,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest stretch below a prior peak, in bars.
    pub max_drawdown_duration: i64,
    pub trade_count: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    /// won / (won + lost); breakeven trades are not decisive.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Calendar days.
    pub avg_trade_duration: f64,
}

impl Metrics {
    pub fn compute(result: &BacktestResult, risk_free_rate: f64) -> Self {
        let equity_curve = &result.equity_curve;
        let initial_capital = result.initial_capital;
        let final_equity = result.final_equity();

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let trading_days = equity_curve.len() as f64;
        let years = trading_days / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let returns = bar_returns(equity_curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns, daily_rf);
        let risk_adjusted_return = mean_over_stdev(&returns);

        let stats = TradeStats::from_trades(&result.trades);
        let decisive = stats.won + stats.lost;
        let win_rate = if decisive > 0 {
            stats.won as f64 / decisive as f64
        } else {
            0.0
        };

        let profit_factor = if stats.total_losses > 0.0 {
            stats.total_wins / stats.total_losses
        } else if stats.total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if stats.won > 0 {
            stats.total_wins / stats.won as f64
        } else {
            0.0
        };

        let avg_loss = if stats.lost > 0 {
            stats.total_losses / stats.lost as f64
        } else {
            0.0
        };

        let trade_count = result.trades.len();
        let avg_trade_duration = if trade_count > 0 {
            stats.total_duration_days as f64 / trade_count as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            risk_adjusted_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            trade_count,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_trade_duration,
        }
    }
}

#[derive(Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    breakeven: usize,
    total_wins: f64,
    total_losses: f64,
    largest_win: f64,
    largest_loss: f64,
    total_duration_days: i64,
}

impl TradeStats {
    fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            let pnl = trade.profit_loss;
            if pnl > 0.0 {
                stats.won += 1;
                stats.total_wins += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
            } else if pnl < 0.0 {
                stats.lost += 1;
                stats.total_losses += pnl.abs();
                stats.largest_loss = stats.largest_loss.max(pnl.abs());
            } else {
                stats.breakeven += 1;
            }
            stats.total_duration_days += trade.holding_days();
        }
        stats
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn mean_and_stddev(returns: &[f64]) -> (f64, f64) {
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn mean_over_stdev(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let (mean, stddev) = mean_and_stddev(returns);
    (stddev > 0.0).then(|| mean / stddev)
}

fn compute_risk_adjusted(returns: &[f64], daily_rf: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let (mean, stddev) = mean_and_stddev(returns);
    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
