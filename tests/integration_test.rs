//! Integration tests for the backtest pipeline.
//!
//! Tests cover:
//! - Full pipeline with a mock data port and the built-in indicator engine
//! - Exact cash and equity bookkeeping on a known price path
//! - Crossover timing, trailing-stop priority and fill policies end to end
//! - Determinism and per-bar invariants over random price paths
//! - Report port receives the result

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use scoretrader::cli::run_backtest_pipeline;
use scoretrader::domain::backtest::{
    Backtest, BacktestConfig, BacktestResult, FillPolicy, run_backtest,
};
use scoretrader::domain::broker::SizingPolicy;
use scoretrader::domain::error::ScoretraderError;
use scoretrader::domain::indicator::engine::BuiltinIndicatorEngine;
use scoretrader::domain::indicator::{IndicatorReading, IndicatorType, IndicatorValue};
use scoretrader::domain::indicator_ref::IndicatorRef;
use scoretrader::domain::metrics::Metrics;
use scoretrader::domain::position::{ExitReason, PositionSide};
use scoretrader::domain::scorer::{Condition, ScoringRule};
use scoretrader::domain::state_machine::TradeState;
use scoretrader::domain::strategy::{Strategy, StrategyParams, TrailingStopKind};
use scoretrader::domain::trailing_stop::TrailingStop;
use scoretrader::ports::indicator_port::IndicatorEngine;
use scoretrader::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

const SCENARIO_CLOSES: [f64; 10] = [
    100.0, 95.0, 90.0, 85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0,
];

/// A gently oscillating uptrend long enough to warm every default indicator.
fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.2 * t + 8.0 * (t / 6.0).sin() + 3.0 * (t / 2.3).cos()
        })
        .collect()
}

fn wave_bars(n: usize) -> Vec<OhlcvBar> {
    let start = date(2023, 1, 2);
    wave_closes(n)
        .into_iter()
        .enumerate()
        .map(|(i, close)| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: close - 0.5,
            high: close + 1.5,
            low: close - 1.5,
            close,
            volume: 10_000,
        })
        .collect()
}

mod bookkeeping {
    use super::*;

    #[test]
    fn price_change_scenario_tracks_cash_and_equity_exactly() {
        let bars = bars_from_closes(&SCENARIO_CLOSES);
        let readings = empty_readings(&bars);
        let result =
            run_backtest(&bars, &readings, &price_change_strategy(), &unit_config(1_000.0))
                .unwrap();

        // buy the first down-tick at 95, sell the first up-tick at 90
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.side, PositionSide::Long);
        assert_eq!(trade.entry_bar, 1);
        assert_eq!(trade.exit_bar, 4);
        assert_relative_eq!(trade.entry_price, 95.0);
        assert_relative_eq!(trade.exit_price, 90.0);
        assert_relative_eq!(trade.profit_loss, -5.0);
        assert_eq!(trade.exit_reason, ExitReason::Signal);

        assert_relative_eq!(result.final_cash, 995.0);
        assert_eq!(
            equities(&result),
            vec![1000.0, 1000.0, 995.0, 990.0, 995.0, 995.0, 995.0, 995.0, 995.0, 995.0]
        );
        assert!(result.open_position.is_none());
    }

    #[test]
    fn metrics_follow_the_trade_log() {
        let bars = bars_from_closes(&SCENARIO_CLOSES);
        let readings = empty_readings(&bars);
        let result =
            run_backtest(&bars, &readings, &price_change_strategy(), &unit_config(1_000.0))
                .unwrap();
        let metrics = Metrics::compute(&result, 0.0);

        assert_eq!(metrics.trade_count, 1);
        assert_eq!(metrics.trades_lost, 1);
        assert_relative_eq!(metrics.win_rate, 0.0);
        assert_relative_eq!(metrics.total_return, -0.005);
        assert_relative_eq!(metrics.max_drawdown, 0.01);
        assert_relative_eq!(metrics.largest_loss, 5.0);
    }

    #[test]
    fn commission_and_rejection_on_small_account() {
        let bars = bars_from_closes(&[60.0, 50.0, 50.0, 48.0]);
        let readings = empty_readings(&bars);
        let config = BacktestConfig {
            commission_rate: 0.1,
            ..unit_config(50.0)
        };
        let result =
            run_backtest(&bars, &readings, &price_change_strategy(), &config).unwrap();

        // 50 + 5 and 48 + 4.8 both exceed 50 cash
        assert_eq!(result.rejected_orders, 2);
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_none());
        assert_relative_eq!(result.final_cash, 50.0);
    }

    #[test]
    fn force_close_books_end_of_data_trade() {
        let bars = bars_from_closes(&[100.0, 95.0, 90.0, 85.0]);
        let readings = empty_readings(&bars);

        let held =
            run_backtest(&bars, &readings, &price_change_strategy(), &unit_config(1_000.0))
                .unwrap();
        assert!(held.trades.is_empty());
        assert!(held.open_position.is_some());
        assert_relative_eq!(held.final_cash, 905.0);
        assert_relative_eq!(held.final_equity(), 990.0);

        let config = BacktestConfig {
            force_close_at_end: true,
            ..unit_config(1_000.0)
        };
        let closed = run_backtest(&bars, &readings, &price_change_strategy(), &config).unwrap();
        assert_eq!(closed.trades.len(), 1);
        assert_eq!(closed.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(closed.trades[0].exit_bar, 3);
        assert_relative_eq!(closed.final_cash, 990.0);
        assert_relative_eq!(closed.final_equity(), held.final_equity());
    }
}

mod timing {
    use super::*;

    #[test]
    fn crossover_fires_only_on_the_crossing_bar() {
        let bars = bars_from_closes(&[10.0; 10]);
        let fast = IndicatorType::Ema(3);
        let slow = IndicatorType::Ema(8);
        let fast_values = [1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0, 3.0];
        let readings: Vec<IndicatorReading> = bars
            .iter()
            .enumerate()
            .map(|(i, b)| {
                IndicatorReading::new(i, b.date)
                    .with(fast, IndicatorValue::Simple(fast_values[i]))
                    .with(slow, IndicatorValue::Simple(2.0))
            })
            .collect();
        let strategy = Strategy::new(
            "cross",
            1,
            vec![ScoringRule::new(
                "ema",
                Condition::Crossover {
                    fast: IndicatorRef::value(fast),
                    slow: IndicatorRef::value(slow),
                },
            )],
        );

        let result = run_backtest(&bars, &readings, &strategy, &unit_config(1_000.0)).unwrap();

        let position = result.open_position.expect("entered on the cross");
        assert_eq!(position.entry_bar, 5);
        assert!(result.trades.is_empty());
    }

    #[test]
    fn trailing_stop_exit_wins_over_sell_score() {
        let bars = bars_from_closes(&[100.0, 100.0, 110.0, 108.0, 95.0, 96.0]);
        let rsi = IndicatorType::Rsi(14);
        let readings = simple_readings(
            &bars,
            rsi,
            &[Some(50.0), Some(20.0), Some(50.0), Some(50.0), Some(85.0), Some(50.0)],
        );
        let strategy = Strategy::new(
            "rsi",
            1,
            vec![ScoringRule::new(
                "rsi",
                Condition::Extremity {
                    source: IndicatorRef::value(rsi),
                    oversold: 30.0,
                    overbought: 70.0,
                },
            )],
        )
        .with_trailing_stop(TrailingStop::Percent {
            trail_fraction: 0.1,
        });

        let result = run_backtest(&bars, &readings, &strategy, &unit_config(1_000.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_bar, 1);
        // highest 110 puts the stop at 99; 108 holds, 95 breaks it
        assert_eq!(trade.exit_bar, 4);
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_relative_eq!(trade.exit_price, 95.0);
    }

    #[test]
    fn next_bar_open_fills_at_following_open() {
        let bars = vec![
            make_bar("2024-01-01", 100.0, 100.0),
            make_bar("2024-01-02", 99.0, 95.0),
            make_bar("2024-01-03", 93.0, 97.0),
            make_bar("2024-01-04", 97.0, 99.0),
            make_bar("2024-01-05", 101.0, 100.0),
        ];
        let readings = empty_readings(&bars);
        let config = BacktestConfig {
            fill_policy: FillPolicy::NextBarOpen,
            ..unit_config(1_000.0)
        };

        let result = run_backtest(&bars, &readings, &price_change_strategy(), &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        // signal on bar 1, filled at bar 2 open; bar 2 takes no decision
        assert_eq!(trade.entry_bar, 2);
        assert_relative_eq!(trade.entry_price, 93.0);
        // up-tick on bar 3, filled at bar 4 open
        assert_eq!(trade.exit_bar, 4);
        assert_relative_eq!(trade.exit_price, 101.0);
        assert_relative_eq!(result.final_cash, 1_008.0);
    }

    #[test]
    fn next_bar_open_watermark_includes_fill_bar_close() {
        let bars = vec![
            make_bar("2024-01-01", 100.0, 100.0),
            make_bar("2024-01-02", 100.0, 100.0),
            make_bar("2024-01-03", 100.0, 120.0),
            make_bar("2024-01-04", 110.0, 105.0),
            make_bar("2024-01-05", 104.0, 105.0),
        ];
        let rsi = IndicatorType::Rsi(14);
        let readings = simple_readings(
            &bars,
            rsi,
            &[Some(50.0), Some(20.0), Some(50.0), Some(50.0), Some(50.0)],
        );
        let strategy = Strategy::new(
            "rsi",
            1,
            vec![ScoringRule::new(
                "rsi",
                Condition::Extremity {
                    source: IndicatorRef::value(rsi),
                    oversold: 30.0,
                    overbought: 70.0,
                },
            )],
        )
        .with_trailing_stop(TrailingStop::Percent {
            trail_fraction: 0.1,
        });
        let config = BacktestConfig {
            fill_policy: FillPolicy::NextBarOpen,
            ..unit_config(1_000.0)
        };

        let result = run_backtest(&bars, &readings, &strategy, &config).unwrap();

        // entry fills at 100 on bar 2, which closes at 120: stop 108
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_bar, 2);
        assert_relative_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_eq!(trade.exit_bar, 4);
        assert_relative_eq!(trade.exit_price, 104.0);
    }

    #[test]
    fn partial_run_returns_processed_bars_only() {
        let bars = bars_from_closes(&SCENARIO_CLOSES);
        let readings = empty_readings(&bars);
        let strategy = price_change_strategy();
        let config = unit_config(1_000.0);

        let mut backtest = Backtest::new(&config, &strategy, &bars, &readings).unwrap();
        for _ in 0..3 {
            assert!(backtest.step().unwrap());
        }
        assert!(matches!(backtest.trade_state(), TradeState::Open(_)));
        let partial = backtest.finish();

        assert_eq!(partial.equity_curve.len(), 3);
        assert!(partial.trades.is_empty());
        assert!(partial.open_position.is_some());
    }

    #[test]
    fn misaligned_readings_abort_the_run() {
        let bars = bars_from_closes(&SCENARIO_CLOSES);
        let mut readings = empty_readings(&bars);
        readings.swap(3, 4);

        let err =
            run_backtest(&bars, &readings, &price_change_strategy(), &unit_config(1_000.0))
                .unwrap_err();
        assert!(matches!(err, ScoretraderError::Invariant { bar_index: 3, .. }));
        assert!(!err.is_recoverable());
    }
}

mod full_pipeline {
    use super::*;

    #[test]
    fn default_strategy_runs_end_to_end_with_builtin_engine() {
        let bars = wave_bars(300);
        let port = MockDataPort::new().with_bars("WAVE", bars.clone());
        let params = StrategyParams {
            required_score: 2,
            trailing_stop: TrailingStopKind::Atr,
            ..StrategyParams::default()
        };
        let config = BacktestConfig {
            sizing: SizingPolicy::PercentOfEquity(0.5),
            commission_rate: 0.001,
            ..BacktestConfig::default()
        };

        let run = run_backtest_pipeline(&port, &BuiltinIndicatorEngine, &config, &params, "WAVE")
            .unwrap();

        assert_eq!(run.result.equity_curve.len(), bars.len());
        assert!(run.result.equity_curve.iter().all(|p| p.equity > 0.0));
        assert_eq!(run.metrics.trade_count, run.result.trades.len());
        for pair in run.result.trades.windows(2) {
            assert!(pair[0].exit_bar <= pair[1].entry_bar);
        }
    }

    #[test]
    fn warmup_bars_record_equity_without_orders() {
        let bars = wave_bars(20);
        let port = MockDataPort::new().with_bars("WAVE", bars);
        // MACD(12,26,9) is never defined on 20 bars
        let params = StrategyParams {
            required_score: 1,
            ..StrategyParams::default()
        };

        let run = run_backtest_pipeline(
            &port,
            &BuiltinIndicatorEngine,
            &BacktestConfig::default(),
            &params,
            "WAVE",
        )
        .unwrap();

        assert_eq!(run.result.equity_curve.len(), 20);
        assert!(run.result.trades.is_empty());
        assert!(run.result.open_position.is_none());
        assert!(equities(&run.result).iter().all(|&e| e == 100_000.0));
    }

    #[test]
    fn date_range_clips_bars() {
        let bars = wave_bars(60);
        let port = MockDataPort::new().with_bars("WAVE", bars);
        let params = StrategyParams {
            enable_price_change: true,
            ..StrategyParams::default()
        };
        let config = BacktestConfig {
            start_date: Some(date(2023, 1, 12)),
            end_date: Some(date(2023, 1, 21)),
            ..BacktestConfig::default()
        };

        let run = run_backtest_pipeline(&port, &BuiltinIndicatorEngine, &config, &params, "WAVE")
            .unwrap();
        assert_eq!(run.result.equity_curve.len(), 10);
        assert_eq!(run.result.equity_curve[0].date, date(2023, 1, 12));
    }

    #[test]
    fn unknown_symbol_is_no_data() {
        let port = MockDataPort::new();
        let err = run_backtest_pipeline(
            &port,
            &BuiltinIndicatorEngine,
            &BacktestConfig::default(),
            &StrategyParams::default(),
            "NONE",
        )
        .unwrap_err();
        assert!(matches!(err, ScoretraderError::NoData { .. }));
    }

    #[test]
    fn atr_stop_still_fires_after_a_missing_close() {
        let mut closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        closes.extend([106.0; 7]);
        closes.push(f64::NAN);
        closes.extend([60.0, 50.0, 40.0]);
        let bars = bars_from_closes(&closes);
        let strategy = price_change_strategy().with_trailing_stop(TrailingStop::Atr {
            period: 5,
            multiplier: 2.0,
        });
        let readings = BuiltinIndicatorEngine
            .compute(&bars, &strategy.required_indicators())
            .unwrap();

        let atr = IndicatorType::Atr(5);
        assert!(!readings[15].is_defined(&atr));
        for reading in &readings[16..] {
            match reading.get(&atr) {
                Some(IndicatorValue::Simple(v)) => assert!(v.is_finite()),
                other => panic!("ATR undefined after the gap: {other:?}"),
            }
        }

        let result = run_backtest(&bars, &readings, &strategy, &unit_config(1_000.0)).unwrap();

        // long from the bar 8 down-tick, the crash on bar 16 breaks the stop
        let trade = &result.trades[0];
        assert_eq!(trade.entry_bar, 8);
        assert_eq!(trade.exit_bar, 16);
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_relative_eq!(trade.exit_price, 60.0);
        assert!(equities(&result).iter().all(|e| e.is_finite()));
    }

    #[test]
    fn builtin_engine_returns_one_reading_per_bar() {
        let bars = wave_bars(80);
        let strategy = StrategyParams::default().build();
        let readings = BuiltinIndicatorEngine
            .compute(&bars, &strategy.required_indicators())
            .unwrap();

        assert_eq!(readings.len(), bars.len());
        for (i, (reading, bar)) in readings.iter().zip(&bars).enumerate() {
            assert_eq!(reading.bar_index, i);
            assert_eq!(reading.date, bar.date);
        }
        let last = readings.last().unwrap();
        for indicator in strategy.required_indicators() {
            assert!(last.is_defined(&indicator), "{indicator} undefined at the end");
        }
    }
}

mod determinism {
    use super::*;

    fn run_once(bars: &[OhlcvBar]) -> BacktestResult {
        let strategy = StrategyParams {
            required_score: 2,
            trailing_stop: TrailingStopKind::Percent,
            ..StrategyParams::default()
        }
        .build();
        let readings = BuiltinIndicatorEngine
            .compute(bars, &strategy.required_indicators())
            .unwrap();
        let config = BacktestConfig {
            allow_shorting: true,
            ..BacktestConfig::default()
        };
        run_backtest(bars, &readings, &strategy, &config).unwrap()
    }

    #[test]
    fn replay_is_identical() {
        let bars = wave_bars(250);
        assert_eq!(run_once(&bars), run_once(&bars));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_order_one_position_and_non_negative_equity(
        closes in prop::collection::vec(1.0f64..200.0, 2..80),
        commission_rate in 0.0f64..0.02,
        fraction in 0.1f64..1.0,
        next_open in any::<bool>(),
    ) {
        let bars = bars_from_closes(&closes);
        let readings = empty_readings(&bars);
        let strategy = price_change_strategy();
        let config = BacktestConfig {
            commission_rate,
            sizing: SizingPolicy::PercentOfEquity(fraction),
            fill_policy: if next_open {
                FillPolicy::NextBarOpen
            } else {
                FillPolicy::SameBarClose
            },
            ..BacktestConfig::default()
        };

        let mut backtest = Backtest::new(&config, &strategy, &bars, &readings).unwrap();
        let mut steps = 0;
        while backtest.step().unwrap() {
            steps += 1;
            match backtest.trade_state() {
                TradeState::Flat | TradeState::Open(_) => {}
                TradeState::PendingEntry(_) | TradeState::PendingExit { .. } => {
                    prop_assert!(next_open, "order left pending under same-bar fills");
                }
            }
            prop_assert!(backtest.cash() >= -1e-9);
            prop_assert_eq!(backtest.equity_curve().len(), steps);
            let last = backtest.equity_curve().last().unwrap();
            prop_assert!(last.equity >= -1e-9);
        }

        let result = backtest.finish();
        prop_assert_eq!(result.equity_curve.len(), bars.len());
        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_bar <= pair[1].entry_bar);
        }
    }
}

struct RecordingReportPort {
    calls: RefCell<Vec<(BacktestResult, Metrics, PathBuf)>>,
}

impl RecordingReportPort {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for RecordingReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), ScoretraderError> {
        self.calls
            .borrow_mut()
            .push((result.clone(), metrics.clone(), output_dir.to_path_buf()));
        Ok(())
    }
}

mod report_generation {
    use super::*;

    #[test]
    fn report_receives_result_and_metrics() {
        let bars = bars_from_closes(&SCENARIO_CLOSES);
        let port = MockDataPort::new().with_bars("SCN", bars);
        let params = StrategyParams {
            required_score: 1,
            enable_rsi: false,
            enable_stochastic: false,
            enable_bollinger: false,
            enable_cci: false,
            enable_macd: false,
            enable_ema: false,
            enable_adx: false,
            enable_price_change: true,
            ..StrategyParams::default()
        };
        let config = unit_config(1_000.0);
        let run = run_backtest_pipeline(&port, &BuiltinIndicatorEngine, &config, &params, "SCN")
            .unwrap();

        let reporter = RecordingReportPort::new();
        reporter
            .write(&run.result, &run.metrics, Path::new("out"))
            .unwrap();

        let calls = reporter.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.trades.len(), 1);
        assert_eq!(calls[0].1.trade_count, 1);
        assert_eq!(calls[0].2, PathBuf::from("out"));
        assert_relative_eq!(calls[0].0.final_cash, 995.0);
    }
}
