#![allow(dead_code)]

use chrono::NaiveDate;
use scoretrader::domain::backtest::BacktestConfig;
use scoretrader::domain::broker::SizingPolicy;
use scoretrader::domain::error::ScoretraderError;
use scoretrader::domain::indicator::{IndicatorReading, IndicatorType, IndicatorValue};
pub use scoretrader::domain::ohlcv::OhlcvBar;
use scoretrader::domain::scorer::{Condition, ScoringRule};
use scoretrader::domain::strategy::Strategy;
use scoretrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, ScoretraderError> {
        let bars: Vec<OhlcvBar> = self
            .data
            .get(symbol)
            .into_iter()
            .flatten()
            .filter(|b| start_date.is_none_or(|s| b.date >= s))
            .filter(|b| end_date.is_none_or(|e| b.date <= e))
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(ScoretraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScoretraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, open: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1000,
    }
}

/// Consecutive daily bars from 2024-01-01, open equal to close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        })
        .collect()
}

/// Readings with nothing defined.
pub fn empty_readings(bars: &[OhlcvBar]) -> Vec<IndicatorReading> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| IndicatorReading::new(i, b.date))
        .collect()
}

/// One simple indicator series laid onto readings; `None` is undefined.
pub fn simple_readings(
    bars: &[OhlcvBar],
    indicator_type: IndicatorType,
    values: &[Option<f64>],
) -> Vec<IndicatorReading> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            let reading = IndicatorReading::new(i, b.date);
            match values.get(i).copied().flatten() {
                Some(v) => reading.with(indicator_type, IndicatorValue::Simple(v)),
                None => reading,
            }
        })
        .collect()
}

/// Buys on a down-tick, sells on an up-tick.
pub fn price_change_strategy() -> Strategy {
    Strategy::new(
        "price change",
        1,
        vec![ScoringRule::new("price_change", Condition::PriceChange)],
    )
}

pub fn unit_config(initial_capital: f64) -> BacktestConfig {
    BacktestConfig {
        initial_capital,
        sizing: SizingPolicy::FixedUnits(1),
        ..BacktestConfig::default()
    }
}

pub fn equities(result: &scoretrader::domain::backtest::BacktestResult) -> Vec<f64> {
    result.equity_curve.iter().map(|p| p.equity).collect()
}
