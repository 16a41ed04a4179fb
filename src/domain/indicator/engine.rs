//! Built-in indicator engine backed by the calculation modules in this crate.

use crate::domain::error::ScoretraderError;
use crate::domain::indicator::adx::calculate_adx;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::cci::calculate_cci;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::macd::calculate_macd;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::stochastic::calculate_stochastic;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorReading, IndicatorSeries, IndicatorType, IndicatorValue, to_readings,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::indicator_port::IndicatorEngine;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIndicatorEngine;

impl BuiltinIndicatorEngine {
    pub fn series(bars: &[OhlcvBar], indicator_type: IndicatorType) -> IndicatorSeries {
        match indicator_type {
            IndicatorType::Ema(period) => calculate_ema(bars, period),
            IndicatorType::Rsi(period) => calculate_rsi(bars, period),
            IndicatorType::Atr(period) => calculate_atr(bars, period),
            IndicatorType::Cci(period) => calculate_cci(bars, period),
            IndicatorType::Adx(period) => calculate_adx(bars, period),
            IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
            IndicatorType::Stochastic { k_period, d_period } => {
                calculate_stochastic(bars, k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => calculate_bollinger(bars, period, stddev_mult_x100),
        }
    }
}

impl IndicatorEngine for BuiltinIndicatorEngine {
    fn compute(
        &self,
        bars: &[OhlcvBar],
        requirements: &[IndicatorType],
    ) -> Result<Vec<IndicatorReading>, ScoretraderError> {
        let mut wanted = requirements.to_vec();
        wanted.sort();
        wanted.dedup();

        let complete: Vec<usize> = bars
            .iter()
            .enumerate()
            .filter(|(_, bar)| bar.missing_field().is_none())
            .map(|(i, _)| i)
            .collect();

        let series = wanted
            .iter()
            .map(|&indicator_type| series_skipping_gaps(bars, &complete, indicator_type))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            indicators = wanted.len(),
            bars = bars.len(),
            gaps = bars.len() - complete.len(),
            "computed indicator readings"
        );
        Ok(to_readings(bars, &series))
    }
}

/// Compute over the complete bars only, then lay the points back onto the
/// full history. Gap bars are undefined and never enter a running average.
fn series_skipping_gaps(
    bars: &[OhlcvBar],
    complete: &[usize],
    indicator_type: IndicatorType,
) -> Result<IndicatorSeries, ScoretraderError> {
    let has_gaps = complete.len() != bars.len();
    let computed = if has_gaps {
        let compact: Vec<OhlcvBar> = complete.iter().map(|&i| bars[i].clone()).collect();
        BuiltinIndicatorEngine::series(&compact, indicator_type)
    } else {
        BuiltinIndicatorEngine::series(bars, indicator_type)
    };

    if computed.values.len() != complete.len() {
        return Err(ScoretraderError::invariant(
            computed.values.len().min(complete.len()),
            format!(
                "{} produced {} points for {} bars",
                indicator_type,
                computed.values.len(),
                complete.len()
            ),
        ));
    }
    if !has_gaps {
        return Ok(computed);
    }

    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|bar| IndicatorPoint {
            date: bar.date,
            valid: false,
            value: IndicatorValue::Simple(f64::NAN),
        })
        .collect();
    for (&i, point) in complete.iter().zip(computed.values) {
        values[i] = point;
    }
    Ok(IndicatorSeries {
        indicator_type,
        values,
    })
}
