//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let smoothed = ema_values(&closes, period);

    let values = bars
        .iter()
        .zip(smoothed)
        .map(|(bar, ema)| IndicatorPoint {
            date: bar.date,
            valid: ema.is_some_and(f64::is_finite),
            value: IndicatorValue::Simple(ema.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over a raw value stream, `None` during warmup.
///
/// Leading `None` inputs are skipped: the SMA seed starts at the first
/// defined input, so chained smoothing (MACD signal) warms up correctly.
pub(crate) fn ema_values(input: &[f64], period: usize) -> Vec<Option<f64>> {
    smooth(input.iter().map(|&v| Some(v)), input.len(), period)
}

pub(crate) fn ema_of_defined(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    smooth(input.iter().copied(), input.len(), period)
}

fn smooth(
    input: impl Iterator<Item = Option<f64>>,
    len: usize,
    period: usize,
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(len);
    if period == 0 {
        out.resize(len, None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut seen = 0usize;
    let mut sum = 0.0;
    let mut ema = 0.0;

    for value in input {
        let Some(v) = value else {
            out.push(None);
            continue;
        };
        seen += 1;
        if seen < period {
            sum += v;
            out.push(None);
        } else if seen == period {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

/// Simple moving average over the defined tail of `input`.
pub(crate) fn sma_of_defined(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(input.len());
    let mut window: Vec<f64> = Vec::with_capacity(period);
    for value in input {
        match value {
            Some(v) if period > 0 => {
                window.push(*v);
                if window.len() > period {
                    window.remove(0);
                }
                if window.len() == period {
                    out.push(Some(window.iter().sum::<f64>() / period as f64));
                } else {
                    out.push(None);
                }
            }
            _ => out.push(None),
        }
    }
    out
}
