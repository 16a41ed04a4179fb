//! Slow Stochastic Oscillator.
//!
//! Raw %K = (close - lowest low) / (highest high - lowest low) × 100 over
//! `k_period` bars, 50 when the range is zero.
//! %K = SMA(d_period) of raw %K, %D = SMA(d_period) of %K.
//! Warmup: (k_period - 1) + 2 × (d_period - 1) bars.

use crate::domain::indicator::ema::sma_of_defined;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(
    bars: &[OhlcvBar],
    k_period: usize,
    d_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    let blank = IndicatorValue::Stochastic { k: 0.0, d: 0.0 };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars, blank);
    }

    let raw_k: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range == 0.0 {
                Some(50.0)
            } else {
                Some((bars[i].close - lowest) / range * 100.0)
            }
        })
        .collect();
    let slow_k = sma_of_defined(&raw_k, d_period);
    let slow_d = sma_of_defined(&slow_k, d_period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (slow_k[i], slow_d[i]) {
            (Some(k), Some(d)) => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Stochastic { k, d },
            },
            _ => IndicatorPoint {
                date: bar.date,
                valid: false,
                value: blank,
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
