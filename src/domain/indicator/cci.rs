//! Commodity Channel Index.
//!
//! CCI = (TP - SMA(TP)) / (0.015 × mean deviation), TP = (H + L + C) / 3.
//! A zero mean deviation reads 0. Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

const LAMBERT_CONSTANT: f64 = 0.015;

pub fn calculate_cci(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let blank = IndicatorValue::Simple(0.0);
    if period == 0 {
        return IndicatorSeries::undefined(IndicatorType::Cci(period), bars, blank);
    }

    let typical: Vec<f64> = bars.iter().map(OhlcvBar::typical_price).collect();
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i + 1 < period {
                return IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: blank,
                };
            }
            let window = &typical[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let mean_dev = window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
            let cci = if mean_dev == 0.0 {
                0.0
            } else {
                (typical[i] - mean) / (LAMBERT_CONSTANT * mean_dev)
            };
            IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Simple(cci),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Cci(period),
        values,
    }
}
