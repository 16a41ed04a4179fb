//! Bollinger Bands indicator.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    let blank = IndicatorValue::Bollinger {
        upper: 0.0,
        middle: 0.0,
        lower: 0.0,
    };
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars, blank);
    }

    let mult = stddev_mult_x100 as f64 / 100.0;
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: false,
                value: blank,
            });
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let middle = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|b| (b.close - middle).powi(2))
            .sum::<f64>()
            / period as f64;
        let band = mult * variance.sqrt();

        values.push(IndicatorPoint {
            date: bar.date,
            valid: true,
            value: IndicatorValue::Bollinger {
                upper: middle + band,
                middle,
                lower: middle - band,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Encode a band multiplier as hundredths so it can key a `HashMap`.
pub fn multiplier_x100(multiplier: f64) -> u32 {
    (multiplier * 100.0).round().max(0.0) as u32
}
