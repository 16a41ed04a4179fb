//! Average True Range with Wilder smoothing.
//!
//! Seed is the mean true range of the first `period` bars (the first bar's
//! true range is its high-low span), then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let blank = IndicatorValue::Simple(0.0);
    if period == 0 {
        return IndicatorSeries::undefined(IndicatorType::Atr(period), bars, blank);
    }

    let true_ranges = true_ranges(bars);
    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: false,
                value: blank,
            });
            continue;
        }

        atr = if i + 1 == period {
            true_ranges[..=i].iter().sum::<f64>() / period as f64
        } else {
            (atr * (period - 1) as f64 + true_ranges[i]) / period as f64
        };
        values.push(IndicatorPoint {
            date: bar.date,
            valid: true,
            value: IndicatorValue::Simple(atr),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

pub(crate) fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| match i {
            0 => bar.high - bar.low,
            _ => bar.true_range(bars[i - 1].close),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{hlc_bars, simple};

    #[test]
    fn atr_warmup() {
        let bars = hlc_bars(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_atr(&bars, 3);

        let valid: Vec<bool> = series.values.iter().map(|p| p.valid).collect();
        assert_eq!(valid, vec![false, false, true, true, true]);
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = hlc_bars(&[(110.0, 90.0, 100.0), (115.0, 95.0, 105.0), (112.0, 98.0, 100.0)]);
        // TR: 20, max(20, 15, 5) = 20, max(14, 7, 7) = 14
        let series = calculate_atr(&bars, 3);
        let expected = (20.0 + 20.0 + 14.0) / 3.0;
        assert!((simple(&series.values[2].value) - expected).abs() < 1e-12);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = hlc_bars(&[
            (110.0, 90.0, 100.0),
            (110.0, 90.0, 100.0),
            (110.0, 90.0, 100.0),
            (130.0, 100.0, 120.0),
        ]);
        let series = calculate_atr(&bars, 3);
        // seed 20, next TR = max(30, 30, 0) = 30 → (20*2 + 30)/3
        let expected = (20.0 * 2.0 + 30.0) / 3.0;
        assert!((simple(&series.values[3].value) - expected).abs() < 1e-12);
    }

    #[test]
    fn atr_short_input_is_aligned() {
        let bars = hlc_bars(&[(110.0, 90.0, 100.0); 2]);
        let series = calculate_atr(&bars, 14);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
