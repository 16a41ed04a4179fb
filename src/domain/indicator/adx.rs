//! Average Directional Index with the +DI / -DI lines.
//!
//! Directional movement and true range are Wilder-smoothed over `period`
//! (first value is the plain sum of `period` moves), then
//! DX = 100 × |+DI - -DI| / (+DI + -DI) and ADX is the Wilder average of DX.
//! Warmup: first (2 × period - 1) bars are invalid.

use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let blank = IndicatorValue::Adx {
        adx: 0.0,
        plus_di: 0.0,
        minus_di: 0.0,
    };
    if period == 0 || bars.len() < 2 {
        return IndicatorSeries::undefined(IndicatorType::Adx(period), bars, blank);
    }

    let tr = true_ranges(bars);
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint {
            date: b.date,
            valid: false,
            value: blank,
        })
        .collect();

    let p = period as f64;
    let (mut s_tr, mut s_plus, mut s_minus) = (0.0, 0.0, 0.0);
    let mut dx_sum = 0.0;
    let mut adx = 0.0;

    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };

        if i <= period {
            s_tr += tr[i];
            s_plus += plus_dm;
            s_minus += minus_dm;
            if i < period {
                continue;
            }
        } else {
            s_tr = s_tr - s_tr / p + tr[i];
            s_plus = s_plus - s_plus / p + plus_dm;
            s_minus = s_minus - s_minus / p + minus_dm;
        }

        let (plus_di, minus_di) = if s_tr == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };

        // DX exists from index `period`; ADX needs `period` of them.
        let dx_seen = i + 1 - period;
        if dx_seen < period {
            dx_sum += dx;
            continue;
        }
        adx = if dx_seen == period {
            (dx_sum + dx) / p
        } else {
            (adx * (p - 1.0) + dx) / p
        };
        values[i] = IndicatorPoint {
            date: bars[i].date,
            valid: true,
            value: IndicatorValue::Adx {
                adx,
                plus_di,
                minus_di,
            },
        };
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
