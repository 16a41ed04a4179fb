//! Technical indicator types and the built-in indicator engine.
//!
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//! - `IndicatorReading`: Every defined indicator value for one bar
//!
//! The backtest core only ever sees [`IndicatorReading`]s. The calculation
//! modules below sit behind [`crate::ports::indicator_port::IndicatorEngine`].

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod stochastic;

pub use ema::calculate_ema;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
}

impl IndicatorValue {
    /// Every component is a finite number.
    pub fn is_finite(&self) -> bool {
        match *self {
            IndicatorValue::Simple(v) => v.is_finite(),
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => line.is_finite() && signal.is_finite() && histogram.is_finite(),
            IndicatorValue::Stochastic { k, d } => k.is_finite() && d.is_finite(),
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => upper.is_finite() && middle.is_finite() && lower.is_finite(),
            IndicatorValue::Adx {
                adx,
                plus_di,
                minus_di,
            } => adx.is_finite() && plus_di.is_finite() && minus_di.is_finite(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Cci(usize),
    Adx(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// A series of `bars.len()` invalid points, used when parameters make the
    /// indicator uncomputable.
    pub(crate) fn undefined(
        indicator_type: IndicatorType,
        bars: &[OhlcvBar],
        blank: IndicatorValue,
    ) -> Self {
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    date: b.date,
                    valid: false,
                    value: blank,
                })
                .collect(),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Cci(period) => write!(f, "CCI({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Indicator values for a single bar.
///
/// An indicator missing from `values` is undefined on this bar (still warming
/// up, or not requested).
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReading {
    pub bar_index: usize,
    pub date: NaiveDate,
    pub values: HashMap<IndicatorType, IndicatorValue>,
}

impl IndicatorReading {
    pub fn new(bar_index: usize, date: NaiveDate) -> Self {
        IndicatorReading {
            bar_index,
            date,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, indicator_type: IndicatorType, value: IndicatorValue) -> Self {
        self.values.insert(indicator_type, value);
        self
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorValue> {
        self.values.get(indicator_type)
    }

    pub fn is_defined(&self, indicator_type: &IndicatorType) -> bool {
        self.values.contains_key(indicator_type)
    }
}

/// Pivot a set of per-indicator series into per-bar readings.
///
/// Points past the end of a short series, points flagged invalid and points
/// holding a non-finite number are left out of the reading.
pub fn to_readings(bars: &[OhlcvBar], series: &[IndicatorSeries]) -> Vec<IndicatorReading> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut reading = IndicatorReading::new(i, bar.date);
            for s in series {
                if let Some(point) = s.values.get(i).filter(|p| p.valid && p.value.is_finite()) {
                    reading.values.insert(s.indicator_type, point.value);
                }
            }
            reading
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn indicator_type_display_rsi() {
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn indicator_type_hash_eq() {
        let mut map = HashMap::new();
        let ema12 = IndicatorType::Ema(12);
        let ema26 = IndicatorType::Ema(26);

        map.insert(ema12, "ema12_series".to_string());
        map.insert(ema26, "ema26_series".to_string());

        assert_eq!(map.get(&IndicatorType::Ema(12)), Some(&"ema12_series".to_string()));
        assert_eq!(map.get(&ema26), Some(&"ema26_series".to_string()));
        assert_eq!(map.get(&IndicatorType::Ema(50)), None);
    }

    #[test]
    fn to_readings_skips_invalid_points() {
        let bars: Vec<OhlcvBar> = (1..=3)
            .map(|d| OhlcvBar {
                date: day(d),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0,
            })
            .collect();
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Rsi(2),
            values: vec![
                IndicatorPoint {
                    date: day(1),
                    valid: false,
                    value: IndicatorValue::Simple(0.0),
                },
                IndicatorPoint {
                    date: day(2),
                    valid: true,
                    value: IndicatorValue::Simple(40.0),
                },
            ],
        };

        let readings = to_readings(&bars, &[series]);
        assert_eq!(readings.len(), 3);
        assert!(!readings[0].is_defined(&IndicatorType::Rsi(2)));
        assert_eq!(
            readings[1].get(&IndicatorType::Rsi(2)),
            Some(&IndicatorValue::Simple(40.0))
        );
        // series shorter than the bars: undefined, not a panic
        assert!(!readings[2].is_defined(&IndicatorType::Rsi(2)));
        assert_eq!(readings[2].bar_index, 2);
        assert_eq!(readings[2].date, day(3));
    }

    #[test]
    fn to_readings_drops_non_finite_values() {
        let bars: Vec<OhlcvBar> = (1..=2)
            .map(|d| OhlcvBar {
                date: day(d),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0,
            })
            .collect();
        let macd = IndicatorType::Macd {
            fast: 2,
            slow: 3,
            signal: 2,
        };
        let series = IndicatorSeries {
            indicator_type: macd,
            values: vec![
                IndicatorPoint {
                    date: day(1),
                    valid: true,
                    value: IndicatorValue::Macd {
                        line: 1.0,
                        signal: f64::NAN,
                        histogram: 0.5,
                    },
                },
                IndicatorPoint {
                    date: day(2),
                    valid: true,
                    value: IndicatorValue::Macd {
                        line: 1.0,
                        signal: 0.5,
                        histogram: 0.5,
                    },
                },
            ],
        };

        let readings = to_readings(&bars, &[series]);
        assert!(!readings[0].is_defined(&macd));
        assert!(readings[1].is_defined(&macd));
    }
}
