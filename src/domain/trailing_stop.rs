//! Trailing stop overlay.
//!
//! Long stop trails the highest close since entry, short stop trails the
//! lowest. The stop only ever tightens because the watermark only ratchets.

use crate::domain::indicator::{IndicatorReading, IndicatorType};
use crate::domain::indicator_ref::IndicatorRef;
use crate::domain::position::{Position, PositionSide};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailingStop {
    /// Stop at a fixed fraction below the high (above the low for shorts).
    Percent { trail_fraction: f64 },
    /// Stop at a multiple of ATR from the watermark.
    Atr { period: usize, multiplier: f64 },
}

impl TrailingStop {
    /// Stop level for `position` on this bar, `None` while ATR is undefined.
    pub fn stop_level(&self, position: &Position, reading: &IndicatorReading) -> Option<f64> {
        let offset = |anchor: f64| -> Option<f64> {
            match self {
                TrailingStop::Percent { trail_fraction } => Some(anchor * trail_fraction),
                TrailingStop::Atr { period, multiplier } => {
                    let atr = IndicatorRef::value(IndicatorType::Atr(*period)).resolve(reading)?;
                    Some(atr * multiplier)
                }
            }
        };

        match position.side {
            PositionSide::Long => {
                let high = position.highest_price_since_entry;
                Some(high - offset(high)?)
            }
            PositionSide::Short => {
                let low = position.lowest_price_since_entry;
                Some(low + offset(low)?)
            }
        }
    }

    /// Whether `close` breaches the stop. The watermark must already include
    /// this bar's close.
    pub fn is_breached(&self, position: &Position, close: f64, reading: &IndicatorReading) -> bool {
        match (self.stop_level(position, reading), position.side) {
            (Some(stop), PositionSide::Long) => close < stop,
            (Some(stop), PositionSide::Short) => close > stop,
            (None, _) => false,
        }
    }

    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        match self {
            TrailingStop::Percent { .. } => Vec::new(),
            TrailingStop::Atr { period, .. } => vec![IndicatorType::Atr(*period)],
        }
    }
}
