//! References into a bar's indicator reading.
//!
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `IndicatorRef`: An indicator with a specific field

use crate::domain::indicator::{IndicatorReading, IndicatorType, IndicatorValue};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    Adx,
    PlusDi,
    MinusDi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl IndicatorRef {
    pub fn new(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        IndicatorRef {
            indicator_type,
            field,
        }
    }

    /// Single-valued indicator (EMA, RSI, ATR, CCI).
    pub fn value(indicator_type: IndicatorType) -> Self {
        Self::new(indicator_type, IndicatorField::Value)
    }

    /// The referenced number on this reading, `None` while undefined.
    pub fn resolve(&self, reading: &IndicatorReading) -> Option<f64> {
        reading
            .get(&self.indicator_type)
            .and_then(|value| extract_field(value, self.field))
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            IndicatorField::Value => write!(f, "{}", self.indicator_type),
            field => write!(f, "{}.{:?}", self.indicator_type, field),
        }
    }
}

/// Pull one field out of an indicator value; a field the shape lacks is `None`.
pub fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    let v = match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => *v,
        (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => *line,
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => *signal,
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => *histogram,
        (IndicatorValue::Stochastic { k, .. }, IndicatorField::StochasticK) => *k,
        (IndicatorValue::Stochastic { d, .. }, IndicatorField::StochasticD) => *d,
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => *upper,
        (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => *middle,
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => *lower,
        (IndicatorValue::Adx { adx, .. }, IndicatorField::Adx) => *adx,
        (IndicatorValue::Adx { plus_di, .. }, IndicatorField::PlusDi) => *plus_di,
        (IndicatorValue::Adx { minus_di, .. }, IndicatorField::MinusDi) => *minus_di,
        _ => return None,
    };
    Some(v)
}
