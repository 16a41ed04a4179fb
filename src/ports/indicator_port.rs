//! Indicator engine port trait.

use crate::domain::error::ScoretraderError;
use crate::domain::indicator::{IndicatorReading, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// Turns a bar history into per-bar indicator readings.
///
/// Implementations must return exactly `bars.len()` readings, reading `i`
/// carrying `bar_index == i` and `bars[i].date`. Values for bar `i` may only
/// depend on `bars[..=i]`.
pub trait IndicatorEngine {
    fn compute(
        &self,
        bars: &[OhlcvBar],
        requirements: &[IndicatorType],
    ) -> Result<Vec<IndicatorReading>, ScoretraderError>;
}
