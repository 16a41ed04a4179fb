//! Signal scoring.
//!
//! Each [`ScoringRule`] holds one [`Condition`] and votes for at most one
//! side per bar. The votes are tallied into a [`ScoreResult`].
//!
//! # Evaluation Semantics
//!
//! - Only the current bar, the previous bar, the current reading and the
//!   previous reading are visible (no lookahead)
//! - A condition whose inputs are undefined does not vote
//! - `Crossover` fires only on the bar where the ordering flips; `Alignment`
//!   fires on every bar the ordering holds

use crate::domain::indicator::{IndicatorReading, IndicatorType};
use crate::domain::indicator_ref::{IndicatorField, IndicatorRef};
use crate::domain::ohlcv::OhlcvBar;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// source < oversold → buy, source > overbought → sell.
    Extremity {
        source: IndicatorRef,
        oversold: f64,
        overbought: f64,
    },
    /// Both lines below oversold → buy, both above overbought → sell.
    DualExtremity {
        first: IndicatorRef,
        second: IndicatorRef,
        oversold: f64,
        overbought: f64,
    },
    /// close ≤ lower → buy, close ≥ upper → sell.
    BandBreach {
        lower: IndicatorRef,
        upper: IndicatorRef,
    },
    /// fast crosses above slow → buy, below → sell.
    Crossover {
        fast: IndicatorRef,
        slow: IndicatorRef,
    },
    /// fast > slow → buy, fast < slow → sell.
    Alignment {
        fast: IndicatorRef,
        slow: IndicatorRef,
    },
    /// ADX above threshold, direction from the DI lines or from a trend pair.
    TrendStrength {
        adx: IndicatorType,
        threshold: f64,
        alongside: Option<(IndicatorRef, IndicatorRef)>,
    },
    /// close < previous close → buy, close > previous close → sell.
    PriceChange,
}

/// What a condition may look at on one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub bar: &'a OhlcvBar,
    pub previous_bar: Option<&'a OhlcvBar>,
    pub reading: &'a IndicatorReading,
    pub previous_reading: Option<&'a IndicatorReading>,
}

impl<'a> BarContext<'a> {
    /// Context for `bar_index`; `None` when either slice is too short.
    pub fn at(
        bar_index: usize,
        bars: &'a [OhlcvBar],
        readings: &'a [IndicatorReading],
    ) -> Option<Self> {
        let previous = bar_index.checked_sub(1);
        Some(BarContext {
            bar: bars.get(bar_index)?,
            previous_bar: previous.and_then(|i| bars.get(i)),
            reading: readings.get(bar_index)?,
            previous_reading: previous.and_then(|i| readings.get(i)),
        })
    }
}

impl Condition {
    pub fn evaluate(&self, ctx: &BarContext<'_>) -> Option<Side> {
        match self {
            Condition::Extremity {
                source,
                oversold,
                overbought,
            } => {
                let v = source.resolve(ctx.reading)?;
                extremity(v < *oversold, v > *overbought)
            }
            Condition::DualExtremity {
                first,
                second,
                oversold,
                overbought,
            } => {
                let a = first.resolve(ctx.reading)?;
                let b = second.resolve(ctx.reading)?;
                extremity(
                    a < *oversold && b < *oversold,
                    a > *overbought && b > *overbought,
                )
            }
            Condition::BandBreach { lower, upper } => {
                let close = ctx.bar.close;
                let lower = lower.resolve(ctx.reading)?;
                let upper = upper.resolve(ctx.reading)?;
                extremity(close <= lower, close >= upper)
            }
            Condition::Crossover { fast, slow } => {
                let prev = ctx.previous_reading?;
                let (f, s) = (fast.resolve(ctx.reading)?, slow.resolve(ctx.reading)?);
                let (pf, ps) = (fast.resolve(prev)?, slow.resolve(prev)?);
                extremity(pf <= ps && f > s, pf >= ps && f < s)
            }
            Condition::Alignment { fast, slow } => {
                let (f, s) = (fast.resolve(ctx.reading)?, slow.resolve(ctx.reading)?);
                extremity(f > s, f < s)
            }
            Condition::TrendStrength {
                adx,
                threshold,
                alongside,
            } => {
                let strength = IndicatorRef::new(*adx, IndicatorField::Adx).resolve(ctx.reading)?;
                if strength <= *threshold {
                    return None;
                }
                let (up, down) = match alongside {
                    None => (
                        IndicatorRef::new(*adx, IndicatorField::PlusDi).resolve(ctx.reading)?,
                        IndicatorRef::new(*adx, IndicatorField::MinusDi).resolve(ctx.reading)?,
                    ),
                    Some((fast, slow)) => (fast.resolve(ctx.reading)?, slow.resolve(ctx.reading)?),
                };
                extremity(up > down, up < down)
            }
            Condition::PriceChange => {
                let prev = ctx.previous_bar?;
                extremity(ctx.bar.close < prev.close, ctx.bar.close > prev.close)
            }
        }
    }

    /// Indicators this condition reads.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        match self {
            Condition::Extremity { source, .. } => vec![source.indicator_type],
            Condition::DualExtremity { first, second, .. } => {
                vec![first.indicator_type, second.indicator_type]
            }
            Condition::BandBreach { lower, upper } => {
                vec![lower.indicator_type, upper.indicator_type]
            }
            Condition::Crossover { fast, slow } | Condition::Alignment { fast, slow } => {
                vec![fast.indicator_type, slow.indicator_type]
            }
            Condition::TrendStrength { adx, alongside, .. } => {
                let mut types = vec![*adx];
                if let Some((fast, slow)) = alongside {
                    types.push(fast.indicator_type);
                    types.push(slow.indicator_type);
                }
                types
            }
            Condition::PriceChange => Vec::new(),
        }
    }
}

fn extremity(buy: bool, sell: bool) -> Option<Side> {
    match (buy, sell) {
        (true, false) => Some(Side::Buy),
        (false, true) => Some(Side::Sell),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRule {
    pub name: String,
    pub condition: Condition,
}

impl ScoringRule {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        ScoringRule {
            name: name.into(),
            condition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionHit {
    pub rule: String,
    pub side: Side,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreResult {
    pub buy_score: usize,
    pub sell_score: usize,
    pub triggered: Vec<ConditionHit>,
}

impl ScoreResult {
    pub fn score_for(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.buy_score,
            Side::Sell => self.sell_score,
        }
    }
}

/// Tally every rule's vote for one bar, in rule order.
pub fn score(rules: &[ScoringRule], ctx: &BarContext<'_>) -> ScoreResult {
    let mut result = ScoreResult::default();
    for rule in rules {
        if let Some(side) = rule.condition.evaluate(ctx) {
            match side {
                Side::Buy => result.buy_score += 1,
                Side::Sell => result.sell_score += 1,
            }
            result.triggered.push(ConditionHit {
                rule: rule.name.clone(),
                side,
            });
        }
    }
    result
}
