//! Strategy composition.
//!
//! [`StrategyParams`] is the flat `[strategy]` parameter set; [`Strategy`] is
//! the list of scoring rules and overlays built from it.

use crate::domain::indicator::bollinger::multiplier_x100;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_ref::{IndicatorField, IndicatorRef};
use crate::domain::scorer::{BarContext, Condition, ScoreResult, ScoringRule, score};
use crate::domain::trailing_stop::TrailingStop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMode {
    /// Vote only on the bar the pair crosses.
    Cross,
    /// Vote on every bar from the pair's ordering.
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdxMode {
    /// Direction from +DI / -DI.
    Standalone,
    /// Direction from the EMA pair.
    WithTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingStopKind {
    None,
    Percent,
    Atr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub name: String,
    pub required_score: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_period: usize,
    pub stoch_smoothing: usize,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub trend_mode: TrendMode,
    pub bollinger_period: usize,
    pub bollinger_stddev: f64,
    pub cci_period: usize,
    pub cci_threshold: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub adx_mode: AdxMode,
    pub trailing_stop: TrailingStopKind,
    pub trail_fraction: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub enable_rsi: bool,
    pub enable_stochastic: bool,
    pub enable_bollinger: bool,
    pub enable_cci: bool,
    pub enable_macd: bool,
    pub enable_ema: bool,
    pub enable_adx: bool,
    pub enable_price_change: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            name: "score".to_string(),
            required_score: 4,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stoch_period: 14,
            stoch_smoothing: 3,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_fast: 12,
            ema_slow: 26,
            trend_mode: TrendMode::Cross,
            bollinger_period: 20,
            bollinger_stddev: 2.0,
            cci_period: 20,
            cci_threshold: 100.0,
            adx_period: 14,
            adx_threshold: 25.0,
            adx_mode: AdxMode::Standalone,
            trailing_stop: TrailingStopKind::None,
            trail_fraction: 0.1,
            atr_period: 14,
            atr_multiplier: 3.0,
            enable_rsi: true,
            enable_stochastic: true,
            enable_bollinger: true,
            enable_cci: true,
            enable_macd: true,
            enable_ema: true,
            enable_adx: true,
            enable_price_change: false,
        }
    }
}

impl StrategyParams {
    fn ema_pair(&self) -> (IndicatorRef, IndicatorRef) {
        (
            IndicatorRef::value(IndicatorType::Ema(self.ema_fast)),
            IndicatorRef::value(IndicatorType::Ema(self.ema_slow)),
        )
    }

    fn trend_condition(&self, fast: IndicatorRef, slow: IndicatorRef) -> Condition {
        match self.trend_mode {
            TrendMode::Cross => Condition::Crossover { fast, slow },
            TrendMode::Static => Condition::Alignment { fast, slow },
        }
    }

    /// Assemble the enabled rules in a fixed order.
    pub fn build(&self) -> Strategy {
        let mut rules = Vec::new();

        if self.enable_rsi {
            rules.push(ScoringRule::new(
                "rsi",
                Condition::Extremity {
                    source: IndicatorRef::value(IndicatorType::Rsi(self.rsi_period)),
                    oversold: self.rsi_oversold,
                    overbought: self.rsi_overbought,
                },
            ));
        }
        if self.enable_stochastic {
            let stoch = IndicatorType::Stochastic {
                k_period: self.stoch_period,
                d_period: self.stoch_smoothing,
            };
            rules.push(ScoringRule::new(
                "stochastic",
                Condition::DualExtremity {
                    first: IndicatorRef::new(stoch, IndicatorField::StochasticK),
                    second: IndicatorRef::new(stoch, IndicatorField::StochasticD),
                    oversold: self.stoch_oversold,
                    overbought: self.stoch_overbought,
                },
            ));
        }
        if self.enable_bollinger {
            let boll = IndicatorType::Bollinger {
                period: self.bollinger_period,
                stddev_mult_x100: multiplier_x100(self.bollinger_stddev),
            };
            rules.push(ScoringRule::new(
                "bollinger",
                Condition::BandBreach {
                    lower: IndicatorRef::new(boll, IndicatorField::BollingerLower),
                    upper: IndicatorRef::new(boll, IndicatorField::BollingerUpper),
                },
            ));
        }
        if self.enable_cci {
            rules.push(ScoringRule::new(
                "cci",
                Condition::Extremity {
                    source: IndicatorRef::value(IndicatorType::Cci(self.cci_period)),
                    oversold: -self.cci_threshold,
                    overbought: self.cci_threshold,
                },
            ));
        }
        if self.enable_macd {
            let macd = IndicatorType::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            };
            rules.push(ScoringRule::new(
                "macd",
                self.trend_condition(
                    IndicatorRef::new(macd, IndicatorField::MacdLine),
                    IndicatorRef::new(macd, IndicatorField::MacdSignal),
                ),
            ));
        }
        if self.enable_ema {
            let (fast, slow) = self.ema_pair();
            rules.push(ScoringRule::new("ema", self.trend_condition(fast, slow)));
        }
        if self.enable_adx {
            let alongside = match self.adx_mode {
                AdxMode::Standalone => None,
                AdxMode::WithTrend => Some(self.ema_pair()),
            };
            rules.push(ScoringRule::new(
                "adx",
                Condition::TrendStrength {
                    adx: IndicatorType::Adx(self.adx_period),
                    threshold: self.adx_threshold,
                    alongside,
                },
            ));
        }
        if self.enable_price_change {
            rules.push(ScoringRule::new("price_change", Condition::PriceChange));
        }

        let trailing_stop = match self.trailing_stop {
            TrailingStopKind::None => None,
            TrailingStopKind::Percent => Some(TrailingStop::Percent {
                trail_fraction: self.trail_fraction,
            }),
            TrailingStopKind::Atr => Some(TrailingStop::Atr {
                period: self.atr_period,
                multiplier: self.atr_multiplier,
            }),
        };

        Strategy {
            name: self.name.clone(),
            required_score: self.required_score,
            rules,
            trailing_stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub required_score: usize,
    pub rules: Vec<ScoringRule>,
    pub trailing_stop: Option<TrailingStop>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, required_score: usize, rules: Vec<ScoringRule>) -> Self {
        Strategy {
            name: name.into(),
            required_score,
            rules,
            trailing_stop: None,
        }
    }

    pub fn with_trailing_stop(mut self, stop: TrailingStop) -> Self {
        self.trailing_stop = Some(stop);
        self
    }

    /// Every indicator the rules and the trailing stop read, sorted and deduplicated.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut types: Vec<IndicatorType> = self
            .rules
            .iter()
            .flat_map(|rule| rule.condition.required_indicators())
            .chain(
                self.trailing_stop
                    .iter()
                    .flat_map(|stop| stop.required_indicators()),
            )
            .collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn score(&self, ctx: &BarContext<'_>) -> ScoreResult {
        score(&self.rules, ctx)
    }
}
