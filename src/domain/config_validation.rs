//! Configuration loading and validation.
//!
//! Reads `[backtest]` and `[strategy]` into typed values and rejects
//! inconsistent settings before a backtest runs.

use crate::domain::backtest::{BacktestConfig, FillPolicy};
use crate::domain::broker::SizingPolicy;
use crate::domain::error::ScoretraderError;
use crate::domain::strategy::{AdxMode, StrategyParams, TrailingStopKind, TrendMode};
use crate::ports::config_port::ConfigPort;

const BACKTEST: &str = "backtest";
const STRATEGY: &str = "strategy";

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ScoretraderError {
    ScoretraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn unknown_keyword(section: &str, key: &str, value: &str, allowed: &[&str]) -> ScoretraderError {
    invalid(
        section,
        key,
        format!("'{}' is not one of {}", value, allowed.join(", ")),
    )
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, ScoretraderError> {
    let defaults = BacktestConfig::default();

    let initial_capital =
        config.get_double(BACKTEST, "initial_capital", defaults.initial_capital)?;
    if initial_capital <= 0.0 || !initial_capital.is_finite() {
        return Err(invalid(BACKTEST, "initial_capital", "must be positive"));
    }

    let commission_rate = non_negative(config, "commission_rate")?;
    let commission_per_trade = non_negative(config, "commission_per_trade")?;
    let slippage_pct = non_negative(config, "slippage_pct")?;

    let risk_free_rate = config.get_double(BACKTEST, "risk_free_rate", defaults.risk_free_rate)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(BACKTEST, "risk_free_rate", "must be in [0, 1)"));
    }

    let start_date = config.get_date(BACKTEST, "start_date")?;
    let end_date = config.get_date(BACKTEST, "end_date")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start >= end {
            return Err(invalid(BACKTEST, "start_date", "must be before end_date"));
        }
    }

    let symbol = config
        .get_string(BACKTEST, "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(BacktestConfig {
        symbol,
        start_date,
        end_date,
        initial_capital,
        commission_rate,
        commission_per_trade,
        slippage_pct,
        sizing: load_sizing(config)?,
        fill_policy: load_fill_policy(config)?,
        force_close_at_end: config.get_bool(BACKTEST, "force_close_at_end", false)?,
        allow_shorting: config.get_bool(BACKTEST, "allow_shorting", false)?,
        risk_free_rate,
    })
}

fn non_negative(config: &dyn ConfigPort, key: &str) -> Result<f64, ScoretraderError> {
    let value = config.get_double(BACKTEST, key, 0.0)?;
    if value < 0.0 || !value.is_finite() {
        return Err(invalid(BACKTEST, key, "must be non-negative"));
    }
    Ok(value)
}

fn load_sizing(config: &dyn ConfigPort) -> Result<SizingPolicy, ScoretraderError> {
    let policy = config.get_keyword(BACKTEST, "sizing_policy", "fixed_units");
    match policy.as_str() {
        "fixed_units" => {
            let units = config.get_int(BACKTEST, "units", 10)?;
            if units <= 0 {
                return Err(invalid(BACKTEST, "units", "must be at least 1"));
            }
            Ok(SizingPolicy::FixedUnits(units))
        }
        "percent_of_equity" => {
            let fraction = config.get_double(BACKTEST, "equity_fraction", 0.95)?;
            if fraction <= 0.0 || fraction > 1.0 {
                return Err(invalid(BACKTEST, "equity_fraction", "must be in (0, 1]"));
            }
            Ok(SizingPolicy::PercentOfEquity(fraction))
        }
        other => Err(unknown_keyword(
            BACKTEST,
            "sizing_policy",
            other,
            &["fixed_units", "percent_of_equity"],
        )),
    }
}

fn load_fill_policy(config: &dyn ConfigPort) -> Result<FillPolicy, ScoretraderError> {
    let policy = config.get_keyword(BACKTEST, "fill_policy", "same_bar_close");
    match policy.as_str() {
        "same_bar_close" => Ok(FillPolicy::SameBarClose),
        "next_bar_open" => Ok(FillPolicy::NextBarOpen),
        other => Err(unknown_keyword(
            BACKTEST,
            "fill_policy",
            other,
            &["same_bar_close", "next_bar_open"],
        )),
    }
}

pub fn load_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, ScoretraderError> {
    let d = StrategyParams::default();

    let params = StrategyParams {
        name: config
            .get_string(STRATEGY, "name")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.name),
        required_score: count(config, "required_score", d.required_score)?,
        rsi_period: count(config, "rsi_period", d.rsi_period)?,
        rsi_oversold: config.get_double(STRATEGY, "rsi_oversold", d.rsi_oversold)?,
        rsi_overbought: config.get_double(STRATEGY, "rsi_overbought", d.rsi_overbought)?,
        stoch_period: count(config, "stoch_period", d.stoch_period)?,
        stoch_smoothing: count(config, "stoch_smoothing", d.stoch_smoothing)?,
        stoch_oversold: config.get_double(STRATEGY, "stoch_oversold", d.stoch_oversold)?,
        stoch_overbought: config.get_double(STRATEGY, "stoch_overbought", d.stoch_overbought)?,
        macd_fast: count(config, "macd_fast", d.macd_fast)?,
        macd_slow: count(config, "macd_slow", d.macd_slow)?,
        macd_signal: count(config, "macd_signal", d.macd_signal)?,
        ema_fast: count(config, "ema_fast", d.ema_fast)?,
        ema_slow: count(config, "ema_slow", d.ema_slow)?,
        trend_mode: load_trend_mode(config)?,
        bollinger_period: count(config, "bollinger_period", d.bollinger_period)?,
        bollinger_stddev: config.get_double(STRATEGY, "bollinger_stddev", d.bollinger_stddev)?,
        cci_period: count(config, "cci_period", d.cci_period)?,
        cci_threshold: config.get_double(STRATEGY, "cci_threshold", d.cci_threshold)?,
        adx_period: count(config, "adx_period", d.adx_period)?,
        adx_threshold: config.get_double(STRATEGY, "adx_threshold", d.adx_threshold)?,
        adx_mode: load_adx_mode(config)?,
        trailing_stop: load_trailing_stop(config)?,
        trail_fraction: config.get_double(STRATEGY, "trail_fraction", d.trail_fraction)?,
        atr_period: count(config, "atr_period", d.atr_period)?,
        atr_multiplier: config.get_double(STRATEGY, "atr_multiplier", d.atr_multiplier)?,
        enable_rsi: config.get_bool(STRATEGY, "enable_rsi", d.enable_rsi)?,
        enable_stochastic: config.get_bool(STRATEGY, "enable_stochastic", d.enable_stochastic)?,
        enable_bollinger: config.get_bool(STRATEGY, "enable_bollinger", d.enable_bollinger)?,
        enable_cci: config.get_bool(STRATEGY, "enable_cci", d.enable_cci)?,
        enable_macd: config.get_bool(STRATEGY, "enable_macd", d.enable_macd)?,
        enable_ema: config.get_bool(STRATEGY, "enable_ema", d.enable_ema)?,
        enable_adx: config.get_bool(STRATEGY, "enable_adx", d.enable_adx)?,
        enable_price_change: config.get_bool(
            STRATEGY,
            "enable_price_change",
            d.enable_price_change,
        )?,
    };

    validate_strategy_params(&params)?;
    Ok(params)
}

/// Positive integer setting.
fn count(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, ScoretraderError> {
    let value = config.get_int(STRATEGY, key, default as i64)?;
    if value <= 0 {
        return Err(invalid(STRATEGY, key, "must be at least 1"));
    }
    Ok(value as usize)
}

fn load_trend_mode(config: &dyn ConfigPort) -> Result<TrendMode, ScoretraderError> {
    match config.get_keyword(STRATEGY, "trend_mode", "cross").as_str() {
        "cross" => Ok(TrendMode::Cross),
        "static" => Ok(TrendMode::Static),
        other => Err(unknown_keyword(STRATEGY, "trend_mode", other, &["cross", "static"])),
    }
}

fn load_adx_mode(config: &dyn ConfigPort) -> Result<AdxMode, ScoretraderError> {
    match config.get_keyword(STRATEGY, "adx_mode", "standalone").as_str() {
        "standalone" => Ok(AdxMode::Standalone),
        "with_trend" => Ok(AdxMode::WithTrend),
        other => Err(unknown_keyword(
            STRATEGY,
            "adx_mode",
            other,
            &["standalone", "with_trend"],
        )),
    }
}

fn load_trailing_stop(config: &dyn ConfigPort) -> Result<TrailingStopKind, ScoretraderError> {
    match config.get_keyword(STRATEGY, "trailing_stop", "none").as_str() {
        "none" => Ok(TrailingStopKind::None),
        "percent" => Ok(TrailingStopKind::Percent),
        "atr" => Ok(TrailingStopKind::Atr),
        other => Err(unknown_keyword(
            STRATEGY,
            "trailing_stop",
            other,
            &["none", "percent", "atr"],
        )),
    }
}

/// Cross-field checks on an assembled parameter set.
pub fn validate_strategy_params(params: &StrategyParams) -> Result<(), ScoretraderError> {
    if params.required_score == 0 {
        return Err(invalid(STRATEGY, "required_score", "must be at least 1"));
    }
    let thresholds = [
        ("rsi_oversold", params.rsi_oversold),
        ("rsi_overbought", params.rsi_overbought),
        ("stoch_oversold", params.stoch_oversold),
        ("stoch_overbought", params.stoch_overbought),
        ("bollinger_stddev", params.bollinger_stddev),
        ("cci_threshold", params.cci_threshold),
        ("adx_threshold", params.adx_threshold),
        ("trail_fraction", params.trail_fraction),
        ("atr_multiplier", params.atr_multiplier),
    ];
    if let Some((key, _)) = thresholds.iter().find(|(_, v)| !v.is_finite()) {
        return Err(invalid(STRATEGY, key, "must be a finite number"));
    }
    if params.rsi_oversold >= params.rsi_overbought {
        return Err(invalid(STRATEGY, "rsi_oversold", "must be below rsi_overbought"));
    }
    if params.stoch_oversold >= params.stoch_overbought {
        return Err(invalid(STRATEGY, "stoch_oversold", "must be below stoch_overbought"));
    }
    if params.macd_fast >= params.macd_slow {
        return Err(invalid(STRATEGY, "macd_fast", "must be below macd_slow"));
    }
    if params.ema_fast >= params.ema_slow {
        return Err(invalid(STRATEGY, "ema_fast", "must be below ema_slow"));
    }
    if params.bollinger_stddev <= 0.0 {
        return Err(invalid(STRATEGY, "bollinger_stddev", "must be positive"));
    }
    if params.cci_threshold <= 0.0 {
        return Err(invalid(STRATEGY, "cci_threshold", "must be positive"));
    }
    if params.adx_threshold < 0.0 {
        return Err(invalid(STRATEGY, "adx_threshold", "must be non-negative"));
    }
    match params.trailing_stop {
        TrailingStopKind::Percent
            if !(params.trail_fraction > 0.0 && params.trail_fraction < 1.0) =>
        {
            Err(invalid(STRATEGY, "trail_fraction", "must be in (0, 1)"))
        }
        TrailingStopKind::Atr if params.atr_multiplier <= 0.0 => {
            Err(invalid(STRATEGY, "atr_multiplier", "must be positive"))
        }
        _ => Ok(()),
    }
}
