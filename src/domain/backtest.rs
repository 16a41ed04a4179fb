//! Backtest engine and event loop.
//!
//! Per bar `t`, in order:
//! 1. Check `readings[t]` is aligned with `bars[t]` (fatal otherwise)
//! 2. Fill a pending order at the fill policy's price; no decision this bar
//! 3. Ratchet the open position's watermark with a finite close
//! 4. Skip the decision on a data gap
//! 5. Trailing stop, then score; a new order under `SameBarClose` fills at
//!    this bar's close
//! 6. On the last bar cancel anything pending and optionally liquidate
//! 7. Append an equity point
//!
//! [`BacktestConfig`] defines backtest parameters.

use chrono::NaiveDate;

use crate::domain::broker::{Broker, BrokerConfig, SizingPolicy};
use crate::domain::error::ScoretraderError;
use crate::domain::indicator::{IndicatorReading, IndicatorType};
use crate::domain::ohlcv::{OhlcvBar, first_out_of_order};
use crate::domain::position::{ExitReason, Position, PositionSide, TradeRecord};
use crate::domain::scorer::{BarContext, Side};
use crate::domain::state_machine::{OrderIntent, StateMachine, TradeState};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Fill at the close of the bar the order was submitted on.
    SameBarClose,
    /// Fill at the open of the following bar.
    NextBarOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub commission_per_trade: f64,
    pub slippage_pct: f64,
    pub sizing: SizingPolicy,
    pub fill_policy: FillPolicy,
    pub force_close_at_end: bool,
    pub allow_shorting: bool,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            symbol: None,
            start_date: None,
            end_date: None,
            initial_capital: 100_000.0,
            commission_rate: 0.0,
            commission_per_trade: 0.0,
            slippage_pct: 0.0,
            sizing: SizingPolicy::FixedUnits(10),
            fill_policy: FillPolicy::SameBarClose,
            force_close_at_end: false,
            allow_shorting: false,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            commission_rate: self.commission_rate,
            commission_per_trade: self.commission_per_trade,
            slippage_pct: self.slippage_pct,
            sizing: self.sizing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_cash: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub rejected_orders: usize,
    /// Position still held when the run stopped.
    pub open_position: Option<Position>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

/// A backtest in progress. Drive it with [`Backtest::step`] and collect the
/// outcome with [`Backtest::finish`]; stopping early yields a partial result.
#[derive(Debug)]
pub struct Backtest<'a> {
    config: BacktestConfig,
    strategy: &'a Strategy,
    bars: &'a [OhlcvBar],
    readings: &'a [IndicatorReading],
    required: Vec<IndicatorType>,
    broker: Broker,
    machine: StateMachine,
    next_bar: usize,
    last_close: Option<f64>,
    equity_curve: Vec<EquityPoint>,
    trades: Vec<TradeRecord>,
    rejected_orders: usize,
}

impl<'a> Backtest<'a> {
    pub fn new(
        config: &BacktestConfig,
        strategy: &'a Strategy,
        bars: &'a [OhlcvBar],
        readings: &'a [IndicatorReading],
    ) -> Result<Self, ScoretraderError> {
        if let Some(i) = first_out_of_order(bars) {
            return Err(ScoretraderError::invariant(
                i,
                format!("bar dated {} does not follow {}", bars[i].date, bars[i - 1].date),
            ));
        }
        if readings.len() != bars.len() {
            return Err(ScoretraderError::invariant(
                readings.len().min(bars.len()),
                format!("{} readings for {} bars", readings.len(), bars.len()),
            ));
        }

        Ok(Backtest {
            config: config.clone(),
            strategy,
            bars,
            readings,
            required: strategy.required_indicators(),
            broker: Broker::new(config.initial_capital, config.broker_config()),
            machine: StateMachine::new(),
            next_bar: 0,
            last_close: None,
            equity_curve: Vec::with_capacity(bars.len()),
            trades: Vec::new(),
            rejected_orders: 0,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.next_bar >= self.bars.len()
    }

    pub fn trade_state(&self) -> &TradeState {
        self.machine.state()
    }

    pub fn cash(&self) -> f64 {
        self.broker.cash()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Process the next bar. Returns `false` once every bar has been processed.
    pub fn step(&mut self) -> Result<bool, ScoretraderError> {
        if self.is_finished() {
            return Ok(false);
        }
        let t = self.next_bar;
        let bars = self.bars;
        let bar = &bars[t];
        self.check_alignment(t)?;

        if bar.close.is_finite() {
            self.last_close = Some(bar.close);
        }

        let had_pending = self.machine.pending_order().is_some();
        if had_pending {
            let reference = match self.config.fill_policy {
                FillPolicy::NextBarOpen => bar.open,
                FillPolicy::SameBarClose => bar.close,
            };
            if reference.is_finite() {
                self.fill_pending(t, reference)?;
            } else {
                tracing::debug!(bar = t, "no fill price, order stays pending");
            }
        }

        let ratchet = bar.close.is_finite();
        if let Some(position) = self.machine.open_position_mut().filter(|_| ratchet) {
            position.update_watermark(bar.close);
        }

        // a fill bar takes no decision
        if !had_pending {
            match self.data_gap(t) {
                Some(gap) => tracing::debug!(bar = t, date = %bar.date, "{}", gap),
                None => self.decide(t)?,
            }
        }

        if t + 1 == self.bars.len() {
            self.close_out(t)?;
        }

        let mark = self.last_close.unwrap_or(0.0);
        self.equity_curve.push(EquityPoint {
            date: bar.date,
            equity: self.broker.equity(self.machine.position(), mark),
        });
        self.next_bar += 1;
        Ok(true)
    }

    pub fn finish(self) -> BacktestResult {
        if !self.is_finished() {
            tracing::info!(
                processed = self.next_bar,
                total = self.bars.len(),
                "backtest stopped early"
            );
        }
        BacktestResult {
            initial_capital: self.config.initial_capital,
            final_cash: self.broker.cash(),
            equity_curve: self.equity_curve,
            trades: self.trades,
            rejected_orders: self.rejected_orders,
            open_position: self.machine.position().cloned(),
        }
    }

    fn check_alignment(&self, t: usize) -> Result<(), ScoretraderError> {
        let reading = &self.readings[t];
        if reading.bar_index != t || reading.date != self.bars[t].date {
            return Err(ScoretraderError::invariant(
                t,
                format!(
                    "reading for bar {} ({}) does not match bar dated {}",
                    reading.bar_index, reading.date, self.bars[t].date
                ),
            ));
        }
        Ok(())
    }

    fn data_gap(&self, t: usize) -> Option<ScoretraderError> {
        let reason = if let Some(field) = self.bars[t].missing_field() {
            format!("{} is not a number", field)
        } else {
            let reading = &self.readings[t];
            let undefined = self.required.iter().find(|ty| !reading.is_defined(ty))?;
            format!("{} undefined", undefined)
        };
        Some(ScoretraderError::DataGap {
            bar_index: t,
            reason,
        })
    }

    fn decide(&mut self, t: usize) -> Result<(), ScoretraderError> {
        let ctx = BarContext::at(t, self.bars, self.readings)
            .ok_or_else(|| ScoretraderError::invariant(t, "no reading for bar"))?;
        let close = ctx.bar.close;
        let required = self.strategy.required_score;

        let submitted = match self.machine.state() {
            TradeState::Open(position) => {
                let stopped = self
                    .strategy
                    .trailing_stop
                    .is_some_and(|stop| stop.is_breached(position, close, ctx.reading));
                if stopped {
                    tracing::info!(bar = t, close, "trailing stop breached");
                    Some((None, ExitReason::TrailingStop))
                } else {
                    let exit_side = match position.side {
                        PositionSide::Long => Side::Sell,
                        PositionSide::Short => Side::Buy,
                    };
                    let result = self.strategy.score(&ctx);
                    tracing::trace!(
                        bar = t,
                        buy = result.buy_score,
                        sell = result.sell_score,
                        "scored"
                    );
                    (result.score_for(exit_side) >= required)
                        .then_some((None, ExitReason::Signal))
                }
            }
            TradeState::Flat => {
                let result = self.strategy.score(&ctx);
                tracing::trace!(
                    bar = t,
                    buy = result.buy_score,
                    sell = result.sell_score,
                    "scored"
                );
                if result.buy_score >= required {
                    Some((Some(Side::Buy), ExitReason::Signal))
                } else if self.config.allow_shorting && result.sell_score >= required {
                    Some((Some(Side::Sell), ExitReason::Signal))
                } else {
                    None
                }
            }
            TradeState::PendingEntry(_) | TradeState::PendingExit { .. } => None,
        };

        let Some((entry_side, reason)) = submitted else {
            return Ok(());
        };
        match entry_side {
            Some(side) => {
                self.machine.submit_entry(side, t)?;
            }
            None => {
                self.machine.submit_exit(reason, t)?;
            }
        }

        if self.config.fill_policy == FillPolicy::SameBarClose {
            self.fill_pending(t, close)?;
        }
        Ok(())
    }

    fn fill_pending(&mut self, t: usize, reference: f64) -> Result<(), ScoretraderError> {
        let Some(order) = self.machine.pending_order().cloned() else {
            return Ok(());
        };
        let date = self.bars[t].date;
        let position = self.machine.position().cloned();

        match self
            .broker
            .submit(&order, position.as_ref(), reference, date, t)
        {
            Ok(fill) => match order.intent {
                OrderIntent::Entry => {
                    let side = order.opens();
                    tracing::info!(
                        bar = t,
                        %date,
                        %side,
                        price = fill.price,
                        size = fill.size,
                        commission = fill.commission,
                        "opened position"
                    );
                    let position =
                        Position::open(side, fill.price, fill.size, date, t, fill.commission);
                    self.machine.fill_entry(position, t)
                }
                OrderIntent::Exit => {
                    let (position, order) = self.machine.fill_exit(t)?;
                    let reason = order.exit_reason.unwrap_or(ExitReason::Signal);
                    let trade =
                        TradeRecord::close(&position, fill.price, date, t, fill.commission, reason);
                    tracing::info!(
                        bar = t,
                        %date,
                        %reason,
                        price = fill.price,
                        pnl = trade.profit_loss,
                        "closed position"
                    );
                    self.trades.push(trade);
                    Ok(())
                }
            },
            Err(ScoretraderError::Margin(err)) => {
                tracing::warn!(bar = t, %date, "order rejected: {}", err);
                self.machine.reject(t)?;
                self.rejected_orders += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn close_out(&mut self, t: usize) -> Result<(), ScoretraderError> {
        if self.machine.pending_order().is_some() {
            let order = self.machine.cancel(t)?;
            tracing::warn!(bar = t, side = %order.side, "pending order canceled at end of data");
        }
        if !self.config.force_close_at_end || self.machine.position().is_none() {
            return Ok(());
        }
        let close = self.bars[t].close;
        if !close.is_finite() {
            tracing::warn!(bar = t, "last close is not a number, position left open");
            return Ok(());
        }
        self.machine.submit_exit(ExitReason::EndOfData, t)?;
        self.fill_pending(t, close)
    }
}

/// Replay every bar through `strategy`.
pub fn run_backtest(
    bars: &[OhlcvBar],
    readings: &[IndicatorReading],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, ScoretraderError> {
    let mut backtest = Backtest::new(config, strategy, bars, readings)?;
    while backtest.step()? {}
    let result = backtest.finish();

    tracing::info!(
        strategy = %strategy.name,
        bars = bars.len(),
        trades = result.trades.len(),
        rejected = result.rejected_orders,
        final_equity = result.final_equity(),
        "backtest complete"
    );
    Ok(result)
}
