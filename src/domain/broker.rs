//! Broker simulation: fills, sizing, commission, slippage and cash.
//!
//! Cash moves only on fills:
//! - Long entry: cash -= price × size + commission
//! - Long exit: cash += price × size - commission
//! - Short entry (escrow): cash -= price × size + commission
//! - Short exit: cash += 2 × entry notional - exit notional - commission

use chrono::NaiveDate;

use crate::domain::error::{MarginError, ScoretraderError};
use crate::domain::position::{Position, PositionSide};
use crate::domain::scorer::Side;
use crate::domain::state_machine::{Order, OrderIntent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
    /// Always trade this many units.
    FixedUnits(i64),
    /// floor(fraction × equity / price) units.
    PercentOfEquity(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// Fraction of traded value, e.g. 0.001 for 0.1%.
    pub commission_rate: f64,
    pub commission_per_trade: f64,
    /// Percent, applied against the trader on every fill.
    pub slippage_pct: f64,
    pub sizing: SizingPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            commission_rate: 0.0,
            commission_per_trade: 0.0,
            slippage_pct: 0.0,
            sizing: SizingPolicy::FixedUnits(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub size: i64,
    pub commission: f64,
    pub date: NaiveDate,
    pub bar_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Broker {
    config: BrokerConfig,
    cash: f64,
}

impl Broker {
    pub fn new(initial_cash: f64, config: BrokerConfig) -> Self {
        Broker {
            config,
            cash: initial_cash,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// commission_per_trade + price × size × commission_rate
    pub fn commission(&self, price: f64, size: i64) -> f64 {
        self.config.commission_per_trade + price * size as f64 * self.config.commission_rate
    }

    /// Buys fill higher, sells fill lower.
    pub fn slipped_price(&self, side: Side, reference_price: f64) -> f64 {
        let s = self.config.slippage_pct / 100.0;
        match side {
            Side::Buy => reference_price * (1.0 + s),
            Side::Sell => reference_price * (1.0 - s),
        }
    }

    /// Units an entry at `price` would trade. Only called while flat, so
    /// equity is cash.
    ///
    /// `PercentOfEquity` takes `floor(fraction × equity / price)` units, cut
    /// back to what cash covers once commission is added.
    pub fn entry_size(&self, price: f64) -> i64 {
        match self.config.sizing {
            SizingPolicy::FixedUnits(units) => units,
            SizingPolicy::PercentOfEquity(_) if price <= 0.0 => 0,
            SizingPolicy::PercentOfEquity(fraction) => {
                let target = (fraction * self.cash / price).floor();
                let per_unit = price * (1.0 + self.config.commission_rate);
                let budget = self.cash - self.config.commission_per_trade;
                let affordable = (budget / per_unit).floor();
                target.min(affordable).max(0.0) as i64
            }
        }
    }

    /// Cash plus the mark-to-market value of the open position at `close`.
    pub fn equity(&self, position: Option<&Position>, close: f64) -> f64 {
        self.cash + position.map_or(0.0, |p| p.market_value(close))
    }

    /// Execute `order` at `reference_price` (before slippage).
    ///
    /// Entries that cannot be paid for come back as
    /// [`ScoretraderError::Margin`] with cash untouched.
    pub fn submit(
        &mut self,
        order: &Order,
        position: Option<&Position>,
        reference_price: f64,
        date: NaiveDate,
        bar_index: usize,
    ) -> Result<Fill, ScoretraderError> {
        let price = self.slipped_price(order.side, reference_price);
        match (order.intent, position) {
            (OrderIntent::Entry, None) => self.fill_entry(price, date, bar_index),
            (OrderIntent::Exit, Some(position)) => {
                Ok(self.fill_exit(position, price, date, bar_index))
            }
            (OrderIntent::Entry, Some(_)) => Err(ScoretraderError::invariant(
                bar_index,
                "entry order submitted while a position is open",
            )),
            (OrderIntent::Exit, None) => Err(ScoretraderError::invariant(
                bar_index,
                "exit order submitted without a position",
            )),
        }
    }

    fn fill_entry(
        &mut self,
        price: f64,
        date: NaiveDate,
        bar_index: usize,
    ) -> Result<Fill, ScoretraderError> {
        let size = self.entry_size(price);
        if size <= 0 {
            return Err(MarginError {
                required: price + self.commission(price, 1),
                available: self.cash,
            }
            .into());
        }

        let commission = self.commission(price, size);
        let total_cost = price * size as f64 + commission;
        if total_cost > self.cash {
            return Err(MarginError {
                required: total_cost,
                available: self.cash,
            }
            .into());
        }

        self.cash -= total_cost;
        Ok(Fill {
            price,
            size,
            commission,
            date,
            bar_index,
        })
    }

    fn fill_exit(
        &mut self,
        position: &Position,
        price: f64,
        date: NaiveDate,
        bar_index: usize,
    ) -> Fill {
        let size = position.size;
        let commission = self.commission(price, size);
        let exit_notional = price * size as f64;

        self.cash += match position.side {
            PositionSide::Long => exit_notional - commission,
            PositionSide::Short => {
                let entry_notional = position.entry_notional();
                entry_notional + (entry_notional - exit_notional) - commission
            }
        };

        Fill {
            price,
            size,
            commission,
            date,
            bar_index,
        }
    }
}
