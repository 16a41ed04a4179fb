//! Open position and closed trade records.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Signal,
    TrailingStop,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::TrailingStop => write!(f, "trailing_stop"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: f64,
    pub size: i64,
    pub entry_date: NaiveDate,
    pub entry_bar: usize,
    pub entry_commission: f64,
    pub highest_price_since_entry: f64,
    pub lowest_price_since_entry: f64,
}

impl Position {
    /// A freshly filled position; the watermark starts at the entry price.
    pub fn open(
        side: PositionSide,
        entry_price: f64,
        size: i64,
        entry_date: NaiveDate,
        entry_bar: usize,
        entry_commission: f64,
    ) -> Self {
        Position {
            side,
            entry_price,
            size,
            entry_date,
            entry_bar,
            entry_commission,
            highest_price_since_entry: entry_price,
            lowest_price_since_entry: entry_price,
        }
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.size as f64
    }

    /// Value the position contributes to equity at `price`.
    ///
    /// Shorts use the escrow model: the entry notional was set aside in cash
    /// and the position is worth that plus its unrealized gain.
    pub fn market_value(&self, price: f64) -> f64 {
        let size = self.size as f64;
        match self.side {
            PositionSide::Long => size * price,
            PositionSide::Short => size * (2.0 * self.entry_price - price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let size = self.size as f64;
        match self.side {
            PositionSide::Long => size * (price - self.entry_price),
            PositionSide::Short => size * (self.entry_price - price),
        }
    }

    /// Ratchet the extreme-price watermark with a new close.
    pub fn update_watermark(&mut self, close: f64) {
        self.highest_price_since_entry = self.highest_price_since_entry.max(close);
        self.lowest_price_since_entry = self.lowest_price_since_entry.min(close);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub side: PositionSide,
    pub size: i64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    /// Net of both commissions.
    pub profit_loss: f64,
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// Close `position` at `exit_price`, paying `exit_commission`.
    pub fn close(
        position: &Position,
        exit_price: f64,
        exit_date: NaiveDate,
        exit_bar: usize,
        exit_commission: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let commission = position.entry_commission + exit_commission;
        let profit_loss = position.unrealized_pnl(exit_price) - commission;
        let notional = position.entry_notional();
        let return_pct = if notional > 0.0 {
            profit_loss / notional * 100.0
        } else {
            0.0
        };

        TradeRecord {
            side: position.side,
            size: position.size,
            entry_date: position.entry_date,
            exit_date,
            entry_bar: position.entry_bar,
            exit_bar,
            entry_price: position.entry_price,
            exit_price,
            commission,
            profit_loss,
            return_pct,
            exit_reason,
        }
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}
