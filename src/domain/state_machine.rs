//! Order and position lifecycle.
//!
//! ```text
//! Flat --submit_entry--> PendingEntry --fill--> Open
//!  ^                          |                  |
//!  +-------reject/cancel------+            submit_exit
//!  |                                             v
//!  +-----------------fill----------------- PendingExit
//!                                                |
//!                        Open <--reject/cancel---+
//! ```
//!
//! Any other request is an invariant violation.

use crate::domain::error::ScoretraderError;
use crate::domain::position::{ExitReason, Position, PositionSide};
use crate::domain::scorer::Side;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderIntent {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
    Canceled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: Side,
    pub intent: OrderIntent,
    pub requested_at_bar: usize,
    pub status: OrderStatus,
    pub exit_reason: Option<ExitReason>,
}

impl Order {
    /// Side of the position an entry order opens.
    pub fn opens(&self) -> PositionSide {
        match self.side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeState {
    Flat,
    PendingEntry(Order),
    Open(Position),
    PendingExit { position: Position, order: Order },
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeState::Flat => write!(f, "flat"),
            TradeState::PendingEntry(_) => write!(f, "pending entry"),
            TradeState::Open(_) => write!(f, "open"),
            TradeState::PendingExit { .. } => write!(f, "pending exit"),
        }
    }
}

/// Owns the single order slot and the single position slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    state: TradeState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            state: TradeState::Flat,
        }
    }

    pub fn state(&self) -> &TradeState {
        &self.state
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, TradeState::Flat)
    }

    pub fn pending_order(&self) -> Option<&Order> {
        match &self.state {
            TradeState::PendingEntry(order) | TradeState::PendingExit { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            TradeState::Open(position) | TradeState::PendingExit { position, .. } => {
                Some(position)
            }
            _ => None,
        }
    }

    /// The open position when no exit is pending; watermark updates go here.
    pub fn open_position_mut(&mut self) -> Option<&mut Position> {
        match &mut self.state {
            TradeState::Open(position) => Some(position),
            _ => None,
        }
    }

    pub fn submit_entry(
        &mut self,
        side: Side,
        bar_index: usize,
    ) -> Result<&Order, ScoretraderError> {
        if !self.is_flat() {
            return Err(self.illegal("submit_entry", bar_index));
        }
        self.state = TradeState::PendingEntry(Order {
            side,
            intent: OrderIntent::Entry,
            requested_at_bar: bar_index,
            status: OrderStatus::Pending,
            exit_reason: None,
        });
        self.pending_order()
            .ok_or_else(|| ScoretraderError::invariant(bar_index, "entry order vanished"))
    }

    pub fn submit_exit(
        &mut self,
        reason: ExitReason,
        bar_index: usize,
    ) -> Result<&Order, ScoretraderError> {
        match std::mem::replace(&mut self.state, TradeState::Flat) {
            TradeState::Open(position) => {
                let side = match position.side {
                    PositionSide::Long => Side::Sell,
                    PositionSide::Short => Side::Buy,
                };
                let order = Order {
                    side,
                    intent: OrderIntent::Exit,
                    requested_at_bar: bar_index,
                    status: OrderStatus::Pending,
                    exit_reason: Some(reason),
                };
                self.state = TradeState::PendingExit { position, order };
                self.pending_order()
                    .ok_or_else(|| ScoretraderError::invariant(bar_index, "exit order vanished"))
            }
            other => {
                self.state = other;
                Err(self.illegal("submit_exit", bar_index))
            }
        }
    }

    /// Resolve a pending entry as filled.
    pub fn fill_entry(
        &mut self,
        position: Position,
        bar_index: usize,
    ) -> Result<(), ScoretraderError> {
        let opens = match &self.state {
            TradeState::PendingEntry(order) => Some(order.opens()),
            _ => None,
        };
        if opens != Some(position.side) {
            return Err(self.illegal("fill_entry", bar_index));
        }
        self.state = TradeState::Open(position);
        Ok(())
    }

    /// Resolve a pending exit as filled, handing back the closed position
    /// and the filled order.
    pub fn fill_exit(&mut self, bar_index: usize) -> Result<(Position, Order), ScoretraderError> {
        match std::mem::replace(&mut self.state, TradeState::Flat) {
            TradeState::PendingExit {
                position,
                mut order,
            } => {
                order.status = OrderStatus::Filled;
                Ok((position, order))
            }
            other => {
                self.state = other;
                Err(self.illegal("fill_exit", bar_index))
            }
        }
    }

    /// Broker refused the pending order.
    pub fn reject(&mut self, bar_index: usize) -> Result<Order, ScoretraderError> {
        self.unwind(OrderStatus::Rejected, "reject", bar_index)
    }

    pub fn cancel(&mut self, bar_index: usize) -> Result<Order, ScoretraderError> {
        self.unwind(OrderStatus::Canceled, "cancel", bar_index)
    }

    fn unwind(
        &mut self,
        status: OrderStatus,
        action: &str,
        bar_index: usize,
    ) -> Result<Order, ScoretraderError> {
        match std::mem::replace(&mut self.state, TradeState::Flat) {
            TradeState::PendingEntry(mut order) => {
                order.status = status;
                Ok(order)
            }
            TradeState::PendingExit {
                position,
                mut order,
            } => {
                order.status = status;
                self.state = TradeState::Open(position);
                Ok(order)
            }
            other => {
                self.state = other;
                Err(self.illegal(action, bar_index))
            }
        }
    }

    fn illegal(&self, action: &str, bar_index: usize) -> ScoretraderError {
        ScoretraderError::invariant(bar_index, format!("cannot {} while {}", action, self.state))
    }
}
