//! Core domain types and backtest logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_ref;
pub mod scorer;
pub mod position;
pub mod trailing_stop;
pub mod state_machine;
pub mod broker;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
