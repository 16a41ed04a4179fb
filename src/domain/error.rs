//! Domain error types.
//!
//! Only [`ScoretraderError::DataGap`] and [`ScoretraderError::Margin`] are
//! recoverable inside the backtest loop. Everything else aborts the run.

/// An entry order the account cannot pay for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("insufficient cash: order needs {required:.2}, account holds {available:.2}")]
pub struct MarginError {
    pub required: f64,
    pub available: f64,
}

/// Top-level error type for scoretrader.
#[derive(Debug, thiserror::Error)]
pub enum ScoretraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data gap at bar {bar_index}: {reason}")]
    DataGap { bar_index: usize, reason: String },

    #[error(transparent)]
    Margin(#[from] MarginError),

    #[error("invariant violated at bar {bar_index}: {reason}")]
    Invariant { bar_index: usize, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScoretraderError {
    /// Whether the backtest loop may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScoretraderError::DataGap { .. } | ScoretraderError::Margin(_)
        )
    }

    pub(crate) fn invariant(bar_index: usize, reason: impl Into<String>) -> Self {
        ScoretraderError::Invariant {
            bar_index,
            reason: reason.into(),
        }
    }
}

impl From<&ScoretraderError> for std::process::ExitCode {
    fn from(err: &ScoretraderError) -> Self {
        let code: u8 = match err {
            ScoretraderError::Io(_) => 1,
            ScoretraderError::ConfigParse { .. }
            | ScoretraderError::ConfigMissing { .. }
            | ScoretraderError::ConfigInvalid { .. } => 2,
            ScoretraderError::NoData { .. } | ScoretraderError::DataSource { .. } => 3,
            ScoretraderError::DataGap { .. } | ScoretraderError::Margin(_) => 4,
            ScoretraderError::Invariant { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
