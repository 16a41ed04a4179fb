//! Configuration access port trait.

use crate::domain::error::ScoretraderError;
use chrono::NaiveDate;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    // Typed getters return `default` when the key is absent and
    // `ConfigInvalid` when it is present but does not parse.
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, ScoretraderError>;
    fn get_double(&self, section: &str, key: &str, default: f64)
    -> Result<f64, ScoretraderError>;
    fn get_bool(&self, section: &str, key: &str, default: bool)
    -> Result<bool, ScoretraderError>;

    /// Optional `YYYY-MM-DD` value; present but malformed is an error.
    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, ScoretraderError> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ScoretraderError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: format!("'{}' is not a YYYY-MM-DD date", raw.trim()),
                }),
        }
    }

    /// Lower-cased keyword value, `default` when absent.
    fn get_keyword(&self, section: &str, key: &str, default: &str) -> String {
        self.get_string(section, key)
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}
