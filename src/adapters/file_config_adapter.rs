//! INI file configuration adapter.

use crate::domain::error::ScoretraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

/// Section and key names are case-insensitive; values are kept verbatim.
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScoretraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| ScoretraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ScoretraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ScoretraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

fn invalid(section: &str, key: &str, reason: String) -> ScoretraderError {
    ScoretraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, ScoretraderError> {
        self.config
            .getint(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|reason| invalid(section, key, reason))
    }

    fn get_double(
        &self,
        section: &str,
        key: &str,
        default: f64,
    ) -> Result<f64, ScoretraderError> {
        let value = self
            .config
            .getfloat(section, key)
            .map_err(|reason| invalid(section, key, reason))?
            .unwrap_or(default);
        if !value.is_finite() {
            return Err(invalid(section, key, format!("{} is not a finite number", value)));
        }
        Ok(value)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, ScoretraderError> {
        match self.config.get(section, key) {
            None => Ok(default),
            Some(raw) => Self::parse_bool(&raw).ok_or_else(|| {
                invalid(
                    section,
                    key,
                    format!("'{}' is not true/false, yes/no or 1/0", raw.trim()),
                )
            }),
        }
    }
}
