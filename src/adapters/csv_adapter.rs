//! CSV file bar source.
//!
//! Expects a header row `date,open,high,low,close,volume` with `YYYY-MM-DD`
//! dates. Empty price fields are read as NaN so the backtest treats the bar
//! as a data gap.

use crate::domain::error::ScoretraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    /// `base_path` is either a directory of `<symbol>.csv` files or a single
    /// CSV file, in which case the symbol is ignored.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        if self.base_path.is_file() {
            self.base_path.clone()
        } else {
            self.base_path.join(format!("{}.csv", symbol))
        }
    }

    fn read_bars(path: &Path) -> Result<Vec<OhlcvBar>, ScoretraderError> {
        let content = fs::read_to_string(path).map_err(|e| ScoretraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| ScoretraderError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            // header is line 1
            let line = row + 2;

            let date_str = field(&record, 0, "date", line)?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                ScoretraderError::DataSource {
                    reason: format!("line {}: invalid date '{}': {}", line, date_str, e),
                }
            })?;

            bars.push(OhlcvBar {
                date,
                open: price(&record, 1, "open", line)?,
                high: price(&record, 2, "high", line)?,
                low: price(&record, 3, "low", line)?,
                close: price(&record, 4, "close", line)?,
                volume: volume(&record, line)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        if let Some(dup) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ScoretraderError::DataSource {
                reason: format!("{}: duplicate bar for {}", path.display(), dup[1].date),
            });
        }
        Ok(bars)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, ScoretraderError> {
    record
        .get(index)
        .ok_or_else(|| ScoretraderError::DataSource {
            reason: format!("line {}: missing {} column", line, name),
        })
}

fn price(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, ScoretraderError> {
    let raw = field(record, index, name, line)?;
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|e| ScoretraderError::DataSource {
        reason: format!("line {}: invalid {} value '{}': {}", line, name, raw, e),
    })
}

fn volume(record: &csv::StringRecord, line: usize) -> Result<i64, ScoretraderError> {
    let raw = field(record, 5, "volume", line)?;
    if raw.is_empty() {
        return Ok(0);
    }
    // some exports write volume as a float
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|v| v as i64))
        .map_err(|e| ScoretraderError::DataSource {
            reason: format!("line {}: invalid volume value '{}': {}", line, raw, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, ScoretraderError> {
        let path = self.csv_path(symbol);
        let bars: Vec<OhlcvBar> = Self::read_bars(&path)?
            .into_iter()
            .filter(|b| start_date.is_none_or(|start| b.date >= start))
            .filter(|b| end_date.is_none_or(|end| b.date <= end))
            .collect();

        if bars.is_empty() {
            return Err(ScoretraderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        tracing::debug!(symbol, path = %path.display(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScoretraderError> {
        if self.base_path.is_file() {
            return Ok(self
                .base_path
                .file_stem()
                .map(|s| vec![s.to_string_lossy().into_owned()])
                .unwrap_or_default());
        }

        let entries = fs::read_dir(&self.base_path).map_err(|e| ScoretraderError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ScoretraderError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
