//! Delimited-file persistence for candle series.
//!
//! A series file holds one row per candle: the opening time as an integer
//! millisecond epoch followed by open, high, low, close and volume. Headers are
//! optional and detected on read.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::{Candle, OHLCV_COLUMNS, OhlcvError, Series};

/// Default token written for missing values.
pub const DEFAULT_NA_VALUE: &str = "nan";

/// How `write` treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Truncate and rewrite.
    #[default]
    Overwrite,
    /// Append after the existing rows.
    Append,
}

/// Text encoding of written files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8 without BOM.
    #[default]
    Utf8,
}

/// Formatting options shared by reads and writes of one series file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Field delimiter.
    pub delimiter: u8,
    /// Token for missing values; also recognized as missing on read.
    pub na_value: String,
    /// Emit a header row (only at the start of a file in append mode).
    pub write_headers: bool,
    /// Emit the timestamp column.
    pub write_index: bool,
    /// Overwrite or append.
    pub mode: WriteMode,
    /// Output encoding.
    pub encoding: Encoding,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            na_value: DEFAULT_NA_VALUE.to_string(),
            write_headers: false,
            write_index: true,
            mode: WriteMode::Overwrite,
            encoding: Encoding::Utf8,
        }
    }
}

impl WriteOptions {
    /// Options for appending fetched pages: no headers, timestamp column on.
    #[must_use]
    pub fn append(delimiter: u8) -> Self {
        Self {
            delimiter,
            mode: WriteMode::Append,
            ..Self::default()
        }
    }
}

/// File name of the series for one (exchange, symbol, interval).
///
/// ```
/// use ohlcv_core::series_file_name;
///
/// assert_eq!(series_file_name("binance", "BTC/USDT", "1h"), "BINANCE_BTCUSDT_1h.csv");
/// ```
#[must_use]
pub fn series_file_name(exchange: &str, symbol: &str, interval: &str) -> String {
    format!(
        "{}_{}_{}.csv",
        exchange.to_uppercase(),
        symbol.replace('/', ""),
        interval
    )
}

/// One series file on disk.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    path: PathBuf,
    options: WriteOptions,
}

impl SeriesStore {
    /// Bind a store to `path` with the given formatting options.
    pub fn new(path: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formatting options.
    #[must_use]
    pub const fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Read the whole file.
    ///
    /// Empty cells, `nan` (any case) and the configured NA token load as
    /// missing values. Numbers parse to the nearest `f64`, which renders back to
    /// the same digits.
    ///
    /// # Errors
    /// - `Io` if the file cannot be opened.
    /// - `EmptyInput` if there are no data rows.
    /// - `Data` for a wrong field count or an unparsable field, with its line.
    pub fn read(&self) -> Result<Series, OhlcvError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut candles = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| OhlcvError::Data(format!("{}: {e}", self.display())))?;
            let line = record.position().map_or(idx as u64 + 1, csv::Position::line);
            if idx == 0 && is_header(&record) {
                continue;
            }
            if record.len() != OHLCV_COLUMNS.len() {
                return Err(OhlcvError::Data(format!(
                    "{}:{line}: expected {} fields, found {}",
                    self.display(),
                    OHLCV_COLUMNS.len(),
                    record.len()
                )));
            }
            candles.push(self.parse_row(&record, line)?);
        }

        if candles.is_empty() {
            return Err(OhlcvError::EmptyInput {
                path: self.display(),
            });
        }
        debug!(path = %self.display(), rows = candles.len(), "read series");
        Ok(Series::new(candles))
    }

    /// Write `candles` according to the store's options and return the row count.
    ///
    /// Parent directories are created as needed. In append mode the header row
    /// is only written when the file is new or empty.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be created or written.
    pub fn write(&self, candles: &[Candle]) -> Result<usize, OhlcvError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let opts = &self.options;
        let file = match opts.mode {
            WriteMode::Overwrite => File::create(&self.path)?,
            WriteMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        };
        let at_start = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .from_writer(file);

        if opts.write_headers && at_start {
            let header = OHLCV_COLUMNS
                .iter()
                .skip(usize::from(!opts.write_index));
            writer.write_record(header).map_err(io_error)?;
        }
        for c in candles {
            let values = c.values().map(|v| self.format_value(v));
            if opts.write_index {
                writer
                    .write_record(std::iter::once(c.ts.to_string()).chain(values))
                    .map_err(io_error)?;
            } else {
                writer.write_record(values).map_err(io_error)?;
            }
        }
        writer.flush()?;
        debug!(
            path = %self.display(),
            rows = candles.len(),
            mode = ?opts.mode,
            "wrote series"
        );
        Ok(candles.len())
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn format_value(&self, v: f64) -> String {
        if v.is_nan() {
            self.options.na_value.clone()
        } else {
            v.to_string()
        }
    }

    fn parse_row(&self, record: &csv::StringRecord, line: u64) -> Result<Candle, OhlcvError> {
        let ts_field = record.get(0).unwrap_or_default().trim();
        let ts: i64 = ts_field.parse().map_err(|_| {
            OhlcvError::Data(format!(
                "{}:{line}: invalid timestamp {ts_field:?}",
                self.display()
            ))
        })?;
        let mut values = [f64::NAN; 5];
        for (slot, field) in values.iter_mut().zip(record.iter().skip(1)) {
            *slot = self.parse_value(field.trim(), line)?;
        }
        let [open, high, low, close, volume] = values;
        Ok(Candle::new(ts, open, high, low, close, volume))
    }

    fn parse_value(&self, field: &str, line: u64) -> Result<f64, OhlcvError> {
        if field.is_empty() || field.eq_ignore_ascii_case("nan") || field == self.options.na_value {
            return Ok(f64::NAN);
        }
        field.parse().map_err(|_| {
            OhlcvError::Data(format!(
                "{}:{line}: invalid number {field:?}",
                self.display()
            ))
        })
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|f| f.trim().eq_ignore_ascii_case(OHLCV_COLUMNS[0]))
}

fn io_error(e: csv::Error) -> OhlcvError {
    OhlcvError::Io(e.to_string())
}
