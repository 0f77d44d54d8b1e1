//! Gap detection and repair for stored series files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use ohlcv_core::{
    DEFAULT_NA_VALUE, IntegrityReport, OhlcvError, SeriesStore, WriteMode, WriteOptions, dedup,
    detect_resolution, estimate_step_ms, percentage, reindex, string_resolution_to_ms,
};

/// Suffix appended to the file name when a repaired series is written beside the original.
pub const REPAIRED_SUFFIX: &str = "_REPAIRED";

/// Where a repaired series goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteTarget {
    /// Report only.
    #[default]
    None,
    /// Overwrite the checked file.
    Original,
    /// Write `<file>_REPAIRED` next to the checked file.
    NewFile,
}

impl WriteTarget {
    /// Map the `--write-file` / `--new-file` flags; a new file takes precedence.
    #[must_use]
    pub const fn from_flags(write_file: bool, new_file: bool) -> Self {
        if new_file {
            Self::NewFile
        } else if write_file {
            Self::Original
        } else {
            Self::None
        }
    }
}

/// Options for [`IntegrityChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityOptions {
    /// Field delimiter of the checked files.
    pub delimiter: u8,
    /// Resolution name (`minute`, `hourly`, `daily`); `None` detects it from the data.
    pub resolution: Option<String>,
    /// Emit a header row in repaired output.
    pub write_headers: bool,
    /// Token for missing values, on read and on write.
    pub na_value: String,
    /// Destination of the repaired series.
    pub target: WriteTarget,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            resolution: None,
            write_headers: false,
            na_value: DEFAULT_NA_VALUE.to_string(),
            target: WriteTarget::None,
        }
    }
}

impl IntegrityOptions {
    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            delimiter: self.delimiter,
            na_value: self.na_value.clone(),
            write_headers: self.write_headers,
            mode: WriteMode::Overwrite,
            ..WriteOptions::default()
        }
    }
}

/// Checks series files for duplicates and gaps and optionally writes the repair.
#[derive(Debug, Clone, Default)]
pub struct IntegrityChecker {
    options: IntegrityOptions,
}

impl IntegrityChecker {
    /// Create a checker with the given options.
    #[must_use]
    pub const fn new(options: IntegrityOptions) -> Self {
        Self { options }
    }

    /// The checker's options.
    #[must_use]
    pub const fn options(&self) -> &IntegrityOptions {
        &self.options
    }

    /// Check one file, repairing it onto the canonical grid.
    ///
    /// Duplicate timestamps keep their first occurrence. The resolution is the
    /// configured one, or the distance between the last two rows.
    ///
    /// # Errors
    /// - `InvalidResolution` for an unknown resolution name.
    /// - `Io`, `Data` or `EmptyInput` from reading the file.
    /// - `InsufficientData` when fewer than two distinct timestamps remain.
    /// - `Io` if the repaired series cannot be written.
    pub fn check_file(&self, path: impl AsRef<Path>) -> Result<IntegrityReport, OhlcvError> {
        let path = path.as_ref();
        let explicit = self
            .options
            .resolution
            .as_deref()
            .map(string_resolution_to_ms)
            .transpose()?;

        let store = SeriesStore::new(path, self.options.write_options());
        let series = store.read()?;
        let raw_rows = series.len();
        if raw_rows < 2 {
            return Err(OhlcvError::InsufficientData {
                path: path.display().to_string(),
                rows: raw_rows,
            });
        }

        let (candles, duplicate_rows) = dedup(&series.candles);
        if duplicate_rows > 0 {
            warn!(path = %path.display(), duplicate_rows, "dropping duplicate timestamps");
        }
        let (newer, older) = match candles.as_slice() {
            [.., older, newer] => (newer.ts, older.ts),
            _ => {
                return Err(OhlcvError::InsufficientData {
                    path: path.display().to_string(),
                    rows: candles.len(),
                });
            }
        };
        let resolution_ms = explicit.unwrap_or_else(|| detect_resolution(newer, older));

        let timestamps: Vec<i64> = candles.iter().map(|c| c.ts).collect();
        if let Some(step) = estimate_step_ms(&timestamps)
            && step != resolution_ms
        {
            warn!(
                path = %path.display(),
                resolution_ms,
                dominant_step_ms = step,
                "resolution differs from the dominant row spacing"
            );
        }

        let repaired = reindex(&candles, resolution_ms)?;
        let fixed_rows = repaired.candles.len();
        let missing_pct = percentage(repaired.inserted as u64, fixed_rows as u64)?;
        debug!(
            path = %path.display(),
            raw_rows,
            fixed_rows,
            missing = repaired.inserted,
            "series reindexed"
        );

        let written_to = match self.options.target {
            WriteTarget::None => None,
            WriteTarget::Original => Some(path.to_path_buf()),
            WriteTarget::NewFile => Some(repaired_path(path)),
        };
        if let Some(dest) = &written_to {
            let rows = SeriesStore::new(dest, self.options.write_options())
                .write(&repaired.candles)?;
            info!(path = %dest.display(), rows, "repaired series written");
        }

        Ok(IntegrityReport {
            path: path.display().to_string(),
            raw_rows,
            duplicate_rows,
            fixed_rows,
            missing_rows: repaired.inserted,
            missing_pct,
            resolution_ms,
            first_ts_ms: repaired.candles.first().map_or(newer, |c| c.ts),
            last_ts_ms: repaired.candles.last().map_or(newer, |c| c.ts),
            written_to: written_to.map(|p| p.display().to_string()),
        })
    }

    /// Check a file, or every regular file directly inside a directory.
    ///
    /// Per-file failures are returned alongside their path so one bad file
    /// does not stop the rest.
    ///
    /// # Errors
    /// Fails only when `path` itself cannot be listed; see [`collect_files`].
    pub fn check_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<(PathBuf, Result<IntegrityReport, OhlcvError>)>, OhlcvError> {
        let files = collect_files(path)?;
        Ok(files
            .into_iter()
            .map(|file| {
                let result = self.check_file(&file);
                if let Err(e) = &result {
                    if e.is_skippable() {
                        warn!(path = %file.display(), error = %e, "skipping file");
                    } else {
                        warn!(path = %file.display(), error = %e, "integrity check failed");
                    }
                }
                (file, result)
            })
            .collect())
    }
}

/// Sibling path receiving a repaired series: `data/x.csv` becomes `data/x.csv_REPAIRED`.
#[must_use]
pub fn repaired_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(REPAIRED_SUFFIX);
    PathBuf::from(name)
}

/// Files to check for `path`: the file itself, or the regular files directly
/// inside a directory sorted by name.
///
/// # Errors
/// - `Io` if `path` does not exist or the directory cannot be read.
/// - `InvalidArg` for anything that is neither a regular file nor a directory.
pub fn collect_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, OhlcvError> {
    let path = path.as_ref();
    let meta = fs::metadata(path)
        .map_err(|e| OhlcvError::Io(format!("{}: {e}", path.display())))?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !meta.is_dir() {
        return Err(OhlcvError::InvalidArg(format!(
            "{} is not a regular file or directory",
            path.display()
        )));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
