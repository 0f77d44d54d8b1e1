use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{Candle, OhlcvError};

/// Largest canonical grid `reindex` will materialize.
pub const MAX_GRID_POINTS: i64 = 50_000_000;

/// Which occurrences of a repeated timestamp count as duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Every occurrence after the first is flagged.
    First,
    /// Every occurrence before the last is flagged.
    Last,
    /// Every occurrence of a repeated timestamp is flagged.
    All,
}

/// Positions (ascending) of rows whose timestamp repeats, under `keep`.
///
/// ```
/// use ohlcv_core::{Candle, Keep, duplicated};
///
/// let rows: Vec<Candle> = [1, 2, 2, 3, 2].into_iter().map(Candle::missing).collect();
/// assert_eq!(duplicated(&rows, Keep::First), vec![2, 4]);
/// assert_eq!(duplicated(&rows, Keep::Last), vec![1, 2]);
/// assert_eq!(duplicated(&rows, Keep::All), vec![1, 2, 4]);
/// ```
#[must_use]
pub fn duplicated(candles: &[Candle], keep: Keep) -> Vec<usize> {
    match keep {
        Keep::First => {
            let mut seen = HashSet::with_capacity(candles.len());
            candles
                .iter()
                .enumerate()
                .filter(|(_, c)| !seen.insert(c.ts))
                .map(|(i, _)| i)
                .collect()
        }
        Keep::Last => {
            let mut seen = HashSet::with_capacity(candles.len());
            let mut flagged: Vec<usize> = candles
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, c)| !seen.insert(c.ts))
                .map(|(i, _)| i)
                .collect();
            flagged.reverse();
            flagged
        }
        Keep::All => {
            let mut counts: HashMap<i64, usize> = HashMap::with_capacity(candles.len());
            for c in candles {
                *counts.entry(c.ts).or_default() += 1;
            }
            candles
                .iter()
                .enumerate()
                .filter(|(_, c)| counts.get(&c.ts).copied().unwrap_or(0) > 1)
                .map(|(i, _)| i)
                .collect()
        }
    }
}

/// Keep the first occurrence of each timestamp and sort by timestamp.
///
/// Returns the surviving candles and the number of rows dropped.
#[must_use]
pub fn dedup(candles: &[Candle]) -> (Vec<Candle>, usize) {
    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    for c in candles {
        by_ts.entry(c.ts).or_insert(*c);
    }
    let dropped = candles.len() - by_ts.len();
    (by_ts.into_values().collect(), dropped)
}

/// A series laid onto its canonical grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Reindexed {
    /// Sorted, duplicate-free candles including inserted placeholders.
    pub candles: Vec<Candle>,
    /// Number of grid points that had to be inserted.
    pub inserted: usize,
}

/// Lay `candles` onto the grid `first, first + r, ..., <= last` where `r` is
/// `resolution_ms`.
///
/// Grid points absent from the input are inserted as [`Candle::missing`].
/// Input rows that fall between grid points are preserved. Repeated
/// timestamps keep their first occurrence.
///
/// # Errors
/// Returns `OhlcvError::InvalidResolution` when `resolution_ms` is not positive,
/// the timestamps span more than `i64::MAX` milliseconds, or the grid would
/// exceed [`MAX_GRID_POINTS`].
pub fn reindex(candles: &[Candle], resolution_ms: i64) -> Result<Reindexed, OhlcvError> {
    if resolution_ms <= 0 {
        return Err(OhlcvError::InvalidResolution(format!(
            "resolution must be positive, got {resolution_ms} ms"
        )));
    }
    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    for c in candles {
        by_ts.entry(c.ts).or_insert(*c);
    }
    let (Some(&first), Some(&last)) = (by_ts.keys().next(), by_ts.keys().next_back()) else {
        return Ok(Reindexed {
            candles: Vec::new(),
            inserted: 0,
        });
    };

    let span = last.checked_sub(first).ok_or_else(|| {
        OhlcvError::InvalidResolution(format!(
            "timestamps {first}..={last} span more than {} ms",
            i64::MAX
        ))
    })?;
    let points = (span / resolution_ms).saturating_add(1);
    if points > MAX_GRID_POINTS {
        return Err(OhlcvError::InvalidResolution(format!(
            "{resolution_ms} ms over {first}..={last} yields {points} grid points"
        )));
    }

    let mut inserted = 0;
    let mut t = first;
    while t <= last {
        by_ts.entry(t).or_insert_with(|| {
            inserted += 1;
            Candle::missing(t)
        });
        match t.checked_add(resolution_ms) {
            Some(next) => t = next,
            None => break,
        }
    }

    Ok(Reindexed {
        candles: by_ts.into_values().collect(),
        inserted,
    })
}
