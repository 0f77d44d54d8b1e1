/// Difference in milliseconds between two consecutive timestamps.
///
/// This is both the inferred candle width and the step used to predict the next
/// cursor position. The raw delta is returned unchanged; a non-positive value
/// means the timestamps were not strictly increasing and callers treat it as an
/// anomaly.
///
/// ```
/// use ohlcv_core::detect_resolution;
///
/// assert_eq!(detect_resolution(1_546_300_860_000, 1_546_300_800_000), 60_000);
/// assert_eq!(detect_resolution(10, 10), 0);
/// ```
#[must_use]
pub const fn detect_resolution(t_newer_ms: i64, t_older_ms: i64) -> i64 {
    t_newer_ms.saturating_sub(t_older_ms)
}

/// Estimate a representative step (in milliseconds) from positive adjacent
/// timestamp deltas.
///
/// Prefer the mode (most frequent positive delta); if there is no unique mode,
/// return the lower median. The input order does not matter; duplicates are
/// ignored, as are gaps too wide for `i64`. Returns `None` if no usable delta
/// remains.
///
/// ```
/// use ohlcv_core::estimate_step_ms;
///
/// // Adjacent deltas: 60,60,60,120,180  => unique mode is 60
/// assert_eq!(estimate_step_ms(&[0, 60, 120, 180, 300, 480]), Some(60));
/// // Adjacent deltas: 60,60,120,120  => lower median is 60
/// assert_eq!(estimate_step_ms(&[0, 60, 120, 240, 360]), Some(60));
/// ```
#[must_use]
pub fn estimate_step_ms(timestamps: &[i64]) -> Option<i64> {
    if timestamps.len() < 2 {
        return None;
    }
    let mut ts = timestamps.to_vec();
    ts.sort_unstable();

    let mut deltas: Vec<i64> = Vec::with_capacity(ts.len().saturating_sub(1));
    let mut last = ts[0];
    for &cur in ts.iter().skip(1) {
        match cur.checked_sub(last) {
            Some(0) => {}
            Some(dt) => {
                deltas.push(dt);
                last = cur;
            }
            // wider than i64: not a usable step
            None => last = cur,
        }
    }
    if deltas.is_empty() {
        return None;
    }
    deltas.sort_unstable();

    let mut best_delta: i64 = deltas[0];
    let mut best_count: usize = 0;
    let mut num_best_candidates: usize = 0;

    let mut cur_delta: i64 = deltas[0];
    let mut cur_count: usize = 1;
    for &d in deltas.iter().skip(1) {
        if d == cur_delta {
            cur_count += 1;
            continue;
        }
        if cur_count > best_count {
            best_count = cur_count;
            best_delta = cur_delta;
            num_best_candidates = 1;
        } else if cur_count == best_count {
            num_best_candidates = num_best_candidates.saturating_add(1);
        }
        cur_delta = d;
        cur_count = 1;
    }
    if cur_count > best_count {
        best_delta = cur_delta;
        num_best_candidates = 1;
    } else if cur_count == best_count {
        num_best_candidates = num_best_candidates.saturating_add(1);
    }

    if num_best_candidates == 1 {
        return Some(best_delta);
    }

    // Lower median
    let mid = deltas.len() / 2;
    if deltas.len() % 2 == 1 {
        Some(deltas[mid])
    } else {
        Some(deltas[mid - 1])
    }
}
