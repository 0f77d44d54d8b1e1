//! Time-series utilities shared by connectors, the fetch cursor and the integrity checker.
//!
//! Modules include:
//! - `util`: timestamp conversion, resolution labels, percentages, session ids
//! - `infer`: resolution detection from adjacent timestamps
//! - `reindex`: canonical-grid gap repair and duplicate detection
/// Resolution detection helpers.
pub mod infer;
/// Gap repair and duplicate detection.
pub mod reindex;
/// Conversions and labels.
pub mod util;
