#![doc = include_str!("../README.md")]
//! ohlcv-middleware
//!
//! Re-exports for middleware wrappers.

mod builder;
mod quota;

pub use crate::builder::ConnectorBuilder;
pub use crate::quota::QuotaAwareConnector;
