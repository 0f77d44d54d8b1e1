//! Response payloads of the Binance REST API.

use serde::Deserialize;
use serde_json::Value;

use ohlcv_core::{Candle, OhlcvError};

use crate::EXCHANGE_ID;

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub base_asset: String,
    pub quote_asset: String,
}

impl SymbolInfo {
    pub fn unified(&self) -> String {
        format!("{}/{}", self.base_asset, self.quote_asset)
    }
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

/// Decode a klines payload: an array of
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn decode_klines(body: &str) -> Result<Vec<Candle>, OhlcvError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| OhlcvError::malformed(EXCHANGE_ID, e.to_string()))?;
    rows.iter().map(|row| decode_row(row)).collect()
}

fn decode_row(row: &[Value]) -> Result<Candle, OhlcvError> {
    if row.len() < 6 {
        return Err(OhlcvError::malformed(
            EXCHANGE_ID,
            format!("kline has {} fields, expected at least 6", row.len()),
        ));
    }
    let ts = row[0]
        .as_i64()
        .ok_or_else(|| OhlcvError::malformed(EXCHANGE_ID, format!("bad open time {}", row[0])))?;
    let mut values = [0.0_f64; 5];
    for (slot, v) in values.iter_mut().zip(&row[1..6]) {
        *slot = decode_number(v)?;
    }
    let [open, high, low, close, volume] = values;
    Ok(Candle::new(ts, open, high, low, close, volume))
}

fn decode_number(v: &Value) -> Result<f64, OhlcvError> {
    let parsed = match v {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|x| x.is_finite())
        .ok_or_else(|| OhlcvError::malformed(EXCHANGE_ID, format!("could not convert {v} to float")))
}
