/// Core data types for klines
///
/// These types match the JSON formats served by the futures REST endpoint
/// (`/fapi/v1/klines`) and the `<symbol>@kline_<interval>` WebSocket stream.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::shared::error::{ConfigError, FetchError};

/// One OHLC bar. `time` is the bar open time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// Check if the bar closed at or above its open
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// A single point of a line overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub time: i64,
    pub value: f64,
}

/// Kline interval supported by the futures endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    S1,
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
}

impl Interval {
    /// Intervals offered by the timeframe selector, in key order (`1`..`8`)
    pub const SELECTOR: [Interval; 8] = [
        Interval::S1,
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::H1,
        Interval::H4,
        Interval::D1,
        Interval::W1,
    ];

    const ALL: [Interval; 15] = [
        Interval::S1,
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::D3,
        Interval::W1,
    ];

    /// Exchange interval code (e.g. "1m", "4h")
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::S1 => "1s",
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
        }
    }

    /// Bar length in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::S1 => 1,
            Interval::M1 => 60,
            Interval::M3 => 3 * 60,
            Interval::M5 => 5 * 60,
            Interval::M15 => 15 * 60,
            Interval::M30 => 30 * 60,
            Interval::H1 => 3600,
            Interval::H2 => 2 * 3600,
            Interval::H4 => 4 * 3600,
            Interval::H6 => 6 * 3600,
            Interval::H8 => 8 * 3600,
            Interval::H12 => 12 * 3600,
            Interval::D1 => 86_400,
            Interval::D3 => 3 * 86_400,
            Interval::W1 => 7 * 86_400,
        }
    }

    /// Selector slot for a `1`..`8` key press
    pub fn from_selector_key(key: char) -> Option<Self> {
        let idx = key.to_digit(10)? as usize;
        if idx == 0 {
            return None;
        }
        Self::SELECTOR.get(idx - 1).copied()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == s.trim())
            .ok_or_else(|| ConfigError::Interval(s.to_string()))
    }
}

/// Kline stream message envelope
///
/// Only the `k` payload is used; the envelope fields (`e`, `E`, `s`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineStreamMessage {
    pub k: KlinePayload,
}

/// Kline payload from the `@kline_<interval>` stream
#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    /// Bar open time (ms)
    pub t: i64,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub o: f64,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub h: f64,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub l: f64,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub c: f64,
}

impl From<KlinePayload> for Candle {
    fn from(k: KlinePayload) -> Self {
        Candle::new(k.t.div_euclid(1000), k.o, k.h, k.l, k.c)
    }
}

/// Parse a text frame from the kline stream into a candle
pub fn parse_stream_candle(text: &str) -> Result<Candle, serde_json::Error> {
    serde_json::from_str::<KlineStreamMessage>(text).map(|msg| msg.k.into())
}

/// Parse the REST kline response body.
///
/// Each record is `[openTimeMs, open, high, low, close, ...]` with prices as
/// strings or numbers. Any record that does not fit makes the whole body malformed.
pub fn parse_rest_klines(body: &Value) -> Result<Vec<Candle>, FetchError> {
    let records = body
        .as_array()
        .ok_or_else(|| FetchError::Malformed("expected a JSON array".to_string()))?;

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| parse_rest_record(record).ok_or_else(|| {
            FetchError::Malformed(format!("record {idx} is not a kline: {record}"))
        }))
        .collect()
}

fn parse_rest_record(record: &Value) -> Option<Candle> {
    let fields = record.as_array()?;
    if fields.len() < 5 {
        return None;
    }
    let open_time_ms = value_as_f64(&fields[0])?;
    Some(Candle::new(
        (open_time_ms / 1000.0).floor() as i64,
        value_as_f64(&fields[1])?,
        value_as_f64(&fields[2])?,
        value_as_f64(&fields[3])?,
        value_as_f64(&fields[4])?,
    ))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_f64_flexible<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_f64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interval_round_trip_codes() {
        for interval in Interval::ALL {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
        }
        assert!("2m".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_selector_keys() {
        assert_eq!(Interval::from_selector_key('1'), Some(Interval::S1));
        assert_eq!(Interval::from_selector_key('2'), Some(Interval::M1));
        assert_eq!(Interval::from_selector_key('8'), Some(Interval::W1));
        assert_eq!(Interval::from_selector_key('9'), None);
        assert_eq!(Interval::from_selector_key('0'), None);
        assert_eq!(Interval::from_selector_key('x'), None);
    }

    #[test]
    fn test_parse_stream_candle() {
        let text = r#"{"e":"kline","E":1700000061000,"s":"ETHUSDT","k":{"t":1700000040000,"T":1700000099999,"s":"ETHUSDT","i":"1m","o":"2000.10","c":"2001.50","h":"2002.00","l":"1999.90","v":"120.5","x":false}}"#;
        let candle = parse_stream_candle(text).unwrap();
        assert_eq!(candle, Candle::new(1_700_000_040, 2000.10, 2002.0, 1999.9, 2001.5));
    }

    #[test]
    fn test_parse_stream_candle_floors_time() {
        let text = r#"{"k":{"t":1700000040999,"o":1,"h":2,"l":0.5,"c":1.5}}"#;
        assert_eq!(parse_stream_candle(text).unwrap().time, 1_700_000_040);
    }

    #[test]
    fn test_parse_stream_candle_rejects_missing_payload() {
        assert!(parse_stream_candle(r#"{"result":null,"id":1}"#).is_err());
        assert!(parse_stream_candle(r#"{"k":{"t":1,"o":"abc","h":"1","l":"1","c":"1"}}"#).is_err());
    }

    #[test]
    fn test_parse_rest_klines_mixed_field_types() {
        let body = json!([
            [1700000000000_i64, "100.0", "101.0", "99.0", "100.5", "10", 1700000059999_i64],
            [1700000060000_i64, 100.5, 102.0, 100.0, 101.0]
        ]);
        let candles = parse_rest_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0], Candle::new(1_700_000_000, 100.0, 101.0, 99.0, 100.5));
        assert_eq!(candles[1], Candle::new(1_700_000_060, 100.5, 102.0, 100.0, 101.0));
    }

    #[test]
    fn test_parse_rest_klines_malformed() {
        struct TestCase {
            body: Value,
        }

        let tests = vec![
            // TC0: error object instead of array
            TestCase { body: json!({"code": -1121, "msg": "Invalid symbol."}) },
            // TC1: record with too few fields
            TestCase { body: json!([[1700000000000_i64, "1", "2", "0.5"]]) },
            // TC2: non-numeric price
            TestCase { body: json!([[1700000000000_i64, "1", "x", "0.5", "1"]]) },
            // TC3: record is not an array
            TestCase { body: json!([{"t": 1}]) },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let result = parse_rest_klines(&test.body);
            assert!(
                matches!(result, Err(FetchError::Malformed(_))),
                "TC{} failed",
                index
            );
        }
    }
}
