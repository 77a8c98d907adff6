//! OHLC candle normalization and ordering.
//!
//! The market backend is not pedantic about its candle encoding: the
//! timestamp may arrive under several key names (or as element 0 of an
//! array candle), in seconds, in milliseconds, or as a date string, and
//! numeric fields are sometimes strings. All of that is normalized here,
//! once, into a [`Candle`] — or rejected outright. A candle that fails
//! normalization is discarded, never repaired.
//!
//! [`CandleStore`] then enforces the ordering rules: stored candle times
//! are strictly increasing, an update for the newest candle replaces it
//! in place, and out-of-order data is never applied out of order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamps above this have more than 10 digits and are treated as
/// millisecond epochs.
const MAX_SECONDS_EPOCH: i64 = 9_999_999_999;

/// A single OHLC candle, timestamped in whole unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Normalizes one raw wire candle.
    ///
    /// Accepts either an object (time under `timestamp`, `open_time`,
    /// `time`, or `t`; OHLC under their own names) or a 5-element array
    /// `[time, open, high, low, close]`.
    ///
    /// Returns `None` — discarding the candle — when:
    /// - any field is missing or not coercible to a finite number,
    /// - the timestamp is malformed (see [`normalize_timestamp`]),
    /// - basic sanity fails: `high < low`, or non-positive open/close.
    pub fn from_value(value: &Value) -> Option<Self> {
        let (time_v, open_v, high_v, low_v, close_v) = match value {
            Value::Array(items) => (
                items.first()?,
                items.get(1)?,
                items.get(2)?,
                items.get(3)?,
                items.get(4)?,
            ),
            Value::Object(fields) => {
                let time = fields
                    .get("timestamp")
                    .or_else(|| fields.get("open_time"))
                    .or_else(|| fields.get("time"))
                    .or_else(|| fields.get("t"))?;
                (
                    time,
                    fields.get("open")?,
                    fields.get("high")?,
                    fields.get("low")?,
                    fields.get("close")?,
                )
            }
            _ => return None,
        };

        let time = normalize_timestamp(time_v)?;
        let open = as_finite_f64(open_v)?;
        let high = as_finite_f64(high_v)?;
        let low = as_finite_f64(low_v)?;
        let close = as_finite_f64(close_v)?;

        if high < low || open <= 0.0 || close <= 0.0 {
            return None;
        }

        Some(Self {
            time,
            open,
            high,
            low,
            close,
        })
    }
}

/// Coerces a JSON value into a finite `f64` (numbers or numeric strings).
pub(crate) fn as_finite_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Normalizes a wire timestamp into whole unix seconds.
///
/// - Numbers (and numeric strings) with more than 10 digits are taken as
///   millisecond epochs and divided by 1000.
/// - Other numerics are truncated to integer seconds.
/// - RFC 3339 date strings are parsed and floored to seconds.
/// - Anything else is malformed and yields `None`.
pub(crate) fn normalize_timestamp(value: &Value) -> Option<i64> {
    if let Some(n) = as_finite_f64(value) {
        let secs = n.trunc() as i64;
        return Some(if secs > MAX_SECONDS_EPOCH {
            secs / 1000
        } else {
            secs
        });
    }
    if let Value::String(s) = value {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Some(dt.timestamp());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// CandleStore
// ---------------------------------------------------------------------------

/// What [`CandleStore::apply`] did with an incremental update.
///
/// Returned so callers can react (repaint, log) without re-deriving the
/// ordering decision themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The update carried a new, strictly greater timestamp and was
    /// appended as a fresh candle.
    Appended,
    /// The update matched the newest stored timestamp and replaced that
    /// candle in place (the live candle ticking).
    Replaced,
    /// The update was older than the newest stored candle and was
    /// dropped. Out-of-order data is never applied out of order.
    Dropped,
}

/// The client-side candle series for one real-time session.
///
/// Invariant: stored candle times are strictly increasing at all times.
#[derive(Debug, Default)]
pub struct CandleStore {
    candles: Vec<Candle>,
}

impl CandleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the series with an initial historical window.
    ///
    /// The window is sorted ascending by time; when the backend sends
    /// duplicate timestamps, the later entry wins.
    pub fn load_window(&mut self, mut window: Vec<Candle>) {
        window.sort_by_key(|c| c.time);
        let mut deduped: Vec<Candle> = Vec::with_capacity(window.len());
        for candle in window {
            match deduped.last_mut() {
                Some(last) if last.time == candle.time => *last = candle,
                _ => deduped.push(candle),
            }
        }
        self.candles = deduped;
    }

    /// Applies one incremental update under the ordering rules.
    ///
    /// - equal to the newest stored time → replace the newest candle,
    /// - strictly greater → append,
    /// - otherwise → drop.
    pub fn apply(&mut self, candle: Candle) -> Applied {
        match self.candles.last_mut() {
            Some(last) if candle.time == last.time => {
                *last = candle;
                Applied::Replaced
            }
            Some(last) if candle.time < last.time => Applied::Dropped,
            _ => {
                self.candles.push(candle);
                Applied::Appended
            }
        }
    }

    /// The stored series, oldest first.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// The newest stored candle, if any.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Number of stored candles.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns `true` when no candles are stored.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Shorthand for building a candle in tests.
    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
        }
    }

    // =====================================================================
    // normalize_timestamp()
    // =====================================================================

    #[test]
    fn test_normalize_timestamp_seconds_passes_through() {
        assert_eq!(normalize_timestamp(&json!(1_700_000_000)), Some(1_700_000_000));
    }

    #[test]
    fn test_normalize_timestamp_milliseconds_divided() {
        // 13 digits → millisecond epoch → divided by 1000.
        assert_eq!(
            normalize_timestamp(&json!(1_700_000_000_123_i64)),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_normalize_timestamp_numeric_string() {
        assert_eq!(normalize_timestamp(&json!("1700000000")), Some(1_700_000_000));
        // Numeric strings get the same millisecond heuristic.
        assert_eq!(
            normalize_timestamp(&json!("1700000000123")),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_normalize_timestamp_rfc3339_string() {
        assert_eq!(
            normalize_timestamp(&json!("2023-11-14T22:13:20Z")),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_normalize_timestamp_fractional_seconds_truncated() {
        assert_eq!(normalize_timestamp(&json!(1700000000.9)), Some(1_700_000_000));
    }

    #[test]
    fn test_normalize_timestamp_garbage_is_none() {
        assert_eq!(normalize_timestamp(&json!("next tuesday")), None);
        assert_eq!(normalize_timestamp(&json!(null)), None);
        assert_eq!(normalize_timestamp(&json!({"nested": 1})), None);
    }

    // =====================================================================
    // Candle::from_value()
    // =====================================================================

    #[test]
    fn test_from_value_object_with_named_fields() {
        let c = Candle::from_value(&json!({
            "time": 100, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5
        }))
        .expect("should parse");
        assert_eq!(c.time, 100);
        assert_eq!(c.close, 1.5);
    }

    #[test]
    fn test_from_value_accepts_timestamp_aliases() {
        for key in ["timestamp", "open_time", "time", "t"] {
            let c = Candle::from_value(&json!({
                key: 100, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5
            }));
            assert!(c.is_some(), "alias {key} should parse");
        }
    }

    #[test]
    fn test_from_value_array_form() {
        let c = Candle::from_value(&json!([100, 1.0, 2.0, 0.5, 1.5]))
            .expect("should parse");
        assert_eq!(c.time, 100);
        assert_eq!(c.open, 1.0);
        assert_eq!(c.low, 0.5);
    }

    #[test]
    fn test_from_value_stringly_numbers() {
        // Backends sometimes quote their numbers.
        let c = Candle::from_value(&json!({
            "t": "100", "open": "1.0", "high": "2.0", "low": "0.5", "close": "1.5"
        }))
        .expect("should parse");
        assert_eq!(c.high, 2.0);
    }

    #[test]
    fn test_from_value_rejects_high_below_low() {
        let c = Candle::from_value(&json!({
            "time": 100, "open": 1.0, "high": 0.4, "low": 0.5, "close": 1.5
        }));
        assert!(c.is_none(), "inverted high/low must be discarded");
    }

    #[test]
    fn test_from_value_rejects_non_positive_open_close() {
        for (open, close) in [(0.0, 1.5), (-1.0, 1.5), (1.0, 0.0)] {
            let c = Candle::from_value(&json!({
                "time": 100, "open": open, "high": 2.0, "low": 0.1, "close": close
            }));
            assert!(c.is_none(), "open={open} close={close} must be discarded");
        }
    }

    #[test]
    fn test_from_value_rejects_malformed_timestamp() {
        let c = Candle::from_value(&json!({
            "time": "not a time", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5
        }));
        assert!(c.is_none(), "malformed timestamp discards the whole update");
    }

    #[test]
    fn test_from_value_rejects_missing_field() {
        let c = Candle::from_value(&json!({
            "time": 100, "open": 1.0, "high": 2.0, "low": 0.5
        }));
        assert!(c.is_none());
    }

    // =====================================================================
    // CandleStore ordering rules
    // =====================================================================

    #[test]
    fn test_apply_equal_time_replaces_newest() {
        let mut store = CandleStore::new();
        assert_eq!(store.apply(candle(100, 10.0)), Applied::Appended);
        assert_eq!(store.apply(candle(100, 11.0)), Applied::Replaced);

        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().close, 11.0);
    }

    #[test]
    fn test_apply_greater_time_appends() {
        let mut store = CandleStore::new();
        store.apply(candle(100, 10.0));
        assert_eq!(store.apply(candle(110, 12.0)), Applied::Appended);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_apply_stale_time_dropped() {
        let mut store = CandleStore::new();
        store.apply(candle(100, 10.0));
        assert_eq!(store.apply(candle(90, 9.0)), Applied::Dropped);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_apply_sequence_keeps_strictly_increasing_times() {
        // The canonical sequence: update, stale, new — exactly two candles
        // survive, at t=100 (last values) and t=110, in increasing order.
        let mut store = CandleStore::new();
        store.apply(candle(100, 10.0));
        store.apply(candle(100, 11.0));
        store.apply(candle(90, 9.0));
        store.apply(candle(110, 12.0));

        let times: Vec<i64> = store.candles().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![100, 110]);
        assert_eq!(store.candles()[0].close, 11.0, "t=100 holds the last values");
    }

    #[test]
    fn test_load_window_sorts_ascending() {
        let mut store = CandleStore::new();
        store.load_window(vec![candle(300, 3.0), candle(100, 1.0), candle(200, 2.0)]);

        let times: Vec<i64> = store.candles().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_load_window_duplicate_times_later_wins() {
        let mut store = CandleStore::new();
        store.load_window(vec![candle(100, 1.0), candle(100, 2.0)]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().close, 2.0);
    }

    #[test]
    fn test_load_window_replaces_previous_series() {
        let mut store = CandleStore::new();
        store.load_window(vec![candle(100, 1.0)]);
        store.load_window(vec![candle(500, 5.0)]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().time, 500);
    }
}
