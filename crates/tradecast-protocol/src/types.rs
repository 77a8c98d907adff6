//! Identity, account, and frame types for the real-time stream.
//!
//! The server→client side of the protocol is deliberately duck-typed on
//! the wire (the backend predates this client). We keep that mess out of
//! the rest of the codebase by classifying every inbound text frame into
//! a [`ServerFrame`] in exactly one place, with an explicit
//! [`ServerFrame::Unrecognized`] variant instead of silent fallthrough.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::candle::Candle;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A verified user identity, as produced by the identity service.
///
/// Newtype over the numeric id so it can't be confused with other `u64`
/// values (session ids, timestamps) in signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Account snapshot
// ---------------------------------------------------------------------------

/// Which side of the market the account is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Flat — no open position.
    #[default]
    None,
    Long,
    Short,
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Direction::None => serializer.serialize_none(),
            Direction::Long => serializer.serialize_str("long"),
            Direction::Short => serializer.serialize_str("short"),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The backend sends `null` for flat, and we treat anything we
        // don't recognize the same way rather than failing the whole
        // wallet frame.
        Ok(match Option::<String>::deserialize(deserializer)?.as_deref() {
            Some("long") => Direction::Long,
            Some("short") => Direction::Short,
            _ => Direction::None,
        })
    }
}

/// The account state streamed by the backend alongside market data.
///
/// Last message wins; the backend is the source of truth for any
/// cross-field consistency (`balance_total >= balance_free`, no
/// simultaneous long+short). Every field is defaulted so a partial
/// wallet frame still decodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub balance_total: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub total_profit: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub balance_free: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub in_position: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub long_average: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub short_average: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub position_size: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub entry_price: f64,
}

impl AccountSnapshot {
    /// Whether the account has an open position.
    pub fn has_position(&self) -> bool {
        self.direction != Direction::None
    }
}

/// Accepts numbers, numeric strings, or null; everything else is 0.
fn f64_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(crate::candle::as_finite_f64(&value).unwrap_or(0.0))
}

// ---------------------------------------------------------------------------
// Client → server frames
// ---------------------------------------------------------------------------

/// Everything the client ever sends over the stream.
///
/// The handshake frame is JSON; the rest are bare text literals (the
/// backend matches on the raw frame text, not on JSON).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// First frame after the transport opens: the sealed session
    /// descriptor obtained from the issuance endpoint.
    Hello { encrypted_token: String },
    /// Request the initial historical candle window.
    Start,
    /// Client-originated termination signal.
    Stop,
    /// Trade intents — only valid once authenticated.
    Long,
    Short,
    ClosePosition,
}

impl ClientFrame {
    /// The exact text put on the wire for this frame.
    pub fn encode(&self) -> String {
        match self {
            ClientFrame::Hello { encrypted_token } => {
                json!({ "encrypted_token": encrypted_token }).to_string()
            }
            ClientFrame::Start => "start".to_string(),
            ClientFrame::Stop => "stop".to_string(),
            ClientFrame::Long => "long".to_string(),
            ClientFrame::Short => "short".to_string(),
            ClientFrame::ClosePosition => "close".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client frames
// ---------------------------------------------------------------------------

/// One classified inbound frame from the real-time backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// `{"authenticated": true}` — the handshake succeeded.
    AuthAck,
    /// `{"error": "..."}` — explicit rejection; surfaced verbatim and
    /// never retried.
    AuthRejected(String),
    /// The initial historical candle window. Candles that failed
    /// normalization have already been discarded.
    Window(Vec<Candle>),
    /// A single incremental candle update.
    Update(Candle),
    /// An account/wallet snapshot.
    Wallet(AccountSnapshot),
    /// Anything else, including malformed JSON and candle updates that
    /// failed normalization. Callers drop these (with a debug log), they
    /// never flow further.
    Unrecognized,
}

impl ServerFrame {
    /// Classifies one raw text frame.
    ///
    /// Classification order matters: handshake frames first, then the
    /// three data shapes, mirroring the backend's own precedence.
    pub fn decode(text: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return ServerFrame::Unrecognized;
        };
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Self {
        if value.get("authenticated").and_then(Value::as_bool) == Some(true) {
            return ServerFrame::AuthAck;
        }

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return ServerFrame::AuthRejected(message.to_string());
        }

        // Initial window: tagged "prices", or an untagged `window` array.
        // Some backend builds ship the candles under `data` instead.
        let tagged_prices = value.get("type").and_then(Value::as_str) == Some("prices");
        let window = value.get("window").filter(|w| w.is_array());
        if tagged_prices || window.is_some() {
            let candles = window
                .or_else(|| value.get("data"))
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Candle::from_value).collect())
                .unwrap_or_default();
            return ServerFrame::Window(candles);
        }

        if value.get("type").and_then(Value::as_str) == Some("wallet") {
            if let Some(wallet) = value.get("wallet") {
                if let Ok(snapshot) = AccountSnapshot::deserialize(wallet) {
                    return ServerFrame::Wallet(snapshot);
                }
            }
            return ServerFrame::Unrecognized;
        }

        match Candle::from_value(value) {
            Some(candle) => ServerFrame::Update(candle),
            None => ServerFrame::Unrecognized,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
