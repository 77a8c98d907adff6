//! Wire protocol for Tradecast's real-time trading stream.
//!
//! This crate defines the "language" spoken between the browser-side
//! session client and the real-time market backend:
//!
//! - **Types** ([`UserId`], [`AccountSnapshot`], [`ClientFrame`],
//!   [`ServerFrame`]) — the shapes that travel on the wire.
//! - **Candles** ([`Candle`], [`CandleStore`]) — OHLC normalization and
//!   the ordering rules that keep the chart monotonic in time.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw text frames) and
//! the session state machine. It doesn't know about sockets, retries, or
//! settlement — it only knows how to classify and normalize messages.
//!
//! ```text
//! Transport (text) → Protocol (ServerFrame) → Session client (state)
//! ```
//!
//! Inbound frames are decoded exactly once, at the transport boundary,
//! into a tagged [`ServerFrame`]. Anything the backend sends that we do
//! not recognize becomes [`ServerFrame::Unrecognized`] — there is no
//! silent fallthrough and no re-sniffing further up the stack.

mod candle;
mod types;

pub use candle::{Applied, Candle, CandleStore};
pub use types::{AccountSnapshot, ClientFrame, Direction, ServerFrame, UserId};
