//! The real-time session client for Tradecast.
//!
//! This crate is the browser-side half of the authenticated streaming
//! bridge: it obtains a sealed session descriptor, opens the streaming
//! transport, performs the in-band handshake, retries on timeout with a
//! bounded budget, ingests market and account frames, and tears down
//! deterministically.
//!
//! # Architecture
//!
//! ```text
//! View ──commands──→ RealtimeSession ──→ Driver task ──→ WebSocket
//!      ←──events────                        │
//!                                     SessionMachine (pure)
//! ```
//!
//! - [`SessionMachine`] is the pure state machine: every lifecycle flag
//!   in one value, mutated only via defined transitions, stale events
//!   rejected by a generation counter. Unit-testable without I/O.
//! - The driver ([`RealtimeSession::spawn`]) owns the socket and the
//!   timers and asks the machine what each event means.
//! - [`TicketSource`] supplies the sealed descriptor; the production
//!   impl calls the gateway's issuance endpoint.

mod driver;
mod error;
mod machine;
mod ticket;

pub use driver::{ClientConfig, RealtimeSession, SessionCommand, SessionEvent};
pub use error::ClientError;
pub use machine::{CloseVerdict, RetryVerdict, SessionMachine, SessionState};
pub use ticket::{HttpTicketSource, SessionTicket, TicketSource};
