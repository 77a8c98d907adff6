//! The Tradecast gateway.
//!
//! Thin HTTP front for the trading game: every route verifies an opaque
//! bearer credential against the external identity service (through the
//! process-wide verification cache), and then either issues a sealed
//! real-time session descriptor, mints/authorizes a play session for
//! the settlement flow, or proxies to the game backend.
//!
//! # Architecture
//!
//! ```text
//! Browser view
//!   │  Authorization: Bearer <credential>
//!   ▼
//! Gateway (this crate)
//!   ├─ tradecast-auth     credential verification + TTL cache
//!   ├─ tradecast-session  descriptor sealing + backend registration
//!   └─ settlement signing keccak-packed digest, EIP-191
//! ```
//!
//! The real-time stream itself never passes through here — clients take
//! the issued descriptor straight to the streaming backend
//! (`tradecast-client` drives that side).

mod error;
mod routes;
mod server;
mod sign;

pub use error::TradecastError;
pub use server::{Gateway, GatewayBuilder, GatewayConfig};
pub use sign::{settlement_digest, to_wei};
