//! The settlement bridge: finalizing play sessions against the ledger.
//!
//! This system never owns on-chain state — it reads and writes the play
//! session contract through the [`Ledger`] trait and asks the backend
//! for signed settlement authorizations through [`SettlementBackend`].
//! The [`SettlementBridge`] sits on top and enforces the rules that
//! matter:
//!
//! - starting a session switches networks at most once, silently, and
//!   then gives up with a mismatch the user has to resolve;
//! - ending a session performs three pre-flight reads (pause flag,
//!   ownership, ended flag) and submits **zero** writes unless all pass;
//! - a session is settled at most once, even when an exit button and a
//!   disconnect handler race each other;
//! - no settlement failure ever traps the user in a session.

mod backend;
mod bridge;
mod error;
mod ledger;
mod types;

pub use backend::{HttpSettlementBackend, SettlementAuthorization, SettlementBackend};
pub use bridge::{BridgeConfig, SettlementBridge};
pub use error::{LedgerError, SettleError};
pub use ledger::Ledger;
pub use types::{PlaySession, PlaySessionId, TxRef};
