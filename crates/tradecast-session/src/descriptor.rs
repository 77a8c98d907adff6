//! The session descriptor: what the sealed blob actually contains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradecast_protocol::UserId;

/// The plaintext of a sealed session descriptor.
///
/// Opaque to the client: it only ever sees the sealed form. The fields
/// are read by exactly two parties — the issuer that mints it and the
/// real-time backend that consumes it once during the streaming
/// handshake. There is no revocation path; the descriptor simply stops
/// being honored at `session_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// 256 bits of randomness, hex-encoded. Uniquely identifies this
    /// play attempt to the backend.
    pub token: String,

    /// When the real-time session expires. Wire form is ISO-8601.
    pub session_end: DateTime<Utc>,

    /// The verified identity this descriptor is bound to.
    pub user_id: UserId,
}

impl SessionDescriptor {
    /// Mints a descriptor for a user with a fresh random token.
    pub fn mint(user_id: UserId, session_end: DateTime<Utc>) -> Self {
        Self {
            token: random_token(),
            session_end,
            user_id,
        }
    }
}

/// Generates a random 64-character hex string (256 bits of entropy).
fn random_token() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
