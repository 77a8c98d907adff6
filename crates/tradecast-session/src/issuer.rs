//! The session issuer: mint, seal, register — all or nothing.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tradecast_protocol::UserId;

use crate::{DescriptorSealer, SessionDescriptor, SessionError, SessionRegistry};

/// Configuration for session issuance.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// How long an issued session lives. Default: 6 minutes.
    pub session_duration_secs: i64,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 6 * 60,
        }
    }
}

/// What the client gets back from a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IssuedSession {
    /// The sealed descriptor, opaque to the client. Presented verbatim
    /// as the first frame of the streaming handshake.
    pub encrypted_token: String,

    /// When the session expires. ISO-8601 on the wire.
    pub expires_at: DateTime<Utc>,
}

/// Mints sealed session descriptors and registers them with the
/// real-time backend.
#[derive(Debug)]
pub struct SessionIssuer<R> {
    sealer: DescriptorSealer,
    registry: R,
    config: IssuerConfig,
}

impl<R: SessionRegistry> SessionIssuer<R> {
    /// Creates an issuer sealing under the given secret.
    pub fn new(secret: &str, registry: R, config: IssuerConfig) -> Self {
        Self {
            sealer: DescriptorSealer::new(secret),
            registry,
            config,
        }
    }

    /// Issues a session for a verified user.
    ///
    /// All-or-nothing: if the backend registration fails, the error
    /// propagates and the sealed descriptor is never returned — there is
    /// no partial state in which a client holds a token the backend has
    /// not seen.
    pub async fn issue(&self, user_id: UserId) -> Result<IssuedSession, SessionError> {
        let session_end = Utc::now() + ChronoDuration::seconds(self.config.session_duration_secs);
        let descriptor = SessionDescriptor::mint(user_id, session_end);
        let sealed = self.sealer.seal(&descriptor);

        self.registry.register(&sealed).await?;
        tracing::info!(%user_id, %session_end, "session issued");

        Ok(IssuedSession {
            encrypted_token: sealed,
            expires_at: session_end,
        })
    }

    /// The sealer this issuer encrypts with, for collaborators that need
    /// to open descriptors (the real-time backend side in tests).
    pub fn sealer(&self) -> &DescriptorSealer {
        &self.sealer
    }
}

// =========================================================================
// Tests
// =========================================================================
