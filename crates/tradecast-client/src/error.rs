//! Error types for the real-time client.

/// Errors that can occur while running a real-time session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The issuance endpoint refused or failed to produce a session
    /// ticket. Surfaced verbatim; the handshake never starts.
    #[error("session ticket unavailable: {0}")]
    TicketUnavailable(String),

    /// The streaming transport failed (connect, send, or protocol
    /// fault). Feeds the bounded retry budget rather than surfacing
    /// directly.
    #[error("transport failure: {0}")]
    Transport(String),
}
