//! Error types for session issuance.

/// Errors that can occur while minting or opening a session descriptor.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The real-time backend did not accept the registration call.
    /// Issuance is aborted; no descriptor reaches the client.
    #[error("real-time backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A sealed descriptor failed authentication on open — tampered
    /// with, truncated, or sealed under a different secret.
    #[error("descriptor rejected: {0}")]
    InvalidDescriptor(String),
}
