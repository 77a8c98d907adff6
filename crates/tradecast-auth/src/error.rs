//! Error types for the auth layer.

/// Errors that can occur while verifying a credential.
///
/// The split matters at the HTTP boundary: the first two map to 401,
/// while [`AuthError::Upstream`] is a fault of the identity service
/// itself and is propagated unchanged rather than blamed on the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer credential was present on the request.
    #[error("Missing token")]
    MissingCredential,

    /// The identity service rejected the credential (bad signature,
    /// expired, wrong audience).
    #[error("Invalid token")]
    InvalidCredential(String),

    /// The identity service failed in some other way (network fault,
    /// 5xx, malformed response). Treated as transient/unknown — never
    /// collapsed into [`AuthError::InvalidCredential`].
    #[error("identity service fault: {0}")]
    Upstream(String),
}
