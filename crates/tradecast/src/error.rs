//! Unified error type for the gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tradecast_auth::AuthError;
use tradecast_session::SessionError;

/// Top-level error that wraps the sub-crate errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically in the
/// route handlers.
#[derive(Debug, thiserror::Error)]
pub enum TradecastError {
    /// Credential extraction or verification failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session issuance failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The request body was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The game backend could not be reached or answered with an error.
    #[error("game backend fault: {0}")]
    Proxy(String),

    /// The gateway was misconfigured (bad settlement key, bad bind
    /// address).
    #[error("configuration error: {0}")]
    Config(String),

    /// An internal fault (settlement signing).
    #[error("internal error: {0}")]
    Internal(String),

    /// Binding or serving the listener failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// HTTP mapping. Missing/invalid credentials are the caller's fault
/// (401); upstream and backend faults are gateway-side (502); nothing
/// leaks internals beyond the variant's message.
impl IntoResponse for TradecastError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TradecastError::Auth(AuthError::MissingCredential) => {
                (StatusCode::UNAUTHORIZED, "Missing token".to_string())
            }
            TradecastError::Auth(AuthError::InvalidCredential(_)) => {
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            TradecastError::Auth(AuthError::Upstream(_)) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            TradecastError::Session(SessionError::BackendUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            TradecastError::Session(SessionError::InvalidDescriptor(_)) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            TradecastError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            TradecastError::Proxy(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            TradecastError::Config(_) | TradecastError::Internal(_) | TradecastError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_auth_error() {
        let err: TradecastError = AuthError::MissingCredential.into();
        assert!(matches!(err, TradecastError::Auth(_)));
        assert_eq!(err.to_string(), "Missing token");
    }

    #[test]
    fn test_from_session_error() {
        let err: TradecastError = SessionError::BackendUnavailable("500".into()).into();
        assert!(matches!(err, TradecastError::Session(_)));
        assert!(err.to_string().contains("500"));
    }
}
