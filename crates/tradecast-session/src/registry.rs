//! Registering sealed descriptors with the real-time backend.
//!
//! The backend must learn about a descriptor before the client can
//! authenticate with it. The [`SessionRegistry`] trait abstracts that
//! call so the issuer can be tested against a fake; production uses
//! [`HttpSessionRegistry`].

use serde_json::json;

use crate::SessionError;

/// Announces a sealed descriptor to the real-time backend.
pub trait SessionRegistry: Send + Sync + 'static {
    /// Registers the sealed blob. Any outcome other than an explicit
    /// success is [`SessionError::BackendUnavailable`].
    fn register(
        &self,
        sealed: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// Registry that POSTs `{"encrypted_token": …}` to the backend's
/// `/start_session` endpoint.
#[derive(Debug, Clone)]
pub struct HttpSessionRegistry {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSessionRegistry {
    /// Points the registry at the real-time backend's base URL.
    pub fn new(realtime_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/start_session", realtime_url.trim_end_matches('/')),
        }
    }
}

impl SessionRegistry for HttpSessionRegistry {
    async fn register(&self, sealed: &str) -> Result<(), SessionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "encrypted_token": sealed }))
            .send()
            .await
            .map_err(|e| SessionError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "real-time backend refused session registration");
            return Err(SessionError::BackendUnavailable(format!(
                "registration returned {status}"
            )));
        }
        Ok(())
    }
}
