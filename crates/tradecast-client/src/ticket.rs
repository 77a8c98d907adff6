//! Obtaining session tickets from the gateway.
//!
//! The driver needs a sealed descriptor before it can authenticate a
//! stream. [`TicketSource`] abstracts where that comes from; production
//! uses [`HttpTicketSource`] against the gateway's issuance endpoint,
//! tests hand out canned tickets.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ClientError;

/// A sealed session descriptor plus its expiry, as returned by the
/// issuance endpoint. Reused across reconnects while unexpired.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTicket {
    /// The sealed descriptor, presented verbatim in the handshake.
    pub encrypted_token: String,
    /// When the session (and therefore this ticket) expires.
    pub expires_at: DateTime<Utc>,
}

impl SessionTicket {
    /// Whether the ticket is still worth presenting.
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Produces session tickets for the driver.
pub trait TicketSource: Send + Sync + 'static {
    /// Fetches a fresh ticket from the issuer.
    fn fetch(&self) -> impl std::future::Future<Output = Result<SessionTicket, ClientError>> + Send;
}

/// Ticket source that POSTs to the gateway's issuance endpoint with the
/// user's bearer credential.
#[derive(Debug, Clone)]
pub struct HttpTicketSource {
    client: reqwest::Client,
    endpoint: String,
    credential: String,
}

impl HttpTicketSource {
    /// Points the source at an issuance endpoint (the gateway's
    /// `POST /api/session`) with the credential to present.
    pub fn new(endpoint: &str, credential: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            credential: credential.to_string(),
        }
    }
}

impl TicketSource for HttpTicketSource {
    async fn fetch(&self) -> Result<SessionTicket, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| ClientError::TicketUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::TicketUnavailable(format!(
                "issuance endpoint returned {status}"
            )));
        }

        response
            .json::<SessionTicket>()
            .await
            .map_err(|e| ClientError::TicketUnavailable(format!("bad issuance response: {e}")))
    }
}

// =========================================================================
// Tests
// =========================================================================
