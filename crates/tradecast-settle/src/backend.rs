//! The settlement backend: session minting and authorization signing.
//!
//! The contract only accepts an `end_session` call carrying a signature
//! from the server's settlement key over `(sessionId, amount)`. The
//! backend produces that signature — and the fresh session ids — behind
//! the gateway's play endpoints.

use alloy_primitives::{Bytes, U256};
use serde::Deserialize;
use serde_json::json;

use crate::{PlaySessionId, SettleError};

/// A signed settlement authorization for `(sessionId, amount)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettlementAuthorization {
    /// The settled amount in wei, as the backend computed it from the
    /// final balance.
    pub amount: U256,
    /// The server's signature the contract verifies.
    pub signature: Bytes,
}

/// Mints session ids and settlement authorizations.
pub trait SettlementBackend: Send + Sync + 'static {
    /// Requests a fresh play-session identifier. Requires authorization
    /// on the backend side.
    fn mint_session_id(
        &self,
    ) -> impl std::future::Future<Output = Result<PlaySessionId, SettleError>> + Send;

    /// Requests a signed settlement authorization for the session's
    /// final balance.
    fn authorize(
        &self,
        id: PlaySessionId,
        final_balance: f64,
    ) -> impl std::future::Future<Output = Result<SettlementAuthorization, SettleError>> + Send;
}

/// Backend client for the gateway's play endpoints.
#[derive(Debug, Clone)]
pub struct HttpSettlementBackend {
    client: reqwest::Client,
    base_url: String,
    credential: String,
}

impl HttpSettlementBackend {
    /// Points the backend at the gateway with the credential to present.
    pub fn new(base_url: &str, credential: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.to_string(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SettleError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| SettleError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SettleError::Backend(format!("backend returned {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SettleError::Backend(format!("bad backend response: {e}")))
    }
}

#[derive(Deserialize)]
struct MintResponse {
    session_id: PlaySessionId,
}

impl SettlementBackend for HttpSettlementBackend {
    async fn mint_session_id(&self) -> Result<PlaySessionId, SettleError> {
        let minted: MintResponse = self.post_json("/api/play/start", json!({})).await?;
        Ok(minted.session_id)
    }

    async fn authorize(
        &self,
        id: PlaySessionId,
        final_balance: f64,
    ) -> Result<SettlementAuthorization, SettleError> {
        self.post_json(
            "/api/play/end",
            json!({
                "session_id": id.to_string(),
                "final_balance": final_balance,
            }),
        )
        .await
    }
}
