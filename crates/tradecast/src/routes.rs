//! The gateway's protected routes.
//!
//! Every route extracts the bearer credential, verifies it — through
//! the cache by default, freshly for the settlement-grade play routes —
//! and only then touches anything downstream. A missing credential
//! answers 401 before any upstream call is attempted.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{B256, Bytes, U256};
use alloy_signer::SignerSync;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, HOST};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tradecast_auth::{AuthError, IdentityVerifier, bearer_credential};
use tradecast_protocol::UserId;
use tradecast_session::IssuedSession;

use crate::server::AppState;
use crate::sign::{settlement_digest, to_wei};
use crate::TradecastError;

pub(crate) fn router<V: IdentityVerifier>(state: Arc<AppState<V>>) -> Router {
    Router::new()
        .route("/api/session", post(issue_session::<V>))
        .route("/api/play/start", post(start_play::<V>))
        .route("/api/play/end", post(end_play::<V>))
        .route("/api/profile", get(profile::<V>))
        .route("/api/home", get(home::<V>))
        .with_state(state)
}

impl<V: IdentityVerifier> AppState<V> {
    /// Pulls the credential and the verification domain off the request.
    fn credential_and_domain<'h>(
        &'h self,
        headers: &'h HeaderMap,
    ) -> Result<(&'h str, &'h str), AuthError> {
        let credential =
            bearer_credential(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))?;
        let domain = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&self.domain_fallback);
        Ok((credential, domain))
    }

    /// The default verification path: cache-first.
    async fn verify_cached(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let (credential, domain) = self.credential_and_domain(headers)?;
        self.verifier.verify(credential, domain).await
    }

    /// The settlement-grade path: always a fresh upstream check.
    async fn verify_fresh(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let (credential, domain) = self.credential_and_domain(headers)?;
        self.verifier.verify_fresh(credential, domain).await
    }

    /// Proxies a GET to the game backend with the verified identity
    /// appended.
    async fn proxy_get(
        &self,
        path: &str,
        user_id: UserId,
        params: &HashMap<String, String>,
    ) -> Result<Json<Value>, TradecastError> {
        let response = self
            .http
            .get(format!("{}{path}", self.game_backend_url))
            .query(&[("user_id", user_id.0.to_string())])
            .query(params)
            .send()
            .await
            .map_err(|e| TradecastError::Proxy(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TradecastError::Proxy(format!(
                "game backend returned {status}"
            )));
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| TradecastError::Proxy(format!("bad game backend response: {e}")))?;
        Ok(Json(body))
    }
}

// ---------------------------------------------------------------------------
// POST /api/session
// ---------------------------------------------------------------------------

/// Issues a sealed session descriptor for the real-time stream.
///
/// Cached verification: a user starting a round has usually just hit
/// the home route with the same credential. Registration failure maps
/// to 502 with no token in the body (issuance is all-or-nothing).
async fn issue_session<V: IdentityVerifier>(
    State(state): State<Arc<AppState<V>>>,
    headers: HeaderMap,
) -> Result<Json<IssuedSession>, TradecastError> {
    let user_id = state.verify_cached(&headers).await?;
    let issued = state.issuer.issue(user_id).await?;
    Ok(Json(issued))
}

// ---------------------------------------------------------------------------
// POST /api/play/start
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StartPlayResponse {
    session_id: String,
    user_id: UserId,
}

/// Mints a fresh 256-bit play-session identifier.
///
/// Fresh verification: the id is about to be bound on-chain to the
/// caller's money, so a cached verdict is not good enough.
async fn start_play<V: IdentityVerifier>(
    State(state): State<Arc<AppState<V>>>,
    headers: HeaderMap,
) -> Result<Json<StartPlayResponse>, TradecastError> {
    let user_id = state.verify_fresh(&headers).await?;

    let id: [u8; 32] = {
        use rand::Rng;
        rand::rng().random()
    };
    let session_id = format!("{:#x}", B256::from(id));
    tracing::info!(%user_id, %session_id, "play session minted");

    Ok(Json(StartPlayResponse {
        session_id,
        user_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/play/end
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EndPlayRequest {
    session_id: String,
    final_balance: f64,
}

#[derive(Debug, Serialize)]
struct EndPlayResponse {
    session_id: String,
    amount: U256,
    signature: Bytes,
}

/// Signs a settlement authorization for `(session_id, final_balance)`.
///
/// Fresh verification, then `keccak256(seed ‖ session_id ‖ amount)`
/// signed (EIP-191) with the settlement key. The contract verifies the
/// same packing on-chain.
async fn end_play<V: IdentityVerifier>(
    State(state): State<Arc<AppState<V>>>,
    headers: HeaderMap,
    Json(request): Json<EndPlayRequest>,
) -> Result<Json<EndPlayResponse>, TradecastError> {
    let user_id = state.verify_fresh(&headers).await?;

    let session_id = U256::from_str(&request.session_id)
        .map_err(|e| TradecastError::BadRequest(format!("session_id: {e}")))?;
    let amount = to_wei(request.final_balance)?;

    let digest = settlement_digest(state.settlement_seed, session_id, amount);
    let signature = state
        .signer
        .sign_message_sync(digest.as_slice())
        .map_err(|e| TradecastError::Internal(format!("settlement signing: {e}")))?;

    tracing::info!(%user_id, session_id = %request.session_id, %amount, "settlement authorized");

    Ok(Json(EndPlayResponse {
        session_id: request.session_id,
        amount,
        signature: Bytes::from(signature.as_bytes().to_vec()),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/profile, GET /api/home — thin proxies to the game backend
// ---------------------------------------------------------------------------

async fn profile<V: IdentityVerifier>(
    State(state): State<Arc<AppState<V>>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, TradecastError> {
    let user_id = state.verify_cached(&headers).await?;
    state.proxy_get("/api/v1/user/profile", user_id, &params).await
}

async fn home<V: IdentityVerifier>(
    State(state): State<Arc<AppState<V>>>,
    headers: HeaderMap,
) -> Result<Json<Value>, TradecastError> {
    let user_id = state.verify_cached(&headers).await?;
    state.proxy_get("/api/v1/user/home", user_id, &HashMap::new()).await
}
