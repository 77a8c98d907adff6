//! A runnable gateway for local development.
//!
//! Wires the Tradecast gateway to a static identity verifier that
//! accepts any numeric credential as the user id — no external identity
//! service required. Point a real-time backend and a game backend at it
//! (or the fakes from the integration tests) and drive the whole
//! session flow by hand:
//!
//! ```text
//! TRADECAST_BIND=127.0.0.1:8080 \
//! TRADECAST_REALTIME_URL=http://127.0.0.1:9000 \
//! TRADECAST_GAME_URL=http://127.0.0.1:8000 \
//! TRADECAST_SECRET=ws-secret-dev \
//! cargo run -p sim-desk
//! ```

use std::str::FromStr;

use alloy_primitives::B256;
use tradecast::{Gateway, GatewayConfig, TradecastError};
use tradecast_auth::{AuthError, IdentityVerifier};
use tradecast_protocol::UserId;

/// Accepts any numeric credential and uses it as the user id.
/// Only for development — never deploy this.
struct StaticVerifier;

impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, credential: &str, _domain: &str) -> Result<UserId, AuthError> {
        let id: u64 = credential
            .parse()
            .map_err(|_| AuthError::InvalidCredential("credential must be a number".into()))?;
        Ok(UserId(id))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), TradecastError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let defaults = GatewayConfig::default();
    let config = GatewayConfig {
        bind_addr: env_or("TRADECAST_BIND", &defaults.bind_addr),
        realtime_url: env_or("TRADECAST_REALTIME_URL", &defaults.realtime_url),
        game_backend_url: env_or("TRADECAST_GAME_URL", &defaults.game_backend_url),
        token_secret: env_or("TRADECAST_SECRET", &defaults.token_secret),
        settlement_seed: parse_b256("TRADECAST_SETTLEMENT_SEED", defaults.settlement_seed)?,
        settlement_key: parse_b256("TRADECAST_SETTLEMENT_KEY", defaults.settlement_key)?,
        ..defaults
    };

    let gateway = Gateway::builder().config(config).build(StaticVerifier).await?;
    tracing::info!(addr = %gateway.local_addr()?, "sim-desk gateway up");
    gateway.serve().await
}

fn parse_b256(name: &str, default: B256) -> Result<B256, TradecastError> {
    match std::env::var(name) {
        Ok(value) => B256::from_str(&value)
            .map_err(|e| TradecastError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(default),
    }
}
