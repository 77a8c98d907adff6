//! `Gateway` builder and server lifecycle.
//!
//! This is the entry point for running the Tradecast gateway. The
//! builder constructs the shared state — the verification cache with its
//! sweeper, the session issuer, the settlement signer — binds the
//! listener, and hands back a [`Gateway`] to serve. Nothing here is a
//! module-level global: the cache is injected into the verifier, the
//! sweeper is an owned task aborted when the gateway shuts down.

use std::sync::Arc;

use alloy_primitives::B256;
use alloy_signer_local::PrivateKeySigner;
use axum::Router;
use tradecast_auth::{
    CacheConfig, CacheSweeper, CachedVerifier, IdentityVerifier, VerificationCache,
};
use tradecast_session::{HttpSessionRegistry, IssuerConfig, SessionIssuer};

use crate::TradecastError;
use crate::routes;

/// Configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: String,

    /// Base URL of the real-time backend, for session registration.
    pub realtime_url: String,

    /// Base URL of the game backend, for the proxied profile/home
    /// routes.
    pub game_backend_url: String,

    /// Secret the session descriptors are sealed under. Shared with the
    /// real-time backend.
    pub token_secret: String,

    /// Seed mixed into every settlement digest.
    pub settlement_seed: B256,

    /// The settlement signing key.
    pub settlement_key: B256,

    /// Verification domain used when a request carries no `Host` header.
    pub domain_fallback: String,

    /// Verification cache TTL and sweep interval.
    pub cache: CacheConfig,

    /// Session duration for issued descriptors.
    pub session: IssuerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            realtime_url: "http://127.0.0.1:9000".to_string(),
            game_backend_url: "http://127.0.0.1:8000".to_string(),
            token_secret: "ws-secret-dev".to_string(),
            settlement_seed: B256::repeat_byte(0x42),
            settlement_key: B256::repeat_byte(0x01),
            domain_fallback: "localhost:3000".to_string(),
            cache: CacheConfig::default(),
            session: IssuerConfig::default(),
        }
    }
}

/// Shared state handed to every route handler.
pub(crate) struct AppState<V> {
    pub(crate) verifier: CachedVerifier<V>,
    pub(crate) issuer: SessionIssuer<HttpSessionRegistry>,
    pub(crate) signer: PrivateKeySigner,
    pub(crate) settlement_seed: B256,
    pub(crate) game_backend_url: String,
    pub(crate) domain_fallback: String,
    pub(crate) http: reqwest::Client,
}

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,ignore
/// let gateway = GatewayBuilder::new()
///     .config(my_config)
///     .build(my_verifier)
///     .await?;
/// gateway.serve().await
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
}

impl GatewayBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the gateway to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Builds the gateway with the given identity verifier: constructs
    /// the cache and its sweeper, the issuer, and the settlement
    /// signer, and binds the listener.
    pub async fn build<V: IdentityVerifier>(
        self,
        verifier: V,
    ) -> Result<Gateway, TradecastError> {
        let config = self.config;

        let signer = PrivateKeySigner::from_bytes(&config.settlement_key)
            .map_err(|e| TradecastError::Config(format!("settlement key: {e}")))?;

        let cache = Arc::new(VerificationCache::new(config.cache.ttl));
        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), config.cache.sweep_interval);

        let issuer = SessionIssuer::new(
            &config.token_secret,
            HttpSessionRegistry::new(&config.realtime_url),
            config.session.clone(),
        );

        let state = Arc::new(AppState {
            verifier: CachedVerifier::new(verifier, cache),
            issuer,
            signer,
            settlement_seed: config.settlement_seed,
            game_backend_url: config.game_backend_url.trim_end_matches('/').to_string(),
            domain_fallback: config.domain_fallback,
            http: reqwest::Client::new(),
        });

        let router = routes::router(state);
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "gateway listening");

        Ok(Gateway {
            listener,
            router,
            _sweeper: sweeper,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Tradecast gateway.
///
/// Owns the cache sweeper: when the gateway is dropped (or `serve`
/// returns), the sweeper task is aborted with it.
pub struct Gateway {
    listener: tokio::net::TcpListener,
    router: Router,
    _sweeper: CacheSweeper,
}

impl Gateway {
    /// Creates a new builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Returns the local address the gateway is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until the process is terminated.
    pub async fn serve(self) -> Result<(), TradecastError> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
