//! The two verification entry points: cached (default) and fresh.
//!
//! Tradecast doesn't validate credentials itself — the external identity
//! service does. This module defines the [`IdentityVerifier`] trait for
//! that upstream check, and [`CachedVerifier`], which fronts it with the
//! [`VerificationCache`](crate::VerificationCache).
//!
//! Ordinary requests go through [`CachedVerifier::verify`]; callers that
//! need a fresh check regardless of cache state (settlement-grade,
//! state-changing actions) use [`CachedVerifier::verify_fresh`]. Both
//! enforce the same failure taxonomy and both populate the cache on
//! success.

use std::sync::Arc;

use tradecast_protocol::UserId;

use crate::{AuthError, VerificationCache};

/// Validates a bearer credential against the external identity service.
///
/// # Trait bounds
///
/// - `Send + Sync` → the verifier is shared across concurrent request
///   handlers.
/// - `'static` → it doesn't borrow temporary data; it lives as long as
///   the gateway.
///
/// # Example
///
/// ```rust
/// use tradecast_auth::{AuthError, IdentityVerifier};
/// use tradecast_protocol::UserId;
///
/// /// Accepts any numeric token and uses it as the user id.
/// /// Only for development — never use this in production!
/// struct DevVerifier;
///
/// impl IdentityVerifier for DevVerifier {
///     async fn verify(
///         &self,
///         credential: &str,
///         _domain: &str,
///     ) -> Result<UserId, AuthError> {
///         let id: u64 = credential.parse().map_err(|_| {
///             AuthError::InvalidCredential("token must be a number".into())
///         })?;
///         Ok(UserId(id))
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Validates the credential and returns the identity it is bound to.
    ///
    /// # Arguments
    /// - `credential` — the opaque bearer string from the request
    /// - `domain` — the serving hostname, presented to the identity
    ///   service as the expected audience
    ///
    /// # Returns
    /// - `Ok(UserId)` — the credential is genuine, here's who it is
    /// - `Err(AuthError::InvalidCredential)` — rejected by the service
    /// - `Err(AuthError::Upstream)` — the service itself failed; must be
    ///   propagated unchanged, never blamed on the caller
    fn verify(
        &self,
        credential: &str,
        domain: &str,
    ) -> impl std::future::Future<Output = Result<UserId, AuthError>> + Send;
}

/// Extracts the bearer credential from an `Authorization` header value.
///
/// `None` (header absent) and a header without the `Bearer ` scheme both
/// fail with [`AuthError::MissingCredential`] — the request never reaches
/// the identity service.
pub fn bearer_credential(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|credential| !credential.is_empty())
        .ok_or(AuthError::MissingCredential)
}

/// An [`IdentityVerifier`] fronted by the process-wide verification cache.
///
/// Owns nothing global: the cache is injected at construction, so the
/// gateway decides its lifecycle and tests substitute their own.
#[derive(Debug)]
pub struct CachedVerifier<V> {
    upstream: V,
    cache: Arc<VerificationCache>,
}

impl<V: IdentityVerifier> CachedVerifier<V> {
    /// Wraps an upstream verifier with the given cache.
    pub fn new(upstream: V, cache: Arc<VerificationCache>) -> Self {
        Self { upstream, cache }
    }

    /// The default path: answer from cache when possible.
    ///
    /// A cache hit performs zero upstream calls. On a miss the upstream
    /// verdict is cached, so the expensive check runs at most once per
    /// credential per TTL window.
    pub async fn verify(&self, credential: &str, domain: &str) -> Result<UserId, AuthError> {
        if let Some(user_id) = self.cache.lookup(credential) {
            tracing::trace!(%user_id, "credential verified from cache");
            return Ok(user_id);
        }
        self.verify_fresh(credential, domain).await
    }

    /// The fresh path: always hit the identity service, ignoring any
    /// cached verdict. Used for settlement-grade, state-changing actions.
    ///
    /// Still populates the cache on success, so a fresh check benefits
    /// the ordinary requests that follow it.
    pub async fn verify_fresh(&self, credential: &str, domain: &str) -> Result<UserId, AuthError> {
        let user_id = self.upstream.verify(credential, domain).await?;
        self.cache.store(credential, user_id);
        tracing::debug!(%user_id, "credential verified upstream");
        Ok(user_id)
    }

    /// The cache this verifier reads and writes.
    pub fn cache(&self) -> &Arc<VerificationCache> {
        &self.cache
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Counts upstream calls; rejects the credential `"bad"`, fails with
    /// an upstream fault for `"flaky"`, accepts everything else as
    /// user 42.
    struct CountingVerifier {
        calls: AtomicUsize,
    }

    impl CountingVerifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl IdentityVerifier for &'static CountingVerifier {
        async fn verify(&self, credential: &str, _domain: &str) -> Result<UserId, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match credential {
                "bad" => Err(AuthError::InvalidCredential("bad signature".into())),
                "flaky" => Err(AuthError::Upstream("identity service 503".into())),
                _ => Ok(UserId(42)),
            }
        }
    }

    fn leak(verifier: CountingVerifier) -> &'static CountingVerifier {
        Box::leak(Box::new(verifier))
    }

    fn cached(
        upstream: &'static CountingVerifier,
        ttl: Duration,
    ) -> CachedVerifier<&'static CountingVerifier> {
        CachedVerifier::new(upstream, Arc::new(VerificationCache::new(ttl)))
    }

    // =====================================================================
    // bearer_credential()
    // =====================================================================

    #[test]
    fn test_bearer_credential_extracts_token() {
        assert_eq!(bearer_credential(Some("Bearer abc.def")), Ok("abc.def"));
    }

    #[test]
    fn test_bearer_credential_missing_header() {
        assert_eq!(bearer_credential(None), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_bearer_credential_wrong_scheme() {
        assert_eq!(
            bearer_credential(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_bearer_credential_empty_token() {
        assert_eq!(
            bearer_credential(Some("Bearer ")),
            Err(AuthError::MissingCredential)
        );
    }

    // =====================================================================
    // verify() — the cached path
    // =====================================================================

    #[tokio::test]
    async fn test_verify_twice_within_ttl_hits_upstream_once() {
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::from_secs(3600));

        assert_eq!(verifier.verify("cred", "example.com").await.unwrap(), UserId(42));
        assert_eq!(verifier.verify("cred", "example.com").await.unwrap(), UserId(42));

        assert_eq!(upstream.calls(), 1, "second call must be served from cache");
    }

    #[tokio::test]
    async fn test_verify_after_ttl_expiry_hits_upstream_again() {
        // Zero TTL: the cached verdict is expired by the time it's read.
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::ZERO);

        verifier.verify("cred", "example.com").await.unwrap();
        verifier.verify("cred", "example.com").await.unwrap();

        assert_eq!(upstream.calls(), 2, "expired entry must not be served");
    }

    #[tokio::test]
    async fn test_verify_rejection_is_not_cached() {
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::from_secs(3600));

        assert!(matches!(
            verifier.verify("bad", "example.com").await,
            Err(AuthError::InvalidCredential(_))
        ));
        assert!(verifier.cache().is_empty(), "failures must never be cached");

        // A retry goes back upstream rather than replaying the rejection.
        let _ = verifier.verify("bad", "example.com").await;
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_verify_upstream_fault_propagates_unchanged() {
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::from_secs(3600));

        let err = verifier.verify("flaky", "example.com").await.unwrap_err();
        assert!(
            matches!(err, AuthError::Upstream(ref m) if m.contains("503")),
            "upstream faults must not be collapsed into InvalidCredential, got {err:?}"
        );
    }

    // =====================================================================
    // verify_fresh()
    // =====================================================================

    #[tokio::test]
    async fn test_verify_fresh_ignores_cache() {
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::from_secs(3600));

        verifier.verify("cred", "example.com").await.unwrap();
        verifier.verify_fresh("cred", "example.com").await.unwrap();

        assert_eq!(upstream.calls(), 2, "fresh path must always go upstream");
    }

    #[tokio::test]
    async fn test_verify_fresh_populates_cache() {
        let upstream = leak(CountingVerifier::new());
        let verifier = cached(upstream, Duration::from_secs(3600));

        verifier.verify_fresh("cred", "example.com").await.unwrap();
        verifier.verify("cred", "example.com").await.unwrap();

        assert_eq!(upstream.calls(), 1, "fresh verdict should serve cached reads");
    }
}
