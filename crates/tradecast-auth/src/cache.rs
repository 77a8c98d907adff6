//! The verification cache: remembers recently verified credentials.
//!
//! Verifying a credential means a round-trip to the external identity
//! service. The same credential arrives on every request a user makes,
//! so we cache the verdict for a short TTL, keyed by a one-way hash of
//! the credential — the raw bearer string is never retained.
//!
//! Expiry happens two ways:
//! - **lazily**: a lookup that finds an expired entry deletes it and
//!   reports a miss,
//! - **periodically**: a [`CacheSweeper`] task removes everything past
//!   its expiry on a fixed interval, independent of request traffic.
//!
//! # Concurrency note
//!
//! The cache is shared across concurrent request handlers. Writes are
//! single-key upserts with no cross-key invariants, so a plain
//! `std::sync::Mutex` around the map is enough — critical sections are
//! short and never held across an `.await`. Two racing verifications of
//! the same fresh credential both storing is benign: last write wins and
//! both values are equivalent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tradecast_protocol::UserId;

/// Configuration for cache behavior.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a verified credential stays cached.
    ///
    /// Default: 5 minutes. Much shorter than any credential lifetime,
    /// which is what keeps the unbounded map bounded in practice.
    pub ttl: Duration,

    /// How often the periodic sweep runs. Default: 2 minutes.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(2 * 60),
        }
    }
}

/// One cached verdict. `expires_at` is always `cached_at + ttl`; entries
/// are never updated in place, only replaced or removed.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    user_id: UserId,
    cached_at: Instant,
    expires_at: Instant,
}

/// Process-local, time-bounded credential → identity cache.
///
/// Not persisted anywhere: a restart empties it, which is safe because
/// verification always falls back to the authoritative upstream check.
#[derive(Debug)]
pub struct VerificationCache {
    entries: Mutex<HashMap<[u8; 32], CacheEntry>>,
    ttl: Duration,
}

impl VerificationCache {
    /// Creates an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached identity for a credential, if present and
    /// unexpired. An expired entry is deleted on the spot and reported
    /// as a miss — callers never see a stale verdict, even between
    /// sweeps.
    pub fn lookup(&self, credential: &str) -> Option<UserId> {
        let key = hash_credential(credential);
        let mut entries = self.lock();

        let entry = entries.get(&key)?;
        if Instant::now() > entry.expires_at {
            entries.remove(&key);
            return None;
        }
        Some(entry.user_id)
    }

    /// Caches a verified identity. Upserts: a concurrent store for the
    /// same credential simply wins last.
    pub fn store(&self, credential: &str, user_id: UserId) {
        let now = Instant::now();
        let entry = CacheEntry {
            user_id,
            cached_at: now,
            expires_at: now + self.ttl,
        };
        self.lock().insert(hash_credential(credential), entry);
    }

    /// Drops any cached verdict for the credential.
    pub fn invalidate(&self, credential: &str) {
        self.lock().remove(&hash_credential(credential));
    }

    /// Removes every expired entry. Returns how many were removed.
    ///
    /// Infallible: the sweeper loop depends on this never bailing out.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    /// Number of live (possibly expired-but-unswept) entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Age of the oldest entry, for diagnostics.
    pub fn oldest_age(&self) -> Option<Duration> {
        let entries = self.lock();
        entries
            .values()
            .map(|e| e.cached_at.elapsed())
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// A poisoned lock means a panic mid-upsert; the map itself is still
    /// structurally sound (single-key operations), so recover rather
    /// than let every future request and sweep die with it.
    fn lock(&self) -> MutexGuard<'_, HashMap<[u8; 32], CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-way hash used as the cache key, so the raw bearer string never
/// sits in memory longer than the request that carried it.
fn hash_credential(credential: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// CacheSweeper
// ---------------------------------------------------------------------------

/// Owned handle for the periodic sweep task.
///
/// Constructed once at process start next to the cache it sweeps;
/// aborting the handle (explicitly via [`shutdown`](Self::shutdown) or
/// by dropping it) stops the task. Sweeping only removes entries already
/// past expiry, so it is safe to run concurrently with lookups/stores.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: tokio::task::JoinHandle<()>,
}

impl CacheSweeper {
    /// Spawns the sweep loop on the current tokio runtime.
    pub fn spawn(cache: Arc<VerificationCache>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh cache
            // isn't swept before it has seen a single request.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "swept verification cache");
                }
            }
        });
        Self { handle }
    }

    /// Stops the sweep loop.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =========================================================================
// Tests
// =========================================================================
