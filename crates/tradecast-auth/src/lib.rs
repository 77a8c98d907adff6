//! Credential verification for Tradecast.
//!
//! Every protected request carries an opaque bearer credential issued by
//! an external identity service. This crate handles the two halves of
//! turning that credential into a [`UserId`](tradecast_protocol::UserId):
//!
//! 1. **Verification** — asking the identity service whether the
//!    credential is genuine ([`IdentityVerifier`] trait).
//! 2. **Caching** — remembering recent verdicts so the expensive
//!    upstream check runs at most once per credential per TTL window
//!    ([`VerificationCache`], [`CachedVerifier`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway routes (above)   ← extract the bearer header, pick cached vs fresh
//!     ↕
//! Auth layer (this crate)  ← cache lookup, upstream verification
//!     ↕
//! Identity service (external) ← the actual signature/expiry check
//! ```
//!
//! The cache is an explicit, injectable value — not a module-level
//! global — so the gateway constructs it at startup, hands it to a
//! [`CacheSweeper`], and tests substitute their own instance.

mod cache;
mod error;
mod verifier;

pub use cache::{CacheConfig, CacheSweeper, VerificationCache};
pub use error::AuthError;
pub use verifier::{CachedVerifier, IdentityVerifier, bearer_credential};
