//! Settlement authorization signing.
//!
//! The play-session contract accepts an `end_session` call only when it
//! carries the server's signature over `(seed ‖ sessionId ‖ amount)` —
//! the seed proves the authorization came from this gateway, and the
//! EIP-191 prefix applied by the signer keeps the digest out of the
//! transaction-signing domain.

use alloy_primitives::utils::parse_ether;
use alloy_primitives::{B256, U256, keccak256};

use crate::TradecastError;

/// The digest the settlement key signs: keccak256 over the packed
/// 32-byte words `seed ‖ session_id ‖ amount`, mirroring the contract's
/// own `abi.encodePacked` check.
pub fn settlement_digest(seed: B256, session_id: U256, amount: U256) -> B256 {
    let mut packed = [0u8; 96];
    packed[..32].copy_from_slice(seed.as_slice());
    packed[32..64].copy_from_slice(&session_id.to_be_bytes::<32>());
    packed[64..].copy_from_slice(&amount.to_be_bytes::<32>());
    keccak256(packed)
}

/// Converts a final balance (game units) into the wei amount the
/// contract settles. Negative balances clamp to zero — a liquidated
/// account settles nothing, it doesn't owe.
pub fn to_wei(balance: f64) -> Result<U256, TradecastError> {
    if !balance.is_finite() {
        return Err(TradecastError::BadRequest(
            "final_balance must be a finite number".into(),
        ));
    }
    let clamped = balance.max(0.0);
    parse_ether(&format!("{clamped}"))
        .map_err(|e| TradecastError::BadRequest(format!("final_balance: {e}")))
}

// =========================================================================
// Tests
// =========================================================================
