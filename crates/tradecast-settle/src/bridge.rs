//! The settlement bridge itself.

use std::collections::HashSet;

use alloy_primitives::{Address, U256};
use tokio::sync::Mutex;

use crate::{Ledger, PlaySessionId, SettleError, SettlementBackend, TxRef};

/// Configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The chain the contract lives on. Default: Celo mainnet (42220).
    pub required_chain: u64,

    /// Entry fee paid when the contract does not specify a minimum.
    /// Default: 0.08 CELO.
    pub default_entry_fee: U256,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            required_chain: 42220,
            default_entry_fee: U256::from(80_000_000_000_000_000u128),
        }
    }
}

/// Wraps the ledger and the settlement backend with the session rules.
///
/// One bridge per browser view; nothing is shared between sessions. The
/// attempted-set is an explicit field rather than a module global so the
/// at-most-once guard is testable and dies with the view that owns it.
#[derive(Debug)]
pub struct SettlementBridge<L, B> {
    ledger: L,
    backend: B,
    caller: Address,
    config: BridgeConfig,
    attempted: Mutex<HashSet<PlaySessionId>>,
}

impl<L: Ledger, B: SettlementBackend> SettlementBridge<L, B> {
    /// Creates a bridge acting on behalf of `caller`.
    pub fn new(ledger: L, backend: B, caller: Address, config: BridgeConfig) -> Self {
        Self {
            ledger,
            backend,
            caller,
            config,
            attempted: Mutex::new(HashSet::new()),
        }
    }

    /// Starts a play session: mints an id from the backend and binds it
    /// to the caller on the ledger, paying the entry fee.
    ///
    /// If the wallet is on the wrong network, exactly one silent
    /// [`switch_chain`](Ledger::switch_chain) is attempted; if the
    /// network is still wrong the call fails with
    /// [`SettleError::ChainMismatch`] and the user must switch before
    /// retrying.
    pub async fn begin_play_session(&self) -> Result<PlaySessionId, SettleError> {
        let expected = self.config.required_chain;
        let actual = self.ledger.chain_id().await.map_err(SettleError::from_read)?;
        if actual != expected {
            tracing::info!(actual, expected, "switching networks");
            if self.ledger.switch_chain(expected).await.is_err() {
                return Err(SettleError::ChainMismatch { expected, actual });
            }
            let now = self.ledger.chain_id().await.map_err(SettleError::from_read)?;
            if now != expected {
                return Err(SettleError::ChainMismatch {
                    expected,
                    actual: now,
                });
            }
        }

        let id = self.backend.mint_session_id().await?;
        let fee = self
            .ledger
            .min_entry_fee()
            .await
            .map_err(SettleError::from_read)?
            .unwrap_or(self.config.default_entry_fee);

        let tx = self
            .ledger
            .begin_session(id, fee)
            .await
            .map_err(SettleError::from_write)?;
        tracing::info!(%id, %tx, %fee, "play session started");
        Ok(id)
    }

    /// Ends a play session with the backend-authorized final balance.
    ///
    /// Pre-flight reads run in order — pause flag, then session
    /// existence/ownership, then the ended flag — and nothing is
    /// submitted unless all pass. The attempted-set is reserved before
    /// any write and never released: a second call for the same session
    /// fails with [`SettleError::AlreadyAttempted`] no matter why the
    /// first one ended, so two racing callers (exit button vs. the
    /// disconnect handler) produce at most one ledger write.
    pub async fn end_play_session(
        &self,
        id: PlaySessionId,
        final_balance: f64,
    ) -> Result<TxRef, SettleError> {
        if self.ledger.paused().await.map_err(SettleError::from_read)? {
            return Err(SettleError::ServicePaused);
        }

        let session = self
            .ledger
            .play_session(id)
            .await
            .map_err(SettleError::from_read)?
            .ok_or(SettleError::OwnershipMismatch)?;
        if session.owner != self.caller {
            return Err(SettleError::OwnershipMismatch);
        }
        if session.ended {
            return Err(SettleError::AlreadyEnded);
        }

        {
            let mut attempted = self.attempted.lock().await;
            if !attempted.insert(id) {
                return Err(SettleError::AlreadyAttempted);
            }
        }

        let authorization = self.backend.authorize(id, final_balance).await?;
        let tx = self
            .ledger
            .end_session(id, authorization.amount, authorization.signature)
            .await
            .map_err(SettleError::from_write)?;
        tracing::info!(%id, %tx, "play session settled");
        Ok(tx)
    }

    /// Whether a settlement for this session was already attempted.
    pub async fn has_attempted(&self, id: PlaySessionId) -> bool {
        self.attempted.lock().await.contains(&id)
    }
}
