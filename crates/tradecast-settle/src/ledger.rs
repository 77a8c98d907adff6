//! The ledger surface this system consumes.
//!
//! Tradecast doesn't talk to a chain directly — a wallet/RPC adapter
//! implements [`Ledger`] (wagmi/viem in the original front end, a JSON
//! RPC client in a native shell), and tests substitute fakes. The trait
//! is exactly the contract surface the bridge needs, nothing more.

use alloy_primitives::{Bytes, U256};

use crate::{LedgerError, PlaySession, PlaySessionId, TxRef};

/// Reads and writes the play-session contract through a signing wallet.
pub trait Ledger: Send + Sync + 'static {
    /// The chain the wallet is currently on.
    fn chain_id(&self) -> impl std::future::Future<Output = Result<u64, LedgerError>> + Send;

    /// Asks the wallet to switch networks. May prompt the user.
    fn switch_chain(
        &self,
        chain_id: u64,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// The contract's global pause flag.
    fn paused(&self) -> impl std::future::Future<Output = Result<bool, LedgerError>> + Send;

    /// The session record, or `None` when the id is unknown.
    fn play_session(
        &self,
        id: PlaySessionId,
    ) -> impl std::future::Future<Output = Result<Option<PlaySession>, LedgerError>> + Send;

    /// The contract-specified minimum entry fee, if it exposes one.
    fn min_entry_fee(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<U256>, LedgerError>> + Send;

    /// Payable write binding a session id to the caller's address.
    fn begin_session(
        &self,
        id: PlaySessionId,
        value: U256,
    ) -> impl std::future::Future<Output = Result<TxRef, LedgerError>> + Send;

    /// Write ending a session with the backend's settlement
    /// authorization.
    fn end_session(
        &self,
        id: PlaySessionId,
        amount: U256,
        signature: Bytes,
    ) -> impl std::future::Future<Output = Result<TxRef, LedgerError>> + Send;
}
