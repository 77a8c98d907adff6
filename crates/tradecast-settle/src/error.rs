//! Error types for settlement.

/// How a ledger call failed, as reported by the wallet/RPC adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The signing party declined the transaction.
    #[error("transaction rejected by the signer")]
    Rejected,

    /// The call reverted for balance reasons.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Any other on-chain rejection.
    #[error("contract reverted: {0}")]
    Reverted(String),

    /// The RPC endpoint itself failed.
    #[error("rpc fault: {0}")]
    Rpc(String),
}

/// Errors surfaced by the settlement bridge.
///
/// Every variant maps to a specific user-facing condition, and none of
/// them may prevent the user from navigating away from a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettleError {
    /// The signing party declined. The session is still marked as
    /// attempted — no automatic retry — but the user may leave.
    #[error("wallet rejected the transaction")]
    WalletRejected,

    /// The transaction reverted for balance reasons.
    #[error("insufficient funds for the transaction")]
    InsufficientFunds,

    /// The active network is not the required one and the single
    /// silent switch attempt did not fix it. The user must switch
    /// before retrying.
    #[error("wrong network: expected chain {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Any other on-chain rejection.
    #[error("contract reverted: {0}")]
    ContractReverted(String),

    /// The contract's global pause flag is set; nothing was submitted.
    #[error("settlement is paused")]
    ServicePaused,

    /// The session does not exist on the ledger, or its recorded owner
    /// is not the caller.
    #[error("play session missing or not owned by caller")]
    OwnershipMismatch,

    /// The session is already marked ended on the ledger.
    #[error("play session already ended")]
    AlreadyEnded,

    /// A settlement for this session was already attempted in this
    /// process; the at-most-once guard refused a second one.
    #[error("settlement already attempted for this session")]
    AlreadyAttempted,

    /// The settlement backend (session minting, authorization signing)
    /// failed.
    #[error("settlement backend fault: {0}")]
    Backend(String),

    /// A ledger read failed before anything was submitted.
    #[error("ledger read failed: {0}")]
    Ledger(String),
}

impl SettleError {
    /// Maps a failed state-changing ledger call onto the user-facing
    /// taxonomy.
    pub(crate) fn from_write(error: LedgerError) -> Self {
        match error {
            LedgerError::Rejected => SettleError::WalletRejected,
            LedgerError::InsufficientFunds => SettleError::InsufficientFunds,
            LedgerError::Reverted(reason) => SettleError::ContractReverted(reason),
            LedgerError::Rpc(reason) => SettleError::Ledger(reason),
        }
    }

    /// Maps a failed pre-flight read. Reads never reach the wallet, so
    /// everything is a ledger fault.
    pub(crate) fn from_read(error: LedgerError) -> Self {
        SettleError::Ledger(error.to_string())
    }
}
