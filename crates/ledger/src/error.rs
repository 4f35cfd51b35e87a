//! Error taxonomy for the ledger application.

use nebulink_types::TxError;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Distinguished missing-value error. State-transition callers treat
    /// this as a sentinel, not a failure.
    #[error("value not found")]
    NotFound,

    /// Underlying database failure. Fatal for block application.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value failed to decode. Indicates schema corruption.
    #[error("corrupt stored value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Commit was attempted on an ephemeral (discardable) transaction.
    #[error("ephemeral transaction cannot be committed")]
    EphemeralCommit,
}

/// Domain errors from the state transition and scheduler.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Transaction could not be decoded or is structurally invalid.
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// Transaction signature did not verify.
    #[error("bad transaction signature")]
    BadSignature,

    /// An invariant, ownership or uniqueness precondition failed.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// An optional read found nothing where a value was required.
    #[error("value not found")]
    NotFound,

    /// A reveal did not match its commit.
    #[error("domain mismatch: {0}")]
    DomainMismatch(String),

    /// Storage failure. Must abort block application.
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => LedgerError::NotFound,
            other => LedgerError::Storage(other),
        }
    }
}

impl From<TxError> for LedgerError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Malformed(msg) => LedgerError::Malformed(msg),
            TxError::BadSignature => LedgerError::BadSignature,
        }
    }
}

impl LedgerError {
    /// Whether this error must abort block application instead of merely
    /// rejecting the offending transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}
