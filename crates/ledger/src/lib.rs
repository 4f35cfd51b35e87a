//! Replicated application state machine for the Nebulink oracle ledger.
//!
//! This crate contains everything that must behave identically on every
//! replica:
//!
//! - **Storage**: a transactional, prefix-iterable key-value layer over
//!   RocksDB with an ephemeral overlay for transaction pre-validation
//! - **State transition**: the pure function applying a decoded transaction
//!   to a storage transaction
//! - **Scheduler**: the epoch-boundary logic rotating scores, consuls and
//!   per-nebula oracle subsets
//! - **Application**: the consensus-engine lifecycle adapter
//!   (init-chain / check / deliver / begin / end / commit / query)
//! - **Query**: read-only path-dispatched lookups for external observers
//!
//! Determinism is the contract: domain errors reject a transaction with a
//! non-zero code and leave storage untouched; only storage failures abort
//! block application.

pub mod app;
mod error;
pub mod query;
pub mod scheduler;
pub mod state;
pub mod storage;

pub use app::{
    Application, AppInfo, BlockHeader, InitValidator, LedgerApp, QueryResponse, TxResponse,
    ValidatorUpdate, CODE_ERROR, CODE_NOT_FOUND, CODE_OK,
};
pub use error::{LedgerError, StorageError};
pub use query::QueryError;
pub use scheduler::{ConsulDuty, Scheduler, CALCULATE_SCORE_INTERVAL, ORACLE_COUNT};
pub use storage::{LedgerDb, StateTx};
