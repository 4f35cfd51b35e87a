//! Per-oracle round runtime.
//!
//! An oracle is bound to one `(nebula, chain type)` pair and follows the
//! ledger's sub-round phases to produce, commit, reveal, sign and submit
//! data pulses. It touches the outside world only through three capability
//! interfaces: the ledger client, the target-chain adaptor and the data
//! extractor. Concrete chain adaptors plug in through a factory keyed on
//! `ChainType`; this crate ships the interfaces and the runtime.

mod api;
mod node;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::{AdaptorError, ChainAdaptor, ClientError, Extract, ExtractError, LedgerApi, ValueType};
pub use node::{OracleError, OracleNode, RoundState, POLL_INTERVAL, TX_INCLUSION_WAIT};
