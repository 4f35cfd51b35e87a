//! Capability interfaces between the oracle runtime and the outside world.
//!
//! All three are narrow seams: the ledger client reads replicated state and
//! submits transactions, the chain adaptor wraps one target chain, the
//! extractor fetches the current external value. Errors from any of them
//! are transient for the runtime: logged and retried on the next tick.

use async_trait::async_trait;
use nebulink_types::{
    ConsulPubKey, NebulaId, NebulaInfo, OraclesByTypeMap, OraclesMap, OraclesPubKey, PulseId,
    Transaction,
};

/// Errors from the ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Distinguished missing-value response; the runtime branches on it.
    #[error("value not found")]
    NotFound,

    /// Anything else: connectivity, decoding, a rejected submission.
    #[error("ledger client error: {0}")]
    Transport(String),
}

/// Read and submit access to the oracle ledger.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Latest ledger block height.
    async fn height(&self) -> Result<u64, ClientError>;

    /// Submit a signed transaction to the ledger mempool.
    async fn send_tx(&self, tx: &Transaction) -> Result<(), ClientError>;

    async fn oracles_by_consul(
        &self,
        consul: &ConsulPubKey,
    ) -> Result<OraclesByTypeMap, ClientError>;

    async fn oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, ClientError>;

    /// The active oracle subset for the current round, in the ledger's
    /// deterministic enumeration order.
    async fn bft_oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, ClientError>;

    async fn nebula_info(&self, nebula: &NebulaId) -> Result<NebulaInfo, ClientError>;

    async fn commit_hash(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError>;

    async fn reveal(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError>;

    async fn result(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError>;
}

/// Errors from a target-chain adaptor.
#[derive(Debug, thiserror::Error)]
#[error("target chain error: {0}")]
pub struct AdaptorError(pub String);

/// Value kinds a nebula can publish on its target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int64,
    String,
    Bytes,
}

/// One target chain, as the oracle runtime sees it.
#[async_trait]
pub trait ChainAdaptor: Send + Sync {
    /// The oracle's identity on this chain.
    fn pub_key(&self) -> OraclesPubKey;

    /// Sign a message with the oracle's chain-specific key.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AdaptorError>;

    async fn value_type(&self, nebula: &NebulaId) -> Result<ValueType, AdaptorError>;

    /// The last pulse id the nebula contract has assigned.
    async fn last_pulse_id(&self, nebula: &NebulaId) -> Result<PulseId, AdaptorError>;

    /// Current target-chain height.
    async fn get_height(&self) -> Result<u64, AdaptorError>;

    /// Publish a pulse; returns the chain transaction id.
    async fn add_pulse(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracles: &[OraclesPubKey],
        hash: &[u8],
    ) -> Result<String, AdaptorError>;

    /// Await confirmation of a previously submitted chain transaction.
    async fn wait_tx(&self, tx_id: &str) -> Result<(), AdaptorError>;

    /// Deliver the revealed value to subscriber contracts.
    async fn send_value_to_subs(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        value: &[u8],
    ) -> Result<(), AdaptorError>;
}

/// Errors from the external data extractor.
#[derive(Debug, thiserror::Error)]
#[error("extractor error: {0}")]
pub struct ExtractError(pub String);

/// The external data source for one nebula.
#[async_trait]
pub trait Extract: Send + Sync {
    /// Fetch the current value; `None` when the source has nothing yet.
    async fn extract(&self) -> Result<Option<Vec<u8>>, ExtractError>;
}
