//! In-memory capability implementations for exercising the round runtime.

use crate::api::{
    AdaptorError, ChainAdaptor, ClientError, Extract, ExtractError, LedgerApi, ValueType,
};
use async_trait::async_trait;
use nebulink_types::{
    ChainType, ConsulPubKey, NebulaId, NebulaInfo, OraclesByTypeMap, OraclesMap, OraclesPubKey,
    PulseId, Transaction,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

type PulseKey = (NebulaId, PulseId, OraclesPubKey);

#[derive(Default)]
struct LedgerInner {
    height: u64,
    sent: Vec<Transaction>,
    commits: BTreeMap<PulseKey, Vec<u8>>,
    reveals: BTreeMap<PulseKey, Vec<u8>>,
    results: BTreeMap<PulseKey, Vec<u8>>,
    oracles_by_consul: BTreeMap<ConsulPubKey, OraclesByTypeMap>,
    oracles_by_nebula: BTreeMap<NebulaId, OraclesMap>,
    bft_oracles: BTreeMap<NebulaId, OraclesMap>,
    nebulae: BTreeMap<NebulaId, NebulaInfo>,
}

/// A ledger client over plain in-memory maps. Submitted transactions are
/// recorded, never applied; tests seed read-side state explicitly.
#[derive(Clone, Default)]
pub struct MockLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_height(&self, height: u64) {
        self.inner.lock().height = height;
    }

    /// Every transaction submitted so far, in order.
    pub fn sent(&self) -> Vec<Transaction> {
        self.inner.lock().sent.clone()
    }

    pub fn put_commit(&self, nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey, hash: Vec<u8>) {
        self.inner.lock().commits.insert((*nebula, pulse, *oracle), hash);
    }

    pub fn put_reveal(&self, nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey, preimage: Vec<u8>) {
        self.inner.lock().reveals.insert((*nebula, pulse, *oracle), preimage);
    }

    pub fn put_result(&self, nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey, signature: Vec<u8>) {
        self.inner.lock().results.insert((*nebula, pulse, *oracle), signature);
    }

    pub fn put_bft_oracles(&self, nebula: &NebulaId, oracles: &[OraclesPubKey]) {
        let map: OraclesMap = oracles
            .iter()
            .map(|o| (*o, ChainType::Ethereum))
            .collect();
        self.inner.lock().bft_oracles.insert(*nebula, map);
    }

    pub fn put_nebula_info(&self, nebula: &NebulaId, info: NebulaInfo) {
        self.inner.lock().nebulae.insert(*nebula, info);
    }

    pub fn put_oracles_by_consul(&self, consul: &ConsulPubKey, chain: ChainType, oracle: OraclesPubKey) {
        self.inner
            .lock()
            .oracles_by_consul
            .entry(*consul)
            .or_default()
            .insert(chain, oracle);
    }

    pub fn put_oracle_in_nebula(&self, nebula: &NebulaId, oracle: OraclesPubKey, chain: ChainType) {
        self.inner
            .lock()
            .oracles_by_nebula
            .entry(*nebula)
            .or_default()
            .insert(oracle, chain);
    }
}

fn found<T>(value: Option<T>) -> Result<T, ClientError> {
    value.ok_or(ClientError::NotFound)
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn height(&self) -> Result<u64, ClientError> {
        Ok(self.inner.lock().height)
    }

    async fn send_tx(&self, tx: &Transaction) -> Result<(), ClientError> {
        self.inner.lock().sent.push(tx.clone());
        Ok(())
    }

    async fn oracles_by_consul(&self, consul: &ConsulPubKey) -> Result<OraclesByTypeMap, ClientError> {
        found(self.inner.lock().oracles_by_consul.get(consul).cloned())
    }

    async fn oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, ClientError> {
        found(self.inner.lock().oracles_by_nebula.get(nebula).cloned())
    }

    async fn bft_oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, ClientError> {
        found(self.inner.lock().bft_oracles.get(nebula).cloned())
    }

    async fn nebula_info(&self, nebula: &NebulaId) -> Result<NebulaInfo, ClientError> {
        found(self.inner.lock().nebulae.get(nebula).copied())
    }

    async fn commit_hash(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError> {
        found(self.inner.lock().commits.get(&(*nebula, pulse, *oracle)).cloned())
    }

    async fn reveal(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError> {
        found(self.inner.lock().reveals.get(&(*nebula, pulse, *oracle)).cloned())
    }

    async fn result(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, ClientError> {
        found(self.inner.lock().results.get(&(*nebula, pulse, *oracle)).cloned())
    }
}

#[derive(Default)]
struct AdaptorInner {
    height: u64,
    last_pulse: PulseId,
    pulses: Vec<(NebulaId, PulseId, Vec<u8>)>,
    delivered: Vec<(NebulaId, PulseId, Vec<u8>)>,
    stall: bool,
}

/// A target-chain adaptor that records pulses instead of publishing them.
#[derive(Clone)]
pub struct MockAdaptor {
    pub_key: OraclesPubKey,
    inner: Arc<Mutex<AdaptorInner>>,
}

impl MockAdaptor {
    pub fn new(pub_key: OraclesPubKey) -> Self {
        Self {
            pub_key,
            inner: Arc::new(Mutex::new(AdaptorInner::default())),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.inner.lock().height = height;
    }

    pub fn set_last_pulse(&self, pulse: PulseId) {
        self.inner.lock().last_pulse = pulse;
    }

    /// Make `add_pulse` hang forever; pairs with cancellation tests.
    pub fn stall_submissions(&self) {
        self.inner.lock().stall = true;
    }

    /// Pulses published so far as `(nebula, pulse, hash)`.
    pub fn pulses(&self) -> Vec<(NebulaId, PulseId, Vec<u8>)> {
        self.inner.lock().pulses.clone()
    }

    /// Values delivered to subscribers so far.
    pub fn delivered(&self) -> Vec<(NebulaId, PulseId, Vec<u8>)> {
        self.inner.lock().delivered.clone()
    }
}

#[async_trait]
impl ChainAdaptor for MockAdaptor {
    fn pub_key(&self) -> OraclesPubKey {
        self.pub_key
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AdaptorError> {
        let mut signature = b"mock-sig:".to_vec();
        signature.extend_from_slice(message);
        Ok(signature)
    }

    async fn value_type(&self, _nebula: &NebulaId) -> Result<ValueType, AdaptorError> {
        Ok(ValueType::Bytes)
    }

    async fn last_pulse_id(&self, _nebula: &NebulaId) -> Result<PulseId, AdaptorError> {
        Ok(self.inner.lock().last_pulse)
    }

    async fn get_height(&self) -> Result<u64, AdaptorError> {
        Ok(self.inner.lock().height)
    }

    async fn add_pulse(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        _oracles: &[OraclesPubKey],
        hash: &[u8],
    ) -> Result<String, AdaptorError> {
        let stalled = self.inner.lock().stall;
        if stalled {
            std::future::pending::<()>().await;
        }
        self.inner.lock().pulses.push((*nebula, pulse, hash.to_vec()));
        Ok(format!("tx-{pulse}"))
    }

    async fn wait_tx(&self, _tx_id: &str) -> Result<(), AdaptorError> {
        Ok(())
    }

    async fn send_value_to_subs(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        value: &[u8],
    ) -> Result<(), AdaptorError> {
        self.inner.lock().delivered.push((*nebula, pulse, value.to_vec()));
        Ok(())
    }
}

/// An extractor returning a fixed value, or nothing.
#[derive(Clone, Default)]
pub struct MockExtractor {
    value: Option<Vec<u8>>,
}

impl MockExtractor {
    pub fn with_value(value: Vec<u8>) -> Self {
        Self { value: Some(value) }
    }

    pub fn empty() -> Self {
        Self { value: None }
    }
}

#[async_trait]
impl Extract for MockExtractor {
    async fn extract(&self) -> Result<Option<Vec<u8>>, ExtractError> {
        Ok(self.value.clone())
    }
}
