//! The oracle node: registration, the polling loop, and the per-sub-round
//! protocol steps.

use crate::api::{AdaptorError, ChainAdaptor, ClientError, Extract, ExtractError, LedgerApi};
use nebulink_types::{
    pulse_commit_hash, ChainType, KeyPair, NebulaId, OraclesPubKey, PulseId, SubRound,
    Transaction, TxFunc, TxValue,
};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ledger polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait after submitting a registration transaction before
/// assuming it has been included.
pub const TX_INCLUSION_WAIT: Duration = Duration::from_secs(5);

/// Errors that abort oracle startup. Tick-level errors never surface here;
/// the loop logs and retries them.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Adaptor(#[from] AdaptorError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The consul already registered a different oracle for this chain.
    #[error("a different oracle {0} is registered for {1}")]
    ConflictingOracle(OraclesPubKey, ChainType),

    /// The nebula this oracle is bound to does not exist on the ledger.
    #[error("nebula not found on the ledger")]
    NebulaNotFound,
}

/// Mutable per-round protocol state, reset on entry to each Commit phase.
#[derive(Debug, Default)]
pub struct RoundState {
    commit_hash: Option<[u8; 32]>,
    data: Option<Vec<u8>>,
    result_value: Option<Vec<u8>>,
    result_hash: Option<Vec<u8>>,
    is_sent: bool,
}

/// One oracle process, bound to a single `(nebula, chain_type)` pair.
pub struct OracleNode<C, A, E> {
    nebula_id: NebulaId,
    chain_type: ChainType,
    validator: KeyPair,
    oracle_pub_key: OraclesPubKey,
    client: C,
    adaptor: A,
    extractor: E,
    max_pulse_count_in_block: u64,
}

impl<C: LedgerApi, A: ChainAdaptor, E: Extract> OracleNode<C, A, E> {
    pub fn new(
        nebula_id: NebulaId,
        chain_type: ChainType,
        validator: KeyPair,
        client: C,
        adaptor: A,
        extractor: E,
    ) -> Self {
        let oracle_pub_key = adaptor.pub_key();
        Self {
            nebula_id,
            chain_type,
            validator,
            oracle_pub_key,
            client,
            adaptor,
            extractor,
            max_pulse_count_in_block: 0,
        }
    }

    /// One-shot startup: make sure the oracle is registered with the consul
    /// and the nebula, then load the nebula's pulse budget.
    pub async fn init(&mut self) -> Result<(), OracleError> {
        let registered = match self.client.oracles_by_consul(&self.validator.public()).await {
            Ok(map) => map.get(&self.chain_type).copied(),
            Err(ClientError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        match registered {
            Some(existing) if existing != self.oracle_pub_key => {
                return Err(OracleError::ConflictingOracle(existing, self.chain_type));
            }
            Some(_) => {}
            None => {
                let tx = Transaction::build(
                    &self.validator,
                    TxFunc::AddOracle,
                    vec![
                        TxValue::bytes(vec![self.chain_type.as_byte()]),
                        TxValue::bytes(self.oracle_pub_key.as_bytes().to_vec()),
                    ],
                );
                self.client.send_tx(&tx).await?;
                info!(id = %tx.id, "add-oracle submitted");
                tokio::time::sleep(TX_INCLUSION_WAIT).await;
            }
        }

        let in_nebula = match self.client.oracles_by_nebula(&self.nebula_id).await {
            Ok(map) => map.contains_key(&self.oracle_pub_key),
            Err(ClientError::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        if !in_nebula {
            let tx = Transaction::build(
                &self.validator,
                TxFunc::AddOracleInNebula,
                vec![
                    TxValue::bytes(self.nebula_id.as_bytes().to_vec()),
                    TxValue::bytes(self.oracle_pub_key.as_bytes().to_vec()),
                ],
            );
            self.client.send_tx(&tx).await?;
            info!(id = %tx.id, "add-oracle-in-nebula submitted");
            tokio::time::sleep(TX_INCLUSION_WAIT).await;
        }

        let info = match self.client.nebula_info(&self.nebula_id).await {
            Ok(info) => info,
            Err(ClientError::NotFound) => return Err(OracleError::NebulaNotFound),
            Err(e) => return Err(e.into()),
        };
        self.max_pulse_count_in_block = info.max_pulse_count_in_block;

        let value_type = self.adaptor.value_type(&self.nebula_id).await?;
        debug!(?value_type, nebula = %self.nebula_id, "oracle initialized");
        Ok(())
    }

    /// The main loop. Polls the ledger every 200 ms and steps the round
    /// protocol; individual tick failures are logged and retried, never
    /// fatal. Returns when cancelled.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let mut last_ledger_height = 0u64;
        let mut last_tc_height = 0u64;
        let mut pulse_count_in_block = 0u64;
        let mut prev_sub_round = None;
        let mut round_state = RoundState::default();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(nebula = %self.nebula_id, "oracle node stopping");
                    return;
                }
                _ = interval.tick() => {}
            }

            let ledger_height = match self.client.height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!(%e, "ledger height unavailable");
                    continue;
                }
            };
            if ledger_height != last_ledger_height {
                debug!(ledger_height, "ledger advanced");
                last_ledger_height = ledger_height;
            }

            let tc_height = match self.adaptor.get_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!(%e, "target chain height unavailable");
                    continue;
                }
            };
            if tc_height != last_tc_height {
                pulse_count_in_block = 0;
                last_tc_height = tc_height;
            }
            if pulse_count_in_block >= self.max_pulse_count_in_block {
                continue;
            }

            let sub_round = SubRound::from_height(ledger_height);
            if sub_round == SubRound::Commit && prev_sub_round != Some(SubRound::Commit) {
                round_state = RoundState::default();
            }
            prev_sub_round = Some(sub_round);

            let was_sent = round_state.is_sent;
            if let Err(e) = self
                .execute(sub_round, tc_height, &mut round_state, &cancel)
                .await
            {
                warn!(%e, %sub_round, "round step failed");
            }
            if !was_sent && round_state.is_sent {
                pulse_count_in_block += 1;
            }
        }
    }

    /// One protocol step for the current sub-round.
    async fn execute(
        &self,
        sub_round: SubRound,
        tc_height: u64,
        state: &mut RoundState,
        cancel: &CancellationToken,
    ) -> Result<(), OracleError> {
        let pulse_id = self.adaptor.last_pulse_id(&self.nebula_id).await?;

        match sub_round {
            SubRound::Commit => self.step_commit(pulse_id, state).await,
            SubRound::Reveal => self.step_reveal(pulse_id, state).await,
            SubRound::Result => self.step_result(pulse_id, state).await,
            SubRound::SendToTargetChain => {
                self.step_send(pulse_id, tc_height, state, cancel).await
            }
        }
    }

    async fn step_commit(&self, pulse_id: PulseId, state: &mut RoundState) -> Result<(), OracleError> {
        match self
            .client
            .commit_hash(&self.nebula_id, pulse_id, &self.oracle_pub_key)
            .await
        {
            Ok(_) => return Ok(()),
            Err(ClientError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let Some(data) = self.extractor.extract().await? else {
            return Ok(());
        };

        let hash = pulse_commit_hash(&data, &self.oracle_pub_key, pulse_id, &self.nebula_id);
        let tx = Transaction::build(
            &self.validator,
            TxFunc::Commit,
            vec![
                TxValue::bytes(self.nebula_id.as_bytes().to_vec()),
                TxValue::int(pulse_id as i64),
                TxValue::bytes(self.oracle_pub_key.as_bytes().to_vec()),
                TxValue::bytes(hash.to_vec()),
            ],
        );
        self.client.send_tx(&tx).await?;
        info!(pulse_id, id = %tx.id, "commit submitted");

        state.commit_hash = Some(hash);
        state.data = Some(data);
        Ok(())
    }

    async fn step_reveal(&self, pulse_id: PulseId, state: &mut RoundState) -> Result<(), OracleError> {
        let (Some(_), Some(data)) = (state.commit_hash, state.data.as_ref()) else {
            return Ok(());
        };

        match self
            .client
            .reveal(&self.nebula_id, pulse_id, &self.oracle_pub_key)
            .await
        {
            Ok(_) => return Ok(()),
            Err(ClientError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let tx = Transaction::build(
            &self.validator,
            TxFunc::Reveal,
            vec![
                TxValue::bytes(self.nebula_id.as_bytes().to_vec()),
                TxValue::int(pulse_id as i64),
                TxValue::bytes(self.oracle_pub_key.as_bytes().to_vec()),
                TxValue::bytes(data.clone()),
            ],
        );
        self.client.send_tx(&tx).await?;
        info!(pulse_id, id = %tx.id, "reveal submitted");
        Ok(())
    }

    async fn step_result(&self, pulse_id: PulseId, state: &mut RoundState) -> Result<(), OracleError> {
        let Some(data) = state.data.clone() else {
            return Ok(());
        };

        // The reveal must already be replicated before a signature makes
        // sense to anyone.
        match self
            .client
            .reveal(&self.nebula_id, pulse_id, &self.oracle_pub_key)
            .await
        {
            Ok(_) => {}
            Err(ClientError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        match self
            .client
            .result(&self.nebula_id, pulse_id, &self.oracle_pub_key)
            .await
        {
            Ok(_) => return Ok(()),
            Err(ClientError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let result_hash: [u8; 32] = Sha256::digest(&data).into();
        let signature = self.adaptor.sign(&result_hash)?;

        let tx = Transaction::build(
            &self.validator,
            TxFunc::SignResult,
            vec![
                TxValue::bytes(self.nebula_id.as_bytes().to_vec()),
                TxValue::int(pulse_id as i64),
                TxValue::bytes(self.oracle_pub_key.as_bytes().to_vec()),
                TxValue::bytes(signature),
            ],
        );
        self.client.send_tx(&tx).await?;
        info!(pulse_id, id = %tx.id, "result signature submitted");

        state.result_value = Some(data);
        state.result_hash = Some(result_hash.to_vec());
        Ok(())
    }

    async fn step_send(
        &self,
        pulse_id: PulseId,
        tc_height: u64,
        state: &mut RoundState,
        cancel: &CancellationToken,
    ) -> Result<(), OracleError> {
        if state.is_sent {
            return Ok(());
        }

        let oracles_map = self.client.bft_oracles_by_nebula(&self.nebula_id).await?;
        let oracles: Vec<OraclesPubKey> = oracles_map.keys().copied().collect();
        let Some(my_index) = oracles.iter().position(|o| *o == self.oracle_pub_key) else {
            return Ok(());
        };

        // One oracle per target-chain block pushes the pulse; the others
        // only provide signatures.
        if tc_height % oracles.len() as u64 != my_index as u64 {
            return Ok(());
        }

        let (Some(value), Some(hash)) = (state.result_value.clone(), state.result_hash.clone())
        else {
            return Ok(());
        };

        // A cancelled submission must not be recorded as sent.
        let tx_id = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = self.adaptor.add_pulse(&self.nebula_id, pulse_id, &oracles, &hash) => result?,
        };
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = self.adaptor.wait_tx(&tx_id) => result?,
        }

        state.is_sent = true;
        info!(pulse_id, %tx_id, "pulse submitted to target chain");

        self.adaptor
            .send_value_to_subs(&self.nebula_id, pulse_id, &value)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockAdaptor, MockExtractor, MockLedger};
    use nebulink_types::NebulaInfo;

    fn nebula() -> NebulaId {
        NebulaId([7u8; 32])
    }

    fn oracle(byte: u8) -> OraclesPubKey {
        OraclesPubKey([byte; 33])
    }

    fn node(
        ledger: MockLedger,
        adaptor: MockAdaptor,
        extractor: MockExtractor,
    ) -> OracleNode<MockLedger, MockAdaptor, MockExtractor> {
        let mut node = OracleNode::new(
            nebula(),
            ChainType::Ethereum,
            KeyPair::from_seed([1u8; 32]),
            ledger,
            adaptor,
            extractor,
        );
        node.max_pulse_count_in_block = 10;
        node
    }

    #[tokio::test]
    async fn test_commit_step_submits_and_remembers() {
        let ledger = MockLedger::new();
        let adaptor = MockAdaptor::new(oracle(2));
        let extractor = MockExtractor::with_value(b"price:9000".to_vec());
        let node = node(ledger.clone(), adaptor, extractor);

        let mut state = RoundState::default();
        node.execute(SubRound::Commit, 0, &mut state, &CancellationToken::new())
            .await
            .unwrap();

        let sent = ledger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].func, TxFunc::Commit);
        assert!(state.commit_hash.is_some());
        assert_eq!(state.data.as_deref(), Some(&b"price:9000"[..]));
    }

    #[tokio::test]
    async fn test_commit_step_skips_when_ledger_already_has_it() {
        let ledger = MockLedger::new();
        ledger.put_commit(&nebula(), 0, &oracle(2), vec![0xAB]);
        let adaptor = MockAdaptor::new(oracle(2));
        let extractor = MockExtractor::with_value(b"x".to_vec());
        let node = node(ledger.clone(), adaptor, extractor);

        let mut state = RoundState::default();
        node.execute(SubRound::Commit, 0, &mut state, &CancellationToken::new())
            .await
            .unwrap();

        assert!(ledger.sent().is_empty());
        assert!(state.commit_hash.is_none());
    }

    #[tokio::test]
    async fn test_commit_step_skips_without_data() {
        let ledger = MockLedger::new();
        let adaptor = MockAdaptor::new(oracle(2));
        let extractor = MockExtractor::empty();
        let node = node(ledger.clone(), adaptor, extractor);

        let mut state = RoundState::default();
        node.execute(SubRound::Commit, 0, &mut state, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reveal_step_requires_local_commit() {
        let ledger = MockLedger::new();
        let adaptor = MockAdaptor::new(oracle(2));
        let node = node(ledger.clone(), adaptor, MockExtractor::empty());

        let mut state = RoundState::default();
        node.execute(SubRound::Reveal, 0, &mut state, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_result_step_signs_revealed_value() {
        let ledger = MockLedger::new();
        ledger.put_reveal(&nebula(), 0, &oracle(2), b"value".to_vec());
        let adaptor = MockAdaptor::new(oracle(2));
        let node = node(ledger.clone(), adaptor, MockExtractor::empty());

        let mut state = RoundState {
            commit_hash: Some([0u8; 32]),
            data: Some(b"value".to_vec()),
            ..Default::default()
        };
        node.execute(SubRound::Result, 0, &mut state, &CancellationToken::new())
            .await
            .unwrap();

        let sent = ledger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].func, TxFunc::SignResult);
        assert_eq!(
            state.result_hash.as_deref(),
            Some(&Sha256::digest(b"value")[..])
        );
    }

    #[tokio::test]
    async fn test_send_step_leader_rotation() {
        // S6: subset {O1,O2,O3}, target height 10, our index 1 -> we submit.
        let ledger = MockLedger::new();
        ledger.put_bft_oracles(&nebula(), &[oracle(1), oracle(2), oracle(3)]);
        let adaptor = MockAdaptor::new(oracle(2));
        adaptor.set_height(10);
        let node = node(ledger.clone(), adaptor, MockExtractor::empty());

        let mut state = RoundState {
            result_value: Some(b"value".to_vec()),
            result_hash: Some(vec![9u8; 32]),
            ..Default::default()
        };
        node.execute(
            SubRound::SendToTargetChain,
            10,
            &mut state,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(state.is_sent);
        assert_eq!(node.adaptor.pulses().len(), 1);
    }

    #[tokio::test]
    async fn test_send_step_defers_to_the_leader() {
        // Same subset, target height 11 -> index 2's turn, we stay quiet.
        let ledger = MockLedger::new();
        ledger.put_bft_oracles(&nebula(), &[oracle(1), oracle(2), oracle(3)]);
        let adaptor = MockAdaptor::new(oracle(2));
        let node = node(ledger.clone(), adaptor, MockExtractor::empty());

        let mut state = RoundState {
            result_value: Some(b"value".to_vec()),
            result_hash: Some(vec![9u8; 32]),
            ..Default::default()
        };
        node.execute(
            SubRound::SendToTargetChain,
            11,
            &mut state,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!state.is_sent);
        assert!(node.adaptor.pulses().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_submission_is_not_marked_sent() {
        let ledger = MockLedger::new();
        ledger.put_bft_oracles(&nebula(), &[oracle(2)]);
        let adaptor = MockAdaptor::new(oracle(2));
        adaptor.stall_submissions();
        let node = node(ledger.clone(), adaptor, MockExtractor::empty());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut state = RoundState {
            result_value: Some(b"value".to_vec()),
            result_hash: Some(vec![9u8; 32]),
            ..Default::default()
        };
        node.execute(SubRound::SendToTargetChain, 0, &mut state, &cancel)
            .await
            .unwrap();

        assert!(!state.is_sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_registers_missing_oracle() {
        let ledger = MockLedger::new();
        ledger.put_nebula_info(
            &nebula(),
            NebulaInfo {
                chain_type: ChainType::Ethereum,
                owner: KeyPair::from_seed([1u8; 32]).public(),
                max_pulse_count_in_block: 4,
                min_score: 0,
            },
        );
        let adaptor = MockAdaptor::new(oracle(2));
        let mut node = node(ledger.clone(), adaptor, MockExtractor::empty());

        node.init().await.unwrap();

        let sent = ledger.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].func, TxFunc::AddOracle);
        assert_eq!(sent[1].func, TxFunc::AddOracleInNebula);
        assert_eq!(node.max_pulse_count_in_block, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_rejects_conflicting_registration() {
        let ledger = MockLedger::new();
        let validator = KeyPair::from_seed([1u8; 32]);
        ledger.put_oracles_by_consul(&validator.public(), ChainType::Ethereum, oracle(9));
        let adaptor = MockAdaptor::new(oracle(2));
        let mut node = node(ledger.clone(), adaptor, MockExtractor::empty());

        assert!(matches!(
            node.init().await,
            Err(OracleError::ConflictingOracle(existing, ChainType::Ethereum)) if existing == oracle(9)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_commits_then_stops_on_cancel() {
        let ledger = MockLedger::new();
        ledger.set_height(4); // height 4 -> Commit sub-round
        let adaptor = MockAdaptor::new(oracle(2));
        adaptor.set_height(100);
        let extractor = MockExtractor::with_value(b"tick".to_vec());
        let mut node = node(ledger.clone(), adaptor, extractor);

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            node.run(cancel).await;
        });

        // Let a few ticks elapse in virtual time.
        tokio::time::sleep(Duration::from_secs(2)).await;
        stop.cancel();
        handle.await.unwrap();

        // The mock ledger never records the commit, so the loop resubmits
        // each tick; every submission must be a Commit.
        let sent = ledger.sent();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|tx| tx.func == TxFunc::Commit));
    }
}
