//! Epoch-boundary scheduling: score recalculation, consul rotation and
//! per-nebula oracle subset rotation.
//!
//! Runs synchronously inside `begin_block`, entirely within the block's
//! storage transaction, so every replica derives the same state. The only
//! side effect that escapes the transaction is the fire-and-forget consul
//! duty task, which shares no memory with the application.

use crate::error::{LedgerError, StorageError};
use crate::storage::StateTx;
use nebulink_types::{Consul, ConsulPubKey, NebulaId, NebulaInfo, OraclesMap, OraclesPubKey, Vote};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Blocks between score/consul/oracle rotations.
pub const CALCULATE_SCORE_INTERVAL: u64 = 200;

/// Size of the per-nebula active oracle subset.
pub const ORACLE_COUNT: usize = 5;

/// Off-ledger work a consul performs each block while synced: aggregating
/// oracle signatures and servicing target chains. Spawned fire-and-forget;
/// implementations live with the chain adaptors.
pub trait ConsulDuty: Send + Sync + 'static {
    fn spawn(&self, height: u64, cancel: CancellationToken) -> JoinHandle<()>;
}

/// The per-block deterministic control loop.
pub struct Scheduler {
    pub_key: ConsulPubKey,
    duty: Option<Arc<dyn ConsulDuty>>,
    cancel: CancellationToken,
    duty_task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// `cancel` is the application-lifetime token; every spawned duty task
    /// gets a child of it.
    pub fn new(
        pub_key: ConsulPubKey,
        duty: Option<Arc<dyn ConsulDuty>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pub_key,
            duty,
            cancel,
            duty_task: None,
        }
    }

    /// Run the block-boundary work for `height`.
    pub fn handle_block(
        &mut self,
        height: u64,
        store: &mut StateTx,
        is_sync: bool,
    ) -> Result<(), LedgerError> {
        if !is_sync && self.is_consul(store)? {
            if let Some(duty) = &self.duty {
                let handle = duty.spawn(height, self.cancel.child_token());
                self.duty_task = Some(handle);
            }
        }

        let round_id = height / CALCULATE_SCORE_INTERVAL;

        if height % CALCULATE_SCORE_INTERVAL == 0 || height == 1 {
            debug!(height, round_id, "score calculation boundary");
            self.calculate_scores(store)?;
            self.update_consuls_and_candidate(store, round_id)?;

            for (nebula_id, info) in store.nebulae()? {
                self.update_oracles(round_id, &nebula_id, &info, store)?;
            }
        }

        Ok(())
    }

    fn is_consul(&self, store: &StateTx) -> Result<bool, LedgerError> {
        match store.consuls() {
            Ok(consuls) => Ok(consuls.iter().any(|c| c.pub_key == self.pub_key)),
            Err(StorageError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn calculate_scores(&self, store: &mut StateTx) -> Result<(), LedgerError> {
        let votes = store.votes()?;
        let scores = store.scores()?;
        for (consul, score) in calculate_scores(&scores, &votes) {
            store.set_score(&consul, score);
        }
        Ok(())
    }

    fn update_consuls_and_candidate(
        &self,
        store: &mut StateTx,
        round_id: u64,
    ) -> Result<(), LedgerError> {
        // There is no previous round to have been approved at the first
        // boundary.
        let Some(prev_round) = round_id.checked_sub(1) else {
            return Ok(());
        };

        let last_round = match store.last_round_approved() {
            Ok(round) => round,
            Err(StorageError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };
        if last_round != prev_round {
            return Ok(());
        }

        // An empty candidate means the previous boundary never ran; leave
        // everything untouched.
        let candidate = match store.consuls_candidate() {
            Ok(candidate) => candidate,
            Err(StorageError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if candidate.is_empty() {
            return Ok(());
        }

        store.set_consuls(&candidate);

        let consuls_count = store.consuls_count()? as usize;
        let scores = store.scores()?;

        let mut sorted: Vec<Consul> = scores
            .into_iter()
            .map(|(pub_key, value)| Consul { pub_key, value })
            .collect();
        sorted.sort_by(|a, b| {
            b.value
                .cmp(&a.value)
                .then_with(|| b.pub_key.as_bytes().cmp(a.pub_key.as_bytes()))
        });
        sorted.truncate(consuls_count);

        store.set_consuls_candidate(&sorted);
        Ok(())
    }

    fn update_oracles(
        &self,
        round_id: u64,
        nebula_id: &NebulaId,
        info: &NebulaInfo,
        store: &mut StateTx,
    ) -> Result<(), LedgerError> {
        let oracles_map = match store.oracles_by_nebula(nebula_id) {
            Ok(map) => map,
            Err(StorageError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let oracles: Vec<OraclesPubKey> = oracles_map.keys().copied().collect();
        let mut selected = OraclesMap::new();
        for oracle in rotate_subset(&oracles, round_id) {
            selected.insert(oracle, info.chain_type);
        }

        store.set_bft_oracles_by_nebula(nebula_id, &selected);
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.duty_task.take() {
            task.abort();
        }
    }
}

/// Recompute scores from the vote table.
///
/// A vote `(voter, target, s)` contributes `min(score[voter], s)` to the
/// target; voters with no existing score contribute nothing, so fresh
/// identities cannot mint score for each other. Targets with no positive
/// contribution keep their previous score.
pub fn calculate_scores(
    scores: &BTreeMap<ConsulPubKey, u64>,
    votes: &BTreeMap<ConsulPubKey, Vec<Vote>>,
) -> BTreeMap<ConsulPubKey, u64> {
    let mut totals: BTreeMap<ConsulPubKey, u64> = BTreeMap::new();
    for (voter, vote_set) in votes {
        let Some(&voter_score) = scores.get(voter) else {
            continue;
        };
        for vote in vote_set {
            let contribution = voter_score.min(vote.score);
            if contribution == 0 {
                continue;
            }
            let total = totals.entry(vote.pub_key).or_insert(0);
            *total = total.saturating_add(contribution);
        }
    }

    let mut out = scores.clone();
    out.extend(totals);
    out
}

/// Select the active oracle window for a round.
///
/// The shift is `round_id mod (len - 1)` with a wrapping window. The
/// modulus must stay `len - 1`: changing it to `len` would reshuffle the
/// rotation schedule of every running replica.
pub fn rotate_subset(oracles: &[OraclesPubKey], round_id: u64) -> Vec<OraclesPubKey> {
    if oracles.len() <= ORACLE_COUNT {
        return oracles.to_vec();
    }

    let start = (round_id % (oracles.len() as u64 - 1)) as usize;
    if start + ORACLE_COUNT > oracles.len() {
        let mut window = oracles[start..].to_vec();
        let wrap = ORACLE_COUNT - window.len();
        window.extend_from_slice(&oracles[..wrap]);
        window
    } else {
        oracles[start..start + ORACLE_COUNT].to_vec()
    }
}
