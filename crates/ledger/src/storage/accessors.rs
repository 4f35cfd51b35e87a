//! Typed accessors for every ledger entity.
//!
//! Structured values (lists, maps, descriptors) are stored as canonical
//! JSON; commits, reveals and result signatures are raw bytes.

use super::keys;
use crate::error::StorageError;
use crate::storage::StateTx;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nebulink_types::{
    Consul, ConsulPubKey, NebulaId, NebulaInfo, OraclesByTypeMap, OraclesMap, OraclesPubKey,
    PulseId, Vote,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

impl StateTx {
    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<T, StorageError> {
        let raw = self.get(key)?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })
    }

    fn set_json<T: Serialize>(&mut self, key: Vec<u8>, value: &T) {
        let raw = serde_json::to_vec(value).expect("ledger value serialization cannot fail");
        self.set(key, raw);
    }

    // ── Scores & votes ──────────────────────────────────────────────────

    pub fn score(&self, consul: &ConsulPubKey) -> Result<u64, StorageError> {
        self.get_json(&keys::score_key(consul))
    }

    pub fn set_score(&mut self, consul: &ConsulPubKey, score: u64) {
        self.set_json(keys::score_key(consul), &score);
    }

    /// All scores, keyed by consul, ascending key order.
    pub fn scores(&self) -> Result<BTreeMap<ConsulPubKey, u64>, StorageError> {
        let prefix = keys::score_prefix();
        let mut out = BTreeMap::new();
        for (key, value) in self.iter_prefix(&prefix) {
            let consul = parse_id_suffix::<ConsulPubKey>(&key, &prefix)?;
            let score: u64 = serde_json::from_slice(&value).map_err(|e| corrupt(&key, e))?;
            out.insert(consul, score);
        }
        Ok(out)
    }

    pub fn set_votes(&mut self, voter: &ConsulPubKey, votes: &[Vote]) {
        self.set_json(keys::vote_key(voter), &votes);
    }

    /// All vote sets, keyed by voter, ascending key order.
    pub fn votes(&self) -> Result<BTreeMap<ConsulPubKey, Vec<Vote>>, StorageError> {
        let prefix = keys::vote_prefix();
        let mut out = BTreeMap::new();
        for (key, value) in self.iter_prefix(&prefix) {
            let voter = parse_id_suffix::<ConsulPubKey>(&key, &prefix)?;
            let votes: Vec<Vote> = serde_json::from_slice(&value).map_err(|e| corrupt(&key, e))?;
            out.insert(voter, votes);
        }
        Ok(out)
    }

    // ── Consuls ─────────────────────────────────────────────────────────

    pub fn consuls(&self) -> Result<Vec<Consul>, StorageError> {
        self.get_json(&keys::consuls_key())
    }

    pub fn set_consuls(&mut self, consuls: &[Consul]) {
        self.set_json(keys::consuls_key(), &consuls);
    }

    pub fn consuls_candidate(&self) -> Result<Vec<Consul>, StorageError> {
        self.get_json(&keys::consuls_candidate_key())
    }

    pub fn set_consuls_candidate(&mut self, consuls: &[Consul]) {
        self.set_json(keys::consuls_candidate_key(), &consuls);
    }

    pub fn consuls_count(&self) -> Result<u64, StorageError> {
        self.get_json(&keys::consuls_count_key())
    }

    pub fn set_consuls_count(&mut self, count: u64) {
        self.set_json(keys::consuls_count_key(), &count);
    }

    pub fn bft_oracle_in_nebula_count(&self) -> Result<u64, StorageError> {
        self.get_json(&keys::bft_oracle_count_key())
    }

    pub fn set_bft_oracle_in_nebula_count(&mut self, count: u64) {
        self.set_json(keys::bft_oracle_count_key(), &count);
    }

    // ── Nebulae & oracles ───────────────────────────────────────────────

    pub fn nebula_info(&self, nebula: &NebulaId) -> Result<NebulaInfo, StorageError> {
        self.get_json(&keys::nebula_info_key(nebula))
    }

    pub fn set_nebula_info(&mut self, nebula: &NebulaId, info: &NebulaInfo) {
        self.set_json(keys::nebula_info_key(nebula), info);
    }

    /// Every registered nebula, ascending id order.
    pub fn nebulae(&self) -> Result<BTreeMap<NebulaId, NebulaInfo>, StorageError> {
        let prefix = keys::nebula_info_prefix();
        let mut out = BTreeMap::new();
        for (key, value) in self.iter_prefix(&prefix) {
            let nebula = parse_id_suffix::<NebulaId>(&key, &prefix)?;
            let info: NebulaInfo = serde_json::from_slice(&value).map_err(|e| corrupt(&key, e))?;
            out.insert(nebula, info);
        }
        Ok(out)
    }

    pub fn oracles_by_consul(&self, consul: &ConsulPubKey) -> Result<OraclesByTypeMap, StorageError> {
        self.get_json(&keys::oracles_by_consul_key(consul))
    }

    pub fn set_oracles_by_consul(&mut self, consul: &ConsulPubKey, oracles: &OraclesByTypeMap) {
        self.set_json(keys::oracles_by_consul_key(consul), oracles);
    }

    pub fn oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, StorageError> {
        self.get_json(&keys::oracles_by_nebula_key(nebula))
    }

    pub fn set_oracles_by_nebula(&mut self, nebula: &NebulaId, oracles: &OraclesMap) {
        self.set_json(keys::oracles_by_nebula_key(nebula), oracles);
    }

    pub fn bft_oracles_by_nebula(&self, nebula: &NebulaId) -> Result<OraclesMap, StorageError> {
        self.get_json(&keys::bft_oracles_by_nebula_key(nebula))
    }

    pub fn set_bft_oracles_by_nebula(&mut self, nebula: &NebulaId, oracles: &OraclesMap) {
        self.set_json(keys::bft_oracles_by_nebula_key(nebula), oracles);
    }

    // ── Round artifacts ─────────────────────────────────────────────────

    pub fn commit_hash(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, StorageError> {
        self.get(&keys::commit_key(nebula, pulse, oracle))
    }

    pub fn set_commit_hash(
        &mut self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
        hash: &[u8],
    ) {
        self.set(keys::commit_key(nebula, pulse, oracle), hash.to_vec());
    }

    pub fn reveal(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, StorageError> {
        self.get(&keys::reveal_key(nebula, pulse, oracle))
    }

    pub fn set_reveal(
        &mut self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
        preimage: &[u8],
    ) {
        self.set(keys::reveal_key(nebula, pulse, oracle), preimage.to_vec());
    }

    pub fn result(
        &self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
    ) -> Result<Vec<u8>, StorageError> {
        self.get(&keys::result_key(nebula, pulse, oracle))
    }

    pub fn set_result(
        &mut self,
        nebula: &NebulaId,
        pulse: PulseId,
        oracle: &OraclesPubKey,
        signature: &[u8],
    ) {
        self.set(keys::result_key(nebula, pulse, oracle), signature.to_vec());
    }

    /// Every result signature for `(nebula, pulse)`, base64-encoded, in
    /// ascending oracle-key order.
    pub fn results(&self, nebula: &NebulaId, pulse: PulseId) -> Result<Vec<String>, StorageError> {
        let prefix = keys::results_prefix(nebula, pulse);
        Ok(self
            .iter_prefix(&prefix)
            .map(|(_, value)| BASE64.encode(value))
            .collect())
    }

    // ── Counters ────────────────────────────────────────────────────────

    pub fn last_height(&self) -> Result<u64, StorageError> {
        self.get_json(&keys::last_height_key())
    }

    pub fn set_last_height(&mut self, height: u64) {
        self.set_json(keys::last_height_key(), &height);
    }

    pub fn last_round_approved(&self) -> Result<u64, StorageError> {
        self.get_json(&keys::last_round_approved_key())
    }

    pub fn set_last_round_approved(&mut self, round: u64) {
        self.set_json(keys::last_round_approved_key(), &round);
    }
}

fn corrupt(key: &[u8], e: serde_json::Error) -> StorageError {
    StorageError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    }
}

fn parse_id_suffix<T: std::str::FromStr>(key: &[u8], prefix: &[u8]) -> Result<T, StorageError>
where
    T::Err: std::fmt::Display,
{
    let suffix = keys::id_suffix(key, prefix).ok_or_else(|| StorageError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: "non-utf8 key suffix".into(),
    })?;
    suffix.parse().map_err(|e: T::Err| StorageError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LedgerDb;
    use nebulink_types::ChainType;
    use tempfile::TempDir;

    #[test]
    fn test_scores_round_trip_across_commit() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let a = ConsulPubKey([1u8; 32]);
        let b = ConsulPubKey([2u8; 32]);

        let mut tx = db.begin();
        tx.set_score(&a, 10);
        tx.set_score(&b, 5);
        tx.commit().unwrap();

        let view = db.ephemeral();
        let scores = view.scores().unwrap();
        assert_eq!(scores.get(&a), Some(&10));
        assert_eq!(scores.get(&b), Some(&5));
        assert!(matches!(
            view.score(&ConsulPubKey([9u8; 32])),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn test_results_listing_is_base64_per_oracle() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let nebula = NebulaId([1u8; 32]);
        let o1 = OraclesPubKey([2u8; 33]);
        let o2 = OraclesPubKey([3u8; 33]);

        let mut tx = db.begin();
        tx.set_result(&nebula, 7, &o1, b"sig-one");
        tx.set_result(&nebula, 7, &o2, b"sig-two");
        tx.set_result(&nebula, 8, &o1, b"other-pulse");

        let listed = tx.results(&nebula, 7).unwrap();
        assert_eq!(listed, vec![BASE64.encode(b"sig-one"), BASE64.encode(b"sig-two")]);
    }

    #[test]
    fn test_oracle_maps_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let consul = ConsulPubKey([1u8; 32]);
        let oracle = OraclesPubKey([2u8; 33]);

        let mut tx = db.begin();
        let mut by_type = OraclesByTypeMap::new();
        by_type.insert(ChainType::Ethereum, oracle);
        tx.set_oracles_by_consul(&consul, &by_type);

        assert_eq!(tx.oracles_by_consul(&consul).unwrap(), by_type);
    }
}
