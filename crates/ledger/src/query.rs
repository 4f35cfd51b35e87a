//! Read-only query handlers for external observers.
//!
//! Queries arrive through the engine's `query` lifecycle call as a path
//! plus a JSON request payload and run against a fresh view over the last
//! committed state. Structured responses are JSON; commit/reveal/result
//! lookups return the stored bytes verbatim.

use crate::error::StorageError;
use crate::storage::StateTx;
use nebulink_types::{ConsulPubKey, NebulaId, OraclesPubKey, PulseId};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Errors from query dispatch.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The requested value does not exist. Maps to response code 404.
    #[error("value not found")]
    NotFound,

    /// Unrecognized query path.
    #[error("unknown query path: {0}")]
    UnknownPath(String),

    /// Request payload failed to decode.
    #[error("bad query request: {0}")]
    BadRequest(String),

    /// Storage failure during the lookup.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StorageError> for QueryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => QueryError::NotFound,
            other => QueryError::Storage(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ByConsulRq {
    pub_key: ConsulPubKey,
}

#[derive(Deserialize)]
struct ByNebulaRq {
    nebula_id: NebulaId,
}

#[derive(Deserialize)]
struct PulseOracleRq {
    nebula_id: NebulaId,
    pulse_id: PulseId,
    oracle_pub_key: OraclesPubKey,
}

#[derive(Deserialize)]
struct ResultsRq {
    nebula_id: NebulaId,
    pulse_id: PulseId,
}

/// Dispatch one query against a read-only view.
pub fn dispatch(store: &StateTx, path: &str, data: &[u8]) -> Result<Vec<u8>, QueryError> {
    match path {
        "consuls" => to_json(&store.consuls()?),
        "consulsCandidate" => to_json(&store.consuls_candidate()?),
        "scores" => to_json(&store.scores()?),
        "nebulae" => to_json(&store.nebulae()?),
        "nebulaInfo" => {
            let rq: ByNebulaRq = decode(data)?;
            to_json(&store.nebula_info(&rq.nebula_id)?)
        }
        "oraclesByConsul" => {
            let rq: ByConsulRq = decode(data)?;
            to_json(&store.oracles_by_consul(&rq.pub_key)?)
        }
        "oraclesByNebula" => {
            let rq: ByNebulaRq = decode(data)?;
            to_json(&store.oracles_by_nebula(&rq.nebula_id)?)
        }
        "bftOraclesByNebula" => {
            let rq: ByNebulaRq = decode(data)?;
            to_json(&store.bft_oracles_by_nebula(&rq.nebula_id)?)
        }
        "commitHash" => {
            let rq: PulseOracleRq = decode(data)?;
            Ok(store.commit_hash(&rq.nebula_id, rq.pulse_id, &rq.oracle_pub_key)?)
        }
        "reveal" => {
            let rq: PulseOracleRq = decode(data)?;
            Ok(store.reveal(&rq.nebula_id, rq.pulse_id, &rq.oracle_pub_key)?)
        }
        "result" => {
            let rq: PulseOracleRq = decode(data)?;
            Ok(store.result(&rq.nebula_id, rq.pulse_id, &rq.oracle_pub_key)?)
        }
        "results" => {
            let rq: ResultsRq = decode(data)?;
            to_json(&store.results(&rq.nebula_id, rq.pulse_id)?)
        }
        "lastHeight" => to_json(&store.last_height()?),
        other => Err(QueryError::UnknownPath(other.to_string())),
    }
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, QueryError> {
    serde_json::from_slice(data).map_err(|e| QueryError::BadRequest(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, QueryError> {
    serde_json::to_vec(value).map_err(|e| QueryError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LedgerDb;
    use nebulink_types::{ChainType, Consul, NebulaInfo};
    use tempfile::TempDir;

    #[test]
    fn test_query_paths_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let nebula = NebulaId([1u8; 32]);
        let oracle = OraclesPubKey([2u8; 33]);
        let consul = ConsulPubKey([3u8; 32]);

        let mut tx = db.begin();
        tx.set_consuls(&[Consul {
            pub_key: consul,
            value: 10,
        }]);
        tx.set_nebula_info(
            &nebula,
            &NebulaInfo {
                chain_type: ChainType::Ethereum,
                owner: consul,
                max_pulse_count_in_block: 3,
                min_score: 0,
            },
        );
        tx.set_result(&nebula, 7, &oracle, b"sigma");
        tx.set_last_height(41);
        tx.commit().unwrap();

        let view = db.ephemeral();

        let consuls: Vec<Consul> =
            serde_json::from_slice(&dispatch(&view, "consuls", b"").unwrap()).unwrap();
        assert_eq!(consuls.len(), 1);

        let rq = serde_json::json!({ "nebula_id": nebula, "pulse_id": 7 });
        let results: Vec<String> =
            serde_json::from_slice(&dispatch(&view, "results", &serde_json::to_vec(&rq).unwrap()).unwrap())
                .unwrap();
        assert_eq!(results.len(), 1);

        let height: u64 =
            serde_json::from_slice(&dispatch(&view, "lastHeight", b"").unwrap()).unwrap();
        assert_eq!(height, 41);
    }

    #[test]
    fn test_missing_value_is_not_found() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let view = db.ephemeral();

        let rq = serde_json::json!({
            "nebula_id": NebulaId([9u8; 32]),
            "pulse_id": 1,
            "oracle_pub_key": OraclesPubKey([8u8; 33]),
        });
        let err = dispatch(&view, "commitHash", &serde_json::to_vec(&rq).unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::NotFound));
    }

    #[test]
    fn test_unknown_path_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let view = db.ephemeral();
        assert!(matches!(
            dispatch(&view, "blocks", b"").unwrap_err(),
            QueryError::UnknownPath(_)
        ));
    }
}
