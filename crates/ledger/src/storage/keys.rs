//! Composite key schema.
//!
//! Keys are `_`-joined strings of an entity tag and hex-encoded identifiers
//! (pulse ids stay decimal), chosen so prefix iteration groups rows by
//! entity, then by nebula and pulse.

use nebulink_types::{ConsulPubKey, NebulaId, OraclesPubKey, PulseId};

pub const SCORE: &str = "score";
pub const VOTE: &str = "vote";
pub const CONSULS: &str = "consuls";
pub const CONSULS_CANDIDATE: &str = "consuls_candidate";
pub const CONSULS_COUNT: &str = "consuls_count";
pub const BFT_ORACLE_COUNT: &str = "bft_oracle_in_nebula_count";
pub const NEBULA_INFO: &str = "nebula_info";
pub const ORACLES_BY_CONSUL: &str = "oracles_by_consul";
pub const ORACLES_BY_NEBULA: &str = "oracles_by_nebula";
pub const BFT_ORACLES_BY_NEBULA: &str = "bft_oracles_by_nebula";
pub const COMMIT: &str = "commit";
pub const REVEAL: &str = "reveal";
pub const RESULT: &str = "result";
pub const LAST_HEIGHT: &str = "last_height";
pub const LAST_ROUND_APPROVED: &str = "last_round_approved";

fn form_key(parts: &[&str]) -> Vec<u8> {
    parts.join("_").into_bytes()
}

pub fn score_key(consul: &ConsulPubKey) -> Vec<u8> {
    form_key(&[SCORE, &consul.to_hex()])
}

pub fn score_prefix() -> Vec<u8> {
    form_key(&[SCORE, ""])
}

pub fn vote_key(voter: &ConsulPubKey) -> Vec<u8> {
    form_key(&[VOTE, &voter.to_hex()])
}

pub fn vote_prefix() -> Vec<u8> {
    form_key(&[VOTE, ""])
}

pub fn consuls_key() -> Vec<u8> {
    form_key(&[CONSULS])
}

pub fn consuls_candidate_key() -> Vec<u8> {
    form_key(&[CONSULS_CANDIDATE])
}

pub fn consuls_count_key() -> Vec<u8> {
    form_key(&[CONSULS_COUNT])
}

pub fn bft_oracle_count_key() -> Vec<u8> {
    form_key(&[BFT_ORACLE_COUNT])
}

pub fn nebula_info_key(nebula: &NebulaId) -> Vec<u8> {
    form_key(&[NEBULA_INFO, &nebula.to_hex()])
}

pub fn nebula_info_prefix() -> Vec<u8> {
    form_key(&[NEBULA_INFO, ""])
}

pub fn oracles_by_consul_key(consul: &ConsulPubKey) -> Vec<u8> {
    form_key(&[ORACLES_BY_CONSUL, &consul.to_hex()])
}

pub fn oracles_by_nebula_key(nebula: &NebulaId) -> Vec<u8> {
    form_key(&[ORACLES_BY_NEBULA, &nebula.to_hex()])
}

pub fn bft_oracles_by_nebula_key(nebula: &NebulaId) -> Vec<u8> {
    form_key(&[BFT_ORACLES_BY_NEBULA, &nebula.to_hex()])
}

pub fn commit_key(nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey) -> Vec<u8> {
    form_key(&[COMMIT, &nebula.to_hex(), &pulse.to_string(), &oracle.to_hex()])
}

pub fn reveal_key(nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey) -> Vec<u8> {
    form_key(&[REVEAL, &nebula.to_hex(), &pulse.to_string(), &oracle.to_hex()])
}

pub fn result_key(nebula: &NebulaId, pulse: PulseId, oracle: &OraclesPubKey) -> Vec<u8> {
    form_key(&[RESULT, &nebula.to_hex(), &pulse.to_string(), &oracle.to_hex()])
}

pub fn results_prefix(nebula: &NebulaId, pulse: PulseId) -> Vec<u8> {
    form_key(&[RESULT, &nebula.to_hex(), &pulse.to_string(), ""])
}

pub fn last_height_key() -> Vec<u8> {
    form_key(&[LAST_HEIGHT])
}

pub fn last_round_approved_key() -> Vec<u8> {
    form_key(&[LAST_ROUND_APPROVED])
}

/// Extract the trailing hex identifier from a prefix-scanned key.
pub fn id_suffix<'a>(key: &'a [u8], prefix: &[u8]) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    std::str::from_utf8(rest).ok()
}
