//! Request bodies for the operator RPC.

use serde::Deserialize;

/// Body of `POST /vote`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VotesRq {
    pub votes: Vec<VoteRq>,
}

/// One vote entry: target consul (hex) and the endorsed score.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoteRq {
    pub pub_key: String,
    pub score: u64,
}

/// Body of `POST /setNebula`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetNebulaRq {
    pub nebula_id: String,
    pub chain_type: String,
    pub max_pulse_count_in_block: u64,
    pub min_score: u64,
}
