//! Ledger entities shared by the state machine, the query interface and the
//! operator RPC.

use crate::{ChainType, ConsulPubKey, OraclesPubKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validator entry: identity plus its power (consensus weight / score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consul {
    pub pub_key: ConsulPubKey,
    pub value: u64,
}

/// A single weighted endorsement of one consul by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub pub_key: ConsulPubKey,
    pub score: u64,
}

/// Descriptor of one data feed.
///
/// Created by `SetNebula`; only the owner may modify it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NebulaInfo {
    pub chain_type: ChainType,
    pub owner: ConsulPubKey,
    pub max_pulse_count_in_block: u64,
    pub min_score: u64,
}

/// Per-consul oracle registrations: at most one oracle per chain.
pub type OraclesByTypeMap = BTreeMap<ChainType, OraclesPubKey>;

/// Oracle set for a nebula. Ordered by pubkey so every replica iterates
/// identically.
pub type OraclesMap = BTreeMap<OraclesPubKey, ChainType>;
