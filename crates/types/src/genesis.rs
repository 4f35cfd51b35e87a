//! Application genesis format.

use crate::{ChainType, ConsulPubKey, OraclesPubKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One pre-registered oracle address for a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclesAddresses {
    pub chain_type: ChainType,
    pub oracles_pub_key: OraclesPubKey,
}

/// Application genesis parameters, fed to `init_chain` alongside the
/// consensus engine's validator list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Cap on both the active consul list and the candidate list.
    pub consuls_count: u32,
    /// Cap on the per-nebula active oracle subset.
    pub bft_oracle_in_nebula_count: u32,
    /// Oracle addresses registered at genesis, per validator.
    #[serde(default)]
    pub oracles_address_by_validator: BTreeMap<ConsulPubKey, Vec<OraclesAddresses>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_json_round_trip() {
        let mut oracles = BTreeMap::new();
        oracles.insert(
            ConsulPubKey([1u8; 32]),
            vec![OraclesAddresses {
                chain_type: ChainType::Ethereum,
                oracles_pub_key: OraclesPubKey([2u8; 33]),
            }],
        );
        let genesis = Genesis {
            consuls_count: 5,
            bft_oracle_in_nebula_count: 5,
            oracles_address_by_validator: oracles,
        };
        let json = serde_json::to_string(&genesis).unwrap();
        let back: Genesis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, genesis);
    }
}
