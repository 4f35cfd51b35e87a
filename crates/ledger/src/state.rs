//! The state transition: applies one decoded transaction to a storage
//! transaction, enforcing every ledger invariant.
//!
//! This function must be deterministic across replicas. Domain errors
//! reject the transaction and leave the storage transaction's buffer in a
//! consistent state: no operation writes before all of its preconditions
//! have passed.

use crate::error::{LedgerError, StorageError};
use crate::storage::StateTx;
use nebulink_types::{
    pulse_commit_hash, ChainType, NebulaId, NebulaInfo, OraclesByTypeMap, OraclesPubKey, PulseId,
    Transaction, TxFunc, TxValue, Vote,
};

/// Apply a verified transaction to the given storage transaction.
pub fn apply(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    match tx.func {
        TxFunc::Vote => apply_vote(tx, store),
        TxFunc::SetNebula => apply_set_nebula(tx, store),
        TxFunc::AddOracle => apply_add_oracle(tx, store),
        TxFunc::AddOracleInNebula => apply_add_oracle_in_nebula(tx, store),
        TxFunc::Commit => apply_commit(tx, store),
        TxFunc::Reveal => apply_reveal(tx, store),
        TxFunc::SignResult => apply_sign_result(tx, store),
    }
}

fn apply_vote(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let votes: Vec<Vote> = serde_json::from_slice(value_bytes(tx, 0)?)
        .map_err(|e| LedgerError::Malformed(format!("vote payload: {e}")))?;
    store.set_votes(&tx.sender_pub_key, &votes);
    Ok(())
}

fn apply_set_nebula(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let nebula = nebula_id(tx, 0)?;
    let info: NebulaInfo = serde_json::from_slice(value_bytes(tx, 1)?)
        .map_err(|e| LedgerError::Malformed(format!("nebula info payload: {e}")))?;

    match store.nebula_info(&nebula) {
        Ok(existing) if existing.owner != tx.sender_pub_key => {
            return Err(LedgerError::PreconditionViolation(format!(
                "nebula {nebula} is owned by {}",
                existing.owner
            )));
        }
        Ok(_) | Err(StorageError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    store.set_nebula_info(&nebula, &info);
    Ok(())
}

fn apply_add_oracle(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let chain_byte = value_bytes(tx, 0)?;
    let chain = match chain_byte {
        [b] => ChainType::from_byte(*b)
            .map_err(|e| LedgerError::Malformed(e.to_string()))?,
        _ => return Err(LedgerError::Malformed("chain type must be one byte".into())),
    };
    let oracle = oracle_pub_key(tx, 1)?;

    let mut oracles = match store.oracles_by_consul(&tx.sender_pub_key) {
        Ok(map) => map,
        Err(StorageError::NotFound) => OraclesByTypeMap::new(),
        Err(e) => return Err(e.into()),
    };

    if let Some(existing) = oracles.get(&chain) {
        if *existing != oracle {
            return Err(LedgerError::PreconditionViolation(format!(
                "consul already registered oracle {existing} for {chain}"
            )));
        }
    }

    oracles.insert(chain, oracle);
    store.set_oracles_by_consul(&tx.sender_pub_key, &oracles);
    Ok(())
}

fn apply_add_oracle_in_nebula(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let nebula = nebula_id(tx, 0)?;
    let oracle = oracle_pub_key(tx, 1)?;

    let info = match store.nebula_info(&nebula) {
        Ok(info) => info,
        Err(StorageError::NotFound) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "unknown nebula {nebula}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let consuls = store.consuls()?;
    if !consuls.iter().any(|c| c.pub_key == tx.sender_pub_key) {
        return Err(LedgerError::PreconditionViolation(
            "sender is not an active consul".into(),
        ));
    }

    let registered = match store.oracles_by_consul(&tx.sender_pub_key) {
        Ok(map) => map.get(&info.chain_type).copied(),
        Err(StorageError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    if registered != Some(oracle) {
        return Err(LedgerError::PreconditionViolation(format!(
            "oracle {oracle} is not registered by the sender for {}",
            info.chain_type
        )));
    }

    let sender_score = match store.score(&tx.sender_pub_key) {
        Ok(score) => score,
        Err(StorageError::NotFound) => 0,
        Err(e) => return Err(e.into()),
    };
    if sender_score < info.min_score {
        return Err(LedgerError::PreconditionViolation(format!(
            "consul score {sender_score} is below the nebula minimum {}",
            info.min_score
        )));
    }

    let mut oracles = match store.oracles_by_nebula(&nebula) {
        Ok(map) => map,
        Err(StorageError::NotFound) => Default::default(),
        Err(e) => return Err(e.into()),
    };
    oracles.insert(oracle, info.chain_type);
    store.set_oracles_by_nebula(&nebula, &oracles);
    Ok(())
}

fn apply_commit(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let nebula = nebula_id(tx, 0)?;
    let pulse = pulse_id(tx, 1)?;
    let oracle = oracle_pub_key(tx, 2)?;
    let hash = value_bytes(tx, 3)?;

    let bft_oracles = match store.bft_oracles_by_nebula(&nebula) {
        Ok(map) => map,
        Err(StorageError::NotFound) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "nebula {nebula} has no active oracle subset"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    if !bft_oracles.contains_key(&oracle) {
        return Err(LedgerError::PreconditionViolation(format!(
            "oracle {oracle} is not in the active subset for this round"
        )));
    }

    match store.commit_hash(&nebula, pulse, &oracle) {
        Ok(_) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "commit already exists for pulse {pulse}"
            )));
        }
        Err(StorageError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    store.set_commit_hash(&nebula, pulse, &oracle, hash);
    Ok(())
}

fn apply_reveal(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let nebula = nebula_id(tx, 0)?;
    let pulse = pulse_id(tx, 1)?;
    let oracle = oracle_pub_key(tx, 2)?;
    let preimage = value_bytes(tx, 3)?;

    let commit = match store.commit_hash(&nebula, pulse, &oracle) {
        Ok(hash) => hash,
        Err(StorageError::NotFound) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "no commit for pulse {pulse}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    match store.reveal(&nebula, pulse, &oracle) {
        Ok(_) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "reveal already exists for pulse {pulse}"
            )));
        }
        Err(StorageError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let expected = pulse_commit_hash(preimage, &oracle, pulse, &nebula);
    if commit != expected {
        return Err(LedgerError::DomainMismatch(format!(
            "reveal does not match the commit for pulse {pulse}"
        )));
    }

    store.set_reveal(&nebula, pulse, &oracle, preimage);
    Ok(())
}

fn apply_sign_result(tx: &Transaction, store: &mut StateTx) -> Result<(), LedgerError> {
    let nebula = nebula_id(tx, 0)?;
    let pulse = pulse_id(tx, 1)?;
    let oracle = oracle_pub_key(tx, 2)?;
    let signature = value_bytes(tx, 3)?;

    match store.reveal(&nebula, pulse, &oracle) {
        Ok(_) => {}
        Err(StorageError::NotFound) => {
            return Err(LedgerError::PreconditionViolation(format!(
                "no reveal for pulse {pulse}"
            )));
        }
        Err(e) => return Err(e.into()),
    }

    store.set_result(&nebula, pulse, &oracle, signature);
    Ok(())
}

// ── Payload extraction ──────────────────────────────────────────────────

fn value_at(tx: &Transaction, index: usize) -> Result<&TxValue, LedgerError> {
    tx.values.get(index).ok_or_else(|| {
        LedgerError::Malformed(format!("missing payload value at index {index}"))
    })
}

fn value_bytes(tx: &Transaction, index: usize) -> Result<&[u8], LedgerError> {
    match value_at(tx, index)? {
        TxValue::Bytes(b) => Ok(b),
        other => Err(LedgerError::Malformed(format!(
            "expected bytes at index {index}, got {other:?}"
        ))),
    }
}

fn nebula_id(tx: &Transaction, index: usize) -> Result<NebulaId, LedgerError> {
    NebulaId::try_from(value_bytes(tx, index)?)
        .map_err(|e| LedgerError::Malformed(e.to_string()))
}

fn oracle_pub_key(tx: &Transaction, index: usize) -> Result<OraclesPubKey, LedgerError> {
    OraclesPubKey::try_from(value_bytes(tx, index)?)
        .map_err(|e| LedgerError::Malformed(e.to_string()))
}

fn pulse_id(tx: &Transaction, index: usize) -> Result<PulseId, LedgerError> {
    match value_at(tx, index)? {
        TxValue::Int(v) if *v >= 0 => Ok(*v as PulseId),
        TxValue::Int(v) => Err(LedgerError::Malformed(format!("negative pulse id {v}"))),
        other => Err(LedgerError::Malformed(format!(
            "expected int at index {index}, got {other:?}"
        ))),
    }
}
