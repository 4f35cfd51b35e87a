//! The consensus-engine lifecycle adapter.
//!
//! The BFT engine is a black box that orders transactions and drives the
//! application through the lifecycle below. `LedgerApp` bridges that
//! contract to the state transition, the scheduler and storage.
//!
//! Failure policy: a domain error in a transaction maps to a non-zero
//! response code and changes nothing; a storage failure during block
//! application panics so consensus can recover the replica via replay.

use crate::error::{LedgerError, StorageError};
use crate::query;
use crate::scheduler::Scheduler;
use crate::state;
use crate::storage::{LedgerDb, StateTx};
use nebulink_types::{Consul, ConsulPubKey, Genesis, OraclesByTypeMap, Transaction};
use tracing::{error, info, warn};

pub const CODE_OK: u32 = 0;
pub const CODE_ERROR: u32 = 500;
pub const CODE_NOT_FOUND: u32 = 404;

/// One validator from the engine's genesis set.
#[derive(Debug, Clone, Copy)]
pub struct InitValidator {
    pub pub_key: ConsulPubKey,
    pub power: u64,
}

/// A validator-set change emitted from `end_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub pub_key: ConsulPubKey,
    pub power: u64,
}

/// The subset of the block header the application consumes.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub height: u64,
}

/// Response to `check_tx` / `deliver_tx`.
#[derive(Debug, Clone)]
pub struct TxResponse {
    pub code: u32,
    pub log: String,
}

impl TxResponse {
    fn ok() -> Self {
        Self {
            code: CODE_OK,
            log: String::new(),
        }
    }

    fn rejected(err: &LedgerError) -> Self {
        Self {
            code: CODE_ERROR,
            log: err.to_string(),
        }
    }
}

/// Response to `query`.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub code: u32,
    pub value: Vec<u8>,
}

/// Handshake information returned from `info`.
#[derive(Debug, Clone, Default)]
pub struct AppInfo {
    pub last_block_height: u64,
}

/// The application contract the consensus engine drives.
pub trait Application {
    fn info(&self) -> AppInfo;
    fn set_option(&mut self, key: &str, value: &str);
    fn init_chain(&mut self, validators: &[InitValidator]);
    fn check_tx(&self, tx: &[u8]) -> TxResponse;
    fn deliver_tx(&mut self, tx: &[u8]) -> TxResponse;
    fn begin_block(&mut self, header: BlockHeader);
    fn end_block(&mut self, height: u64) -> Vec<ValidatorUpdate>;
    fn commit(&mut self);
    fn query(&self, path: &str, data: &[u8]) -> QueryResponse;
}

/// The oracle ledger application.
pub struct LedgerApp {
    db: LedgerDb,
    genesis: Genesis,
    scheduler: Scheduler,
    block_tx: Option<StateTx>,
    /// True while the replica is replaying blocks to catch up; suppresses
    /// the consul duty spawn.
    pub is_sync: bool,
}

impl LedgerApp {
    pub fn new(db: LedgerDb, genesis: Genesis, scheduler: Scheduler) -> Self {
        Self {
            db,
            genesis,
            scheduler,
            block_tx: None,
            is_sync: false,
        }
    }

    fn decode_and_verify(tx: &[u8]) -> Result<Transaction, LedgerError> {
        let tx = Transaction::decode(tx)?;
        tx.verify()?;
        Ok(tx)
    }
}

impl Application for LedgerApp {
    fn info(&self) -> AppInfo {
        let view = self.db.ephemeral();
        AppInfo {
            last_block_height: view.last_height().unwrap_or(0),
        }
    }

    fn set_option(&mut self, _key: &str, _value: &str) {}

    fn init_chain(&mut self, validators: &[InitValidator]) {
        let mut store = self.db.begin();

        store.set_bft_oracle_in_nebula_count(u64::from(self.genesis.bft_oracle_in_nebula_count));
        store.set_consuls_count(u64::from(self.genesis.consuls_count));

        let mut consuls = Vec::with_capacity(validators.len());
        for validator in validators {
            store.set_score(&validator.pub_key, validator.power);
            consuls.push(Consul {
                pub_key: validator.pub_key,
                value: validator.power,
            });
        }
        store.set_consuls(&consuls);
        store.set_consuls_candidate(&consuls);

        for (validator, addresses) in &self.genesis.oracles_address_by_validator {
            let mut oracles = OraclesByTypeMap::new();
            for entry in addresses {
                oracles.insert(entry.chain_type, entry.oracles_pub_key);
            }
            store.set_oracles_by_consul(validator, &oracles);
        }

        store
            .commit()
            .expect("genesis commit failed - replica cannot start from inconsistent state");
        info!(validators = validators.len(), "chain initialized");
    }

    fn check_tx(&self, tx: &[u8]) -> TxResponse {
        let decoded = match Self::decode_and_verify(tx) {
            Ok(tx) => tx,
            Err(e) => return TxResponse::rejected(&e),
        };

        // Pre-validation runs on a discardable overlay; committed state is
        // untouched no matter what the transaction does.
        let mut mock = self.db.ephemeral();
        match state::apply(&decoded, &mut mock) {
            Ok(()) => TxResponse::ok(),
            Err(e) => TxResponse::rejected(&e),
        }
    }

    fn deliver_tx(&mut self, tx: &[u8]) -> TxResponse {
        let decoded = match Self::decode_and_verify(tx) {
            Ok(tx) => tx,
            Err(e) => return TxResponse::rejected(&e),
        };

        let store = self
            .block_tx
            .as_mut()
            .expect("deliver_tx outside a block - engine lifecycle violation");
        match state::apply(&decoded, store) {
            Ok(()) => TxResponse::ok(),
            Err(e) => {
                warn!(id = %decoded.id, func = ?decoded.func, %e, "transaction rejected");
                TxResponse::rejected(&e)
            }
        }
    }

    fn begin_block(&mut self, header: BlockHeader) {
        let mut store = self.db.begin();

        if let Err(e) = self
            .scheduler
            .handle_block(header.height, &mut store, self.is_sync)
        {
            if e.is_fatal() {
                panic!("scheduler storage failure at height {}: {e}", header.height);
            }
            error!(height = header.height, %e, "scheduler error");
        }

        self.block_tx = Some(store);
    }

    fn end_block(&mut self, height: u64) -> Vec<ValidatorUpdate> {
        let store = self
            .block_tx
            .as_mut()
            .expect("end_block outside a block - engine lifecycle violation");

        store.set_last_height(height);

        let consuls = match store.consuls() {
            Ok(consuls) => consuls,
            Err(StorageError::NotFound) => return Vec::new(),
            Err(e) => panic!("consul read failed at height {height}: {e}"),
        };

        consuls
            .iter()
            .take(self.genesis.consuls_count as usize)
            .filter(|c| c.value != 0)
            .map(|c| ValidatorUpdate {
                pub_key: c.pub_key,
                power: c.value,
            })
            .collect()
    }

    fn commit(&mut self) {
        let store = self
            .block_tx
            .take()
            .expect("commit outside a block - engine lifecycle violation");
        store
            .commit()
            .expect("block commit failed - aborting so consensus can replay");
    }

    fn query(&self, path: &str, data: &[u8]) -> QueryResponse {
        let view = self.db.ephemeral();
        match query::dispatch(&view, path, data) {
            Ok(value) => QueryResponse {
                code: CODE_OK,
                value,
            },
            Err(query::QueryError::NotFound) => QueryResponse {
                code: CODE_NOT_FOUND,
                value: Vec::new(),
            },
            Err(e) => QueryResponse {
                code: CODE_ERROR,
                value: e.to_string().into_bytes(),
            },
        }
    }
}
