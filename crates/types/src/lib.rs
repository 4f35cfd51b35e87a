//! Core types for the Nebulink oracle ledger.
//!
//! This crate provides the foundational types used throughout the ledger,
//! the oracle runtime, and the node:
//!
//! - **Identifiers**: consul / oracle public keys, nebula ids, chain types
//! - **Key material**: ed25519 keypairs and signatures
//! - **Transactions**: the self-describing ledger transaction and its codec
//! - **Entities**: consuls, votes, nebula descriptors
//! - **Sub-rounds**: the height-derived oracle round phase
//! - **Genesis**: the application genesis format
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod crypto;
mod entities;
mod genesis;
mod identifiers;
mod subround;
mod transaction;

pub use crypto::{verify_signature, KeyPair, Signature};
pub use entities::{Consul, NebulaInfo, OraclesByTypeMap, OraclesMap, Vote};
pub use genesis::{Genesis, OraclesAddresses};
pub use identifiers::{ChainType, ConsulPubKey, IdError, NebulaId, OraclesPubKey, PulseId};
pub use subround::{SubRound, SUB_ROUND_COUNT};
pub use transaction::{pulse_commit_hash, Transaction, TxError, TxFunc, TxValue};
