//! Operator-facing node pieces: the local RPC surface, configuration,
//! telemetry bootstrap and metrics.
//!
//! The RPC server is a thin transaction builder: it signs operator
//! requests with the node's validator key and hands the transactions to
//! whatever consumes the submission channel (in production, the consensus
//! engine's mempool).

pub mod config;
pub mod metrics;
pub mod rpc;
pub mod telemetry;

pub use config::{NodeConfig, ConfigError};
pub use rpc::{create_router, RpcServer, RpcServerConfig, RpcServerError, RpcState};
pub use telemetry::init_telemetry;
