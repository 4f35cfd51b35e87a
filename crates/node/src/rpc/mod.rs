//! Operator RPC: local-only HTTP endpoints that build and submit signed
//! ledger transactions on behalf of the node operator.

mod handlers;
mod routes;
mod server;
mod types;

pub use handlers::RpcState;
pub use routes::create_router;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
pub use types::{SetNebulaRq, VoteRq, VotesRq};
