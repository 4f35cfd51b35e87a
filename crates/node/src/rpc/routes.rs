//! Route configuration for the operator RPC.

use super::handlers::{
    health_handler, metrics_handler, set_nebula_handler, vote_handler, RpcState,
};
use axum::routing::{get, post};
use axum::Router;

/// Create the operator RPC router.
pub fn create_router(state: RpcState) -> Router {
    Router::new()
        .route("/vote", post(vote_handler))
        .route("/setNebula", post(set_nebula_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
