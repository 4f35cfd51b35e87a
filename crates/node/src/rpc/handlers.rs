//! HTTP request handlers for the operator RPC.
//!
//! Each handler is a thin transaction builder: decode the body, assemble
//! the payload, sign with the node's validator key, and push the result to
//! the submission channel. Any failure maps to `400` with the error text;
//! success is an empty `200`.

use super::types::{SetNebulaRq, VotesRq};
use crate::metrics;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nebulink_types::{
    ChainType, ConsulPubKey, KeyPair, NebulaId, NebulaInfo, Transaction, TxFunc, TxValue, Vote,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Shared state for RPC handlers. Constructed once and owned by the
/// router; there is no process-wide configuration.
#[derive(Clone)]
pub struct RpcState {
    /// The node's validator keypair, used to sign built transactions.
    pub keypair: Arc<KeyPair>,
    /// Channel into the consensus engine's mempool.
    pub tx_sender: mpsc::Sender<Transaction>,
}

impl RpcState {
    pub fn new(keypair: Arc<KeyPair>, tx_sender: mpsc::Sender<Transaction>) -> Self {
        Self { keypair, tx_sender }
    }

    async fn submit(&self, tx: Transaction) -> Result<(), String> {
        let func = format!("{:?}", tx.func);
        let id = tx.id.clone();
        self.tx_sender
            .send(tx)
            .await
            .map_err(|_| "transaction channel closed".to_string())?;
        metrics::record_tx_submitted(&func);
        info!(%id, %func, "operator transaction queued");
        Ok(())
    }
}

/// Handler for `POST /vote`.
pub async fn vote_handler(State(state): State<RpcState>, body: Bytes) -> Response {
    match build_and_submit_vote(&state, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => reject(e),
    }
}

async fn build_and_submit_vote(state: &RpcState, body: &[u8]) -> Result<(), String> {
    let request: VotesRq = serde_json::from_slice(body).map_err(|e| e.to_string())?;

    let mut votes = Vec::with_capacity(request.votes.len());
    for entry in &request.votes {
        let pub_key = ConsulPubKey::from_hex(&entry.pub_key).map_err(|e| e.to_string())?;
        votes.push(Vote {
            pub_key,
            score: entry.score,
        });
    }
    let payload = serde_json::to_vec(&votes).map_err(|e| e.to_string())?;

    let tx = Transaction::build(&state.keypair, TxFunc::Vote, vec![TxValue::bytes(payload)]);
    state.submit(tx).await
}

/// Handler for `POST /setNebula`.
pub async fn set_nebula_handler(State(state): State<RpcState>, body: Bytes) -> Response {
    match build_and_submit_set_nebula(&state, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => reject(e),
    }
}

async fn build_and_submit_set_nebula(state: &RpcState, body: &[u8]) -> Result<(), String> {
    let request: SetNebulaRq = serde_json::from_slice(body).map_err(|e| e.to_string())?;

    let chain_type = request
        .chain_type
        .parse::<ChainType>()
        .map_err(|e| e.to_string())?;
    let nebula_id = NebulaId::from_hex(&request.nebula_id).map_err(|e| e.to_string())?;

    let info = NebulaInfo {
        chain_type,
        owner: state.keypair.public(),
        max_pulse_count_in_block: request.max_pulse_count_in_block,
        min_score: request.min_score,
    };
    let payload = serde_json::to_vec(&info).map_err(|e| e.to_string())?;

    let tx = Transaction::build(
        &state.keypair,
        TxFunc::SetNebula,
        vec![
            TxValue::bytes(nebula_id.as_bytes().to_vec()),
            TxValue::bytes(payload),
        ],
    );
    state.submit(tx).await
}

/// Handler for `GET /health` - liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Handler for `GET /metrics` - Prometheus exposition.
pub async fn metrics_handler() -> Response {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn reject(error: String) -> Response {
    metrics::record_rpc_error();
    (StatusCode::BAD_REQUEST, error).into_response()
}
