//! Prometheus metrics for the operator RPC surface.

use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use std::sync::LazyLock;

static TX_SUBMITTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "nebulink_rpc_tx_submitted_total",
        "Transactions built and queued through the operator RPC",
        &["func"]
    )
    .expect("metric registration cannot fail")
});

static RPC_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "nebulink_rpc_errors_total",
        "Operator RPC requests rejected with an error"
    )
    .expect("metric registration cannot fail")
});

pub fn record_tx_submitted(func: &str) {
    TX_SUBMITTED.with_label_values(&[func]).inc();
}

pub fn record_rpc_error() {
    RPC_ERRORS.inc();
}
