//! RPC server lifecycle.

use super::handlers::RpcState;
use super::routes::create_router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Errors from the RPC server.
#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),
}

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to listen on. Operator-facing, keep it local.
    pub listen_addr: SocketAddr,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 2500)),
        }
    }
}

/// Handle for a running RPC server.
pub struct RpcServerHandle {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// The address the server actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server task to finish (after cancellation).
    pub async fn stopped(self) {
        let _ = self.task.await;
    }
}

/// The operator RPC server.
pub struct RpcServer;

impl RpcServer {
    /// Bind and start serving. Shuts down gracefully when `cancel` fires.
    pub async fn start(
        config: RpcServerConfig,
        state: RpcState,
        cancel: CancellationToken,
    ) -> Result<RpcServerHandle, RpcServerError> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        let router = create_router(state);

        let task = tokio::spawn(async move {
            info!(%local_addr, "operator RPC listening");
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%e, "operator RPC server failed");
            }
        });

        Ok(RpcServerHandle { task, local_addr })
    }
}
