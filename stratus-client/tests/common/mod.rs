//! Shared test utilities for stratus-client integration tests.

use std::net::SocketAddr;

use axum::Router;
use stratus_client::{ApiClient, ClientConfig};
use tokio::net::TcpListener;

/// Test server wrapper serving a control plane stub router.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn the given router on an OS-assigned port.
    pub async fn spawn(router: Router) -> Self {
        // Bind to port 0 to let the OS choose an available port
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        // Small delay to ensure server is ready
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self {
            addr: actual_addr,
            shutdown_tx,
        }
    }

    /// Base URL for the stub control plane.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Build an [`ApiClient`] pointed at this server.
    pub fn client(&self, token: &str) -> ApiClient {
        ApiClient::new(ClientConfig::new(self.base_url(), token)).expect("valid client config")
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
