//! Ctrl+C / SIGTERM handling.
//!
//! A signal does not kill the process outright: it cancels the running
//! operation so partial downloads are cleaned up and the state machine ends
//! in `Failed` before the process exits.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled once a shutdown signal arrives
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for SIGINT or SIGTERM, then cancel the token
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, cancelling current operation..."),
            _ = terminate => info!("Received SIGTERM, cancelling current operation..."),
            _ = self.token.cancelled() => return,
        }

        self.token.cancel();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_starts_uncancelled() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_returns_when_token_cancelled_elsewhere() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.token().cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), coordinator.wait_for_signal())
            .await
            .unwrap();
    }
}
