//! Cooperative shutdown flag shared by every loop

use std::time::Duration;

use log::info;
use tokio_util::sync::CancellationToken;

/// Set-once flag observed by every long-running component.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setting an already set signal is a no-op.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
            self.token.cancel();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Sleep for one tick. Returns `true` if the signal fired first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(duration) => self.token.is_cancelled(),
        }
    }
}
