//! Lifecycle trait for long-running parts of the system.

use anyhow::Result;
use async_trait::async_trait;

/// Implemented by the poller, the trade feed and the HTTP server.
///
/// A service owns its background tasks: `start` spawns them, `stop` signals
/// shutdown and waits for them to finish. Only `Send` is required because the
/// runner drives services sequentially.
#[async_trait]
pub trait Service: Send {
    /// Human-readable service name, used as the log label.
    fn name(&self) -> &str;
    /// Spawn the background task(s). Errors if already running.
    async fn start(&mut self) -> Result<()>;
    /// Stop all tasks. Calling `stop` on a stopped service is a no-op.
    async fn stop(&mut self) -> Result<()>;
}
