//! Poll failure taxonomy.

use pw_core::PwError;
use thiserror::Error;

use crate::snapshot::SnapshotError;

/// Everything that can make a single poll produce no update.
#[derive(Debug, Error)]
pub enum PollError {
    /// Connection, TLS, timeout or body read failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Body was not valid JSON.
    #[error("malformed body: {0}")]
    Body(#[from] serde_json::Error),

    /// Body was JSON but not a usable snapshot.
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Markup could not be written to the target.
    #[error(transparent)]
    Target(#[from] PwError),
}
