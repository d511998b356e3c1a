//! Typed error definitions shared across the workspace.
//!
//! [`PwError`] covers failures that callers may want to match on. Everything
//! else travels as `anyhow::Error`; since `PwError` implements
//! `std::error::Error` it converts into `anyhow` with `?`.

use thiserror::Error;

/// Domain-specific errors for pricewatch.
#[derive(Debug, Error)]
pub enum PwError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP listener or request error.
    #[error("http error: {0}")]
    Http(String),

    /// WebSocket connection or handshake error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Render target could not be read or written.
    #[error("target error: {0}")]
    Target(String),
}
