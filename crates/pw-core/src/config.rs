//! Configuration parsing for pricewatch.
//!
//! Everything is read from a single JSON file. Each top-level section is
//! optional; the runner starts only the services whose section is present.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "pricewatch", "log_path": "/tmp/log" },
//!   "server": { "bind": "127.0.0.1:5000", "symbol": "btcusdt" },
//!   "board": {
//!     "endpoint": "http://127.0.0.1:5000/live_price",
//!     "interval_ms": 1000,
//!     "overlap": "skip",
//!     "page_path": "board.html"
//!   }
//! }
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::PwError;

pub const DEFAULT_MODULE_NAME: &str = "pricewatch";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/ws";
pub const DEFAULT_PAGE_TITLE: &str = "Live price";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/live_price";
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PAGE_PATH: &str = "board.html";
pub const DEFAULT_TARGET_ID: &str = "log";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Logging metadata (file prefix, log directory).
    pub logging: Option<LoggingConfig>,

    /// Price server + trade feed. Absent means "don't serve".
    pub server: Option<ServerConfig>,

    /// Poller/renderer. Absent means "don't poll".
    pub board: Option<BoardConfig>,
}

impl AppConfig {
    /// Module name used as log file prefix.
    pub fn module_name(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.module_name.clone())
            .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string())
    }

    /// Log directory, if file logging is configured.
    pub fn log_path(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.log_path.clone())
    }

    /// Check every configured section, returning the first problem found.
    pub fn validate(&self) -> Result<(), PwError> {
        if let Some(server) = &self.server {
            server.bind_addr()?;
            let stream = server.effective_stream_base_url();
            let parsed = url::Url::parse(&stream)
                .map_err(|e| PwError::Config(format!("server.stream_base_url '{stream}': {e}")))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(PwError::Config(format!("server.stream_base_url '{stream}' is not a ws(s) URL")));
            }
        }
        if let Some(board) = &self.board {
            board.validate()?;
        }
        Ok(())
    }
}

/// Logging block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Price server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:5000`).
    pub bind: Option<String>,

    /// Base URL of the exchange trade stream; `/<symbol>@trade` is appended.
    pub stream_base_url: Option<String>,

    /// Symbol to subscribe at startup (e.g. `"btcusdt"`). Without it the feed
    /// starts on the first `POST /websocket`.
    pub symbol: Option<String>,

    /// Title of the host page served at `/`.
    pub page_title: Option<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, PwError> {
        let bind = self.bind.as_deref().unwrap_or(DEFAULT_BIND);
        bind.parse().map_err(|e| PwError::Config(format!("server.bind '{bind}': {e}")))
    }

    pub fn effective_stream_base_url(&self) -> String {
        self.stream_base_url.clone().unwrap_or_else(|| DEFAULT_STREAM_BASE_URL.to_string())
    }

    pub fn effective_page_title(&self) -> String {
        self.page_title.clone().unwrap_or_else(|| DEFAULT_PAGE_TITLE.to_string())
    }
}

/// What the poller does when a tick fires while the previous poll is still
/// waiting for its response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Skip the new poll; at most one request is in flight.
    #[default]
    Skip,
    /// Fire anyway; whichever response resolves last is rendered.
    Overlap,
}

/// Poller/renderer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardConfig {
    /// Absolute URL of the live price endpoint.
    pub endpoint: Option<String>,

    /// Poll period in milliseconds (default 1000).
    pub interval_ms: Option<u64>,

    /// Overlap policy for slow responses (default `skip`).
    pub overlap: Option<OverlapPolicy>,

    /// Per-request timeout in milliseconds. Unset means no timeout.
    pub request_timeout_ms: Option<u64>,

    /// Host page the board is rendered into (default `board.html`).
    pub page_path: Option<String>,

    /// `id` of the element whose content is replaced (default `log`).
    pub target_id: Option<String>,
}

impl BoardConfig {
    pub fn effective_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS))
    }

    pub fn effective_overlap(&self) -> OverlapPolicy {
        self.overlap.unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn effective_page_path(&self) -> String {
        self.page_path.clone().unwrap_or_else(|| DEFAULT_PAGE_PATH.to_string())
    }

    pub fn effective_target_id(&self) -> String {
        self.target_id.clone().unwrap_or_else(|| DEFAULT_TARGET_ID.to_string())
    }

    pub fn validate(&self) -> Result<(), PwError> {
        if self.interval_ms == Some(0) {
            return Err(PwError::Config("board.interval_ms must be > 0".into()));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(PwError::Config("board.request_timeout_ms must be > 0".into()));
        }
        let endpoint = self.effective_endpoint();
        let parsed =
            url::Url::parse(&endpoint).map_err(|e| PwError::Config(format!("board.endpoint '{endpoint}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PwError::Config(format!("board.endpoint '{endpoint}' is not an http(s) URL")));
        }
        if self.effective_target_id().is_empty() {
            return Err(PwError::Config("board.target_id must not be empty".into()));
        }
        Ok(())
    }
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: AppConfig =
        serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.server.is_none());
        assert!(cfg.board.is_none());
        assert_eq!(cfg.module_name(), "pricewatch");
        assert!(cfg.validate().is_ok());

        let board = BoardConfig::default();
        assert_eq!(board.interval(), Duration::from_millis(1000));
        assert_eq!(board.effective_overlap(), OverlapPolicy::Skip);
        assert_eq!(board.effective_target_id(), "log");
        assert!(board.request_timeout().is_none());
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "logging": { "module_name": "pw", "log_path": "/tmp/pw" },
            "server": { "bind": "0.0.0.0:8080", "symbol": "ethusdt" },
            "board": { "endpoint": "http://localhost:8080/live_price", "interval_ms": 250,
                       "overlap": "overlap", "request_timeout_ms": 900, "target_id": "prices" }
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();

        let server = cfg.server.as_ref().unwrap();
        assert_eq!(server.bind_addr().unwrap().port(), 8080);
        assert_eq!(server.effective_stream_base_url(), DEFAULT_STREAM_BASE_URL);

        let board = cfg.board.as_ref().unwrap();
        assert_eq!(board.interval(), Duration::from_millis(250));
        assert_eq!(board.effective_overlap(), OverlapPolicy::Overlap);
        assert_eq!(board.request_timeout(), Some(Duration::from_millis(900)));
        assert_eq!(board.effective_target_id(), "prices");
        assert_eq!(cfg.log_path().as_deref(), Some("/tmp/pw"));
    }

    #[test]
    fn zero_interval_rejected() {
        let board = BoardConfig { interval_ms: Some(0), ..Default::default() };
        assert!(matches!(board.validate(), Err(PwError::Config(_))));
    }

    #[test]
    fn relative_endpoint_rejected() {
        let board = BoardConfig { endpoint: Some("/live_price".into()), ..Default::default() };
        assert!(board.validate().is_err());

        let board = BoardConfig { endpoint: Some("ftp://host/live_price".into()), ..Default::default() };
        assert!(board.validate().is_err());
    }

    #[test]
    fn bad_bind_rejected() {
        let cfg = AppConfig {
            server: Some(ServerConfig { bind: Some("not-an-addr".into()), ..Default::default() }),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(PwError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "board": {{ "interval_ms": 500 }} }}"#).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.board.unwrap().interval(), Duration::from_millis(500));
    }

    #[test]
    fn load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "board": {{ "interval_ms": 0 }} }}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
