//! The price server as a [`Service`]: HTTP listener + optional startup feed.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use pw_core::config::{BoardConfig, DEFAULT_TARGET_ID, ServerConfig};
use pw_core::{PriceStore, PwError, Service};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::routes::router;
use crate::state::AppState;

pub struct PriceServer {
    name: String,
    bind: SocketAddr,
    initial_symbol: Option<String>,
    state: Arc<AppState>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PriceServer {
    /// With a `board` section, `/` serves the page file that board writes.
    pub fn new(config: &ServerConfig, board: Option<&BoardConfig>, store: Arc<PriceStore>) -> Result<Self, PwError> {
        let mut state = AppState::new(
            store,
            config.effective_stream_base_url(),
            config.effective_page_title(),
            DEFAULT_TARGET_ID.to_string(),
        );
        if let Some(board) = board {
            state = state.with_board_page(board.effective_page_path(), board.effective_target_id());
        }
        Ok(Self {
            name: "server".to_string(),
            bind: config.bind_addr()?,
            initial_symbol: config.symbol.clone(),
            state: Arc::new(state),
            local_addr: None,
            shutdown_tx: None,
            task: None,
        })
    }

    /// Address actually bound (useful with port 0). `None` until started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }
}

#[async_trait]
impl Service for PriceServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<()> {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            bail!("[{}] already running", self.name);
        }

        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|e| PwError::Http(format!("bind {}: {e}", self.bind)))?;
        let local_addr = listener.local_addr().map_err(|e| PwError::Http(e.to_string()))?;

        if let Some(symbol) = &self.initial_symbol {
            self.state.switch_feed(symbol).await?;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let app = router(self.state.clone());
        let label = self.name.clone();
        self.task = Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                error!("[{label}] server error: {e}");
            }
        }));
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        info!("[{}] listening on http://{local_addr}", self.name);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.state.stop_feed().await;
        info!("[{}] stopped", self.name);
        Ok(())
    }
}
