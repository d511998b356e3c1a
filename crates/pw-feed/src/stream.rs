//! Reconnecting WebSocket reader for one exchange stream.
//!
//! The stream URL already names the subscription (`.../btcusdt@trade`), so
//! there is no subscribe message. The background task:
//! 1. Connects (TLS).
//! 2. Forwards every text frame to the callback.
//! 3. Answers server pings with pongs.
//! 4. Reconnects on close or error with exponential backoff (100 ms → 30 s).

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

/// Callback invoked for each received text frame.
pub type OnText = Arc<dyn Fn(&str) + Send + Sync>;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A WebSocket stream owned by a background tokio task.
pub struct TradeStream {
    url: String,
    label: String,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl TradeStream {
    /// Create a new (not yet started) stream.
    pub fn new(url: String, label: String) -> Self {
        Self { url, label, shutdown_tx: None, task: None }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the connection task. Restarts the stream if it was running.
    pub fn start(&mut self, on_text: OnText) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let url = self.url.clone();
        let label = self.label.clone();

        self.task = Some(tokio::spawn(connection_loop(url, label, on_text, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
    }

    /// Signal shutdown and wait for the task to close the socket.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TradeStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn connection_loop(url: String, label: String, on_text: OnText, mut shutdown_rx: watch::Receiver<bool>) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        info!("[{label}] connecting to {url}");
        let ws_stream = tokio::select! {
            res = tokio_tungstenite::connect_async(url.as_str()) => res,
            _ = shutdown_rx.changed() => return,
        };
        let ws_stream = match ws_stream {
            Ok((stream, _response)) => {
                backoff = INITIAL_BACKOFF;
                info!("[{label}] connected");
                stream
            }
            Err(e) => {
                error!("[{label}] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => on_text(text.as_str()),
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_write.send(Message::Pong(data)).await {
                                error!("[{label}] pong send error: {e}");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!("[{label}] received close frame: {frame:?}");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[{label}] stream ended");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        warn!("[{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
