//! Shared server state: the price store plus the currently running feed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pw_core::{PriceStore, PwError, Service, UserQuote};
use pw_feed::TradeFeed;
use tokio::sync::Mutex;
use tracing::{error, info};

pub struct AppState {
    pub store: Arc<PriceStore>,
    pub page_title: String,
    pub target_id: String,
    board_page: Option<PathBuf>,
    stream_base_url: String,
    feed: Mutex<Option<TradeFeed>>,
}

impl AppState {
    pub fn new(store: Arc<PriceStore>, stream_base_url: String, page_title: String, target_id: String) -> Self {
        Self { store, page_title, target_id, board_page: None, stream_base_url, feed: Mutex::new(None) }
    }

    /// Serve the board poller's page file at `/` instead of a one-off render.
    pub fn with_board_page(mut self, path: impl Into<PathBuf>, target_id: impl Into<String>) -> Self {
        self.board_page = Some(path.into());
        self.target_id = target_id.into();
        self
    }

    pub fn board_page(&self) -> Option<&Path> {
        self.board_page.as_deref()
    }

    /// Symbol of the running feed, if any.
    pub async fn feed_symbol(&self) -> Option<String> {
        self.feed.lock().await.as_ref().map(|f| f.symbol().to_string())
    }

    /// Make sure a feed for `symbol` is running, replacing any feed for a
    /// different symbol. Only one feed runs at a time.
    pub async fn switch_feed(&self, symbol: &str) -> Result<(), PwError> {
        let mut slot = self.feed.lock().await;
        self.switch_feed_locked(&mut slot, symbol).await
    }

    async fn switch_feed_locked(&self, slot: &mut Option<TradeFeed>, symbol: &str) -> Result<(), PwError> {
        let mut new_feed = TradeFeed::new(&self.stream_base_url, symbol, self.store.clone())?;
        if slot.as_ref().is_some_and(|f| f.symbol() == new_feed.symbol()) {
            return Ok(());
        }
        if let Some(mut old) = slot.take() {
            info!("replacing feed '{}' with '{}'", old.symbol(), new_feed.symbol());
            if let Err(e) = old.stop().await {
                error!("error stopping '{}': {e}", old.name());
            }
        }
        new_feed.start().await.map_err(|e| PwError::WebSocket(e.to_string()))?;
        *slot = Some(new_feed);
        Ok(())
    }

    /// Record the user's price for `symbol` and follow that symbol's trades.
    ///
    /// Returns the market price currently known for the symbol.
    pub async fn subscribe(&self, symbol: &str, user_price: String) -> Result<Option<String>, PwError> {
        // feed and quote change together so they always name the same symbol
        let mut slot = self.feed.lock().await;
        self.switch_feed_locked(&mut slot, symbol).await?;
        self.store.set_user_quote(UserQuote { symbol: symbol.to_string(), price: user_price });
        Ok(self.store.latest_trade().map(|t| t.price))
    }

    pub async fn stop_feed(&self) {
        if let Some(mut feed) = self.feed.lock().await.take() {
            if let Err(e) = feed.stop().await {
                error!("error stopping '{}': {e}", feed.name());
            }
        }
    }
}
