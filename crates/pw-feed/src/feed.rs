//! Trade feed service: one symbol's trade stream into the [`PriceStore`].

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use pw_core::{PriceStore, PwError, Service};
use tracing::{debug, info};

use crate::parser::{below_user_price, parse_trade};
use crate::stream::{OnText, TradeStream};

/// Build the per-symbol trade stream URL from a base such as
/// `wss://stream.binance.com:9443/ws`.
pub fn trade_stream_url(base_url: &str, symbol: &str) -> Result<String, PwError> {
    let symbol = symbol.trim().to_ascii_lowercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PwError::WebSocket(format!("invalid stream symbol '{symbol}'")));
    }
    let base = url::Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| PwError::WebSocket(format!("invalid stream base '{base_url}': {e}")))?;
    let url = base
        .join(&format!("{symbol}@trade"))
        .map_err(|e| PwError::WebSocket(format!("invalid stream url for '{symbol}': {e}")))?;
    Ok(url.to_string())
}

/// Subscribes to `<symbol>@trade` and keeps the store's latest trade current.
pub struct TradeFeed {
    name: String,
    symbol: String,
    store: Arc<PriceStore>,
    stream: TradeStream,
}

impl TradeFeed {
    pub fn new(base_url: &str, symbol: &str, store: Arc<PriceStore>) -> Result<Self, PwError> {
        let url = trade_stream_url(base_url, symbol)?;
        let symbol = symbol.trim().to_ascii_lowercase();
        let name = format!("feed_{symbol}");
        Ok(Self { stream: TradeStream::new(url, name.clone()), name, symbol, store })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

}

/// Handle one raw frame: store the trade and raise the threshold alert.
fn on_frame(label: &str, store: &PriceStore, text: &str) {
    let Some(trade) = parse_trade(text) else {
        debug!("[{label}] ignoring frame: {text}");
        return;
    };

    debug!(
        "[{label}] {} price={} qty={} time={} id={}",
        trade.symbol, trade.price, trade.quantity, trade.event_time_ms, trade.trade_id
    );

    if let Some(user) = store.user_quote() {
        if below_user_price(&trade.price, &user.price) {
            info!(
                "[{label}] {} traded at {} below user price {} (qty={}, time={})",
                trade.symbol, trade.price, user.price, trade.quantity, trade.event_time_ms
            );
        }
    }

    if !store.record_trade(trade) {
        debug!("[{label}] dropped out-of-order trade");
    }
}

#[async_trait]
impl Service for TradeFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<()> {
        if self.stream.is_running() {
            bail!("[{}] already running", self.name);
        }
        let label = self.name.clone();
        let store = self.store.clone();
        let on_text: OnText = Arc::new(move |text| on_frame(&label, &store, text));
        self.stream.start(on_text);
        info!("[{}] started ({})", self.name, self.stream.url());
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stream.stop().await;
        info!("[{}] stopped", self.name);
        Ok(())
    }
}
