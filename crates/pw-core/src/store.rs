//! In-process price store.
//!
//! Holds the most recent market trade for the subscribed symbol and the
//! user's reference price. The trade feed writes into it, the HTTP server
//! reads from it. Prices are kept as the exact strings the exchange or the
//! user sent; nothing here reformats them.

use std::sync::{PoisonError, RwLock};

use serde::Serialize;

/// Latest trade seen on the exchange stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTrade {
    /// Exchange symbol as reported by the stream (e.g. `"BTCUSDT"`).
    pub symbol: String,
    pub price: String,
    pub quantity: String,
    /// Exchange event time, milliseconds since Unix epoch.
    pub event_time_ms: u64,
    pub trade_id: u64,
}

/// Reference price supplied by the user for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuote {
    pub symbol: String,
    pub price: String,
}

/// Body of `GET /live_price`.
///
/// `user` is omitted from the JSON until a user price has been set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivePrice {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Default)]
struct Slots {
    trade: Option<MarketTrade>,
    user: Option<UserQuote>,
}

/// Thread-safe store shared (via `Arc`) by the feed and the server.
#[derive(Debug, Default)]
pub struct PriceStore {
    slots: RwLock<Slots>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade. Returns `false` if it was older than the stored trade
    /// for the same symbol and therefore dropped.
    ///
    /// Ordering is by `(event_time_ms, trade_id)`. A trade for a different
    /// symbol always replaces the stored one.
    pub fn record_trade(&self, trade: MarketTrade) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = &slots.trade {
            if current.symbol.eq_ignore_ascii_case(&trade.symbol)
                && (trade.event_time_ms, trade.trade_id) < (current.event_time_ms, current.trade_id)
            {
                return false;
            }
        }
        slots.trade = Some(trade);
        true
    }

    /// Set the user's reference price.
    ///
    /// A stored trade for another symbol is discarded so `/live_price` never
    /// pairs a user price with a different coin's market price.
    pub fn set_user_quote(&self, quote: UserQuote) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.trade.as_ref().is_some_and(|t| !same_symbol(&t.symbol, &quote.symbol)) {
            slots.trade = None;
        }
        slots.user = Some(quote);
    }

    pub fn latest_trade(&self) -> Option<MarketTrade> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).trade.clone()
    }

    pub fn user_quote(&self) -> Option<UserQuote> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).user.clone()
    }

    /// Snapshot for `/live_price`, or `None` before the first trade.
    pub fn live_price(&self) -> Option<LivePrice> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let trade = slots.trade.as_ref()?;
        Some(LivePrice {
            symbol: trade.symbol.clone(),
            price: trade.price.clone(),
            user: slots.user.as_ref().map(|u| u.price.clone()),
        })
    }
}

/// Stream symbols are upper case (`BTCUSDT`), user input is often lower case
/// and may be a bare coin (`btc`). A bare coin matches any pair it prefixes.
fn same_symbol(trade_symbol: &str, user_symbol: &str) -> bool {
    let trade = trade_symbol.to_ascii_uppercase();
    let user = user_symbol.to_ascii_uppercase();
    !user.is_empty() && trade.starts_with(&user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(symbol: &str, price: &str, time: u64, id: u64) -> MarketTrade {
        MarketTrade {
            symbol: symbol.into(),
            price: price.into(),
            quantity: "1".into(),
            event_time_ms: time,
            trade_id: id,
        }
    }

    #[test]
    fn empty_store_has_no_live_price() {
        let store = PriceStore::new();
        assert!(store.live_price().is_none());
        assert!(store.user_quote().is_none());
    }

    #[test]
    fn newer_trade_replaces_older() {
        let store = PriceStore::new();
        assert!(store.record_trade(trade("BTCUSDT", "50000.10", 100, 1)));
        assert!(store.record_trade(trade("BTCUSDT", "50001.00", 101, 2)));
        assert_eq!(store.latest_trade().unwrap().price, "50001.00");
    }

    #[test]
    fn stale_trade_dropped() {
        let store = PriceStore::new();
        store.record_trade(trade("BTCUSDT", "50001.00", 200, 7));
        assert!(!store.record_trade(trade("BTCUSDT", "49000.00", 150, 3)));
        // same millisecond, lower trade id
        assert!(!store.record_trade(trade("BTCUSDT", "49000.00", 200, 6)));
        assert_eq!(store.latest_trade().unwrap().price, "50001.00");
    }

    #[test]
    fn other_symbol_always_replaces() {
        let store = PriceStore::new();
        store.record_trade(trade("BTCUSDT", "50000", 500, 9));
        assert!(store.record_trade(trade("ETHUSDT", "3000", 1, 1)));
        assert_eq!(store.latest_trade().unwrap().symbol, "ETHUSDT");
    }

    #[test]
    fn live_price_omits_user_until_set() {
        let store = PriceStore::new();
        store.record_trade(trade("BTCUSDT", "50000", 1, 1));
        let body = serde_json::to_value(store.live_price().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "Symbol": "BTCUSDT", "price": "50000" }));

        store.set_user_quote(UserQuote { symbol: "btcusdt".into(), price: "49000".into() });
        let body = serde_json::to_value(store.live_price().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "Symbol": "BTCUSDT", "price": "50000", "user": "49000" }));
    }

    #[test]
    fn user_quote_for_other_symbol_clears_trade() {
        let store = PriceStore::new();
        store.record_trade(trade("BTCUSDT", "50000", 1, 1));
        store.set_user_quote(UserQuote { symbol: "ethusdt".into(), price: "3000".into() });
        assert!(store.latest_trade().is_none());
        assert!(store.live_price().is_none());
    }

    #[test]
    fn bare_coin_matches_pair() {
        let store = PriceStore::new();
        store.record_trade(trade("BTCUSDT", "50000", 1, 1));
        store.set_user_quote(UserQuote { symbol: "BTC".into(), price: "42000".into() });
        assert!(store.latest_trade().is_some());
    }
}
