//! # pw-feed
//!
//! Exchange trade feed for a single symbol.
//!
//! ```text
//! wss://stream.binance.com:9443/ws/<symbol>@trade
//!     ──► stream::TradeStream (reconnecting WS task)
//!     ──► parser::parse_trade
//!     ──► PriceStore::record_trade  (+ below-user-price alert)
//! ```
//!
//! - [`feed`]: `TradeFeed`, the [`pw_core::Service`] wiring it together
//! - [`parser`]: Binance trade event parsing
//! - [`stream`]: WebSocket connection loop with backoff

pub mod feed;
pub mod parser;
pub mod stream;

pub use feed::TradeFeed;
