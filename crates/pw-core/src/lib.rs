//! # pw-core
//!
//! Shared building blocks for the pricewatch workspace:
//!
//! - **Configuration** (`config`): JSON config deserialization + validation
//! - **Error types** (`error`): domain-specific `PwError` via thiserror
//! - **Logging** (`logging`): tracing-based console/file logging
//! - **Price store** (`store`): latest market trade and user quote
//! - **Service** (`service`): start/stop lifecycle shared by every runnable part

pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod store;

pub use error::PwError;
pub use service::Service;
pub use store::{LivePrice, MarketTrade, PriceStore, UserQuote};
