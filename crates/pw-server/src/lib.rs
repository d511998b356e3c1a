//! # pw-server
//!
//! HTTP front of the price store: `/live_price` for the board, `/websocket`
//! to set the user price and pick the traded symbol, `/` for the host page.

pub mod routes;
pub mod server;
pub mod state;

pub use server::PriceServer;
pub use state::AppState;
