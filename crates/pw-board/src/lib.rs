//! # pw-board
//!
//! Live price board: polls the `/live_price` endpoint on a fixed cadence and
//! renders a one-row comparison table (coin, market price, user price) into a
//! target element.
//!
//! - [`poller`]: `PricePoller` ([`pw_core::Service`]) and `poll_once`
//! - [`source`]: where snapshots come from (`HttpSource`)
//! - [`snapshot`]: schema check, integer parsing, favorable/warning verdict
//! - [`render`]: escaped table markup
//! - [`target`]: where markup goes (`PageFileTarget`, `MemoryTarget`)
//! - [`page`]: host page shell and in-place element replacement

pub mod error;
pub mod page;
pub mod poller;
pub mod render;
pub mod snapshot;
pub mod source;
pub mod target;

pub use error::PollError;
pub use poller::{PollStats, PricePoller, poll_once};
pub use snapshot::{PriceSnapshot, SnapshotError, Verdict};
pub use source::{HttpSource, SnapshotSource};
pub use target::{MemoryTarget, PageFileTarget, RenderTarget};
