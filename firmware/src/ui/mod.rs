//! Token list rendering for the wearable display.
//!
//! [`TileRenderEngine`] binds the on-screen slice of the token list to a fixed pool of
//! physical tiles owned by a [`VirtualListHost`], recomputing code, name, and progress ring for
//! each bound tile. [`ClockSyncBanner`] drives the transient clock synchronization message.

mod banner;
mod data;
mod host;
pub mod memory;
mod render;
mod tiles;

pub use banner::{CLOCK_SYNC_MESSAGE_DURATION_MS, ClockSyncBanner};
pub use data::TokenSource;
pub use host::{StatusSurface, VirtualListHost, VisibleWindow};
pub use memory::MemoryListHost;
pub use render::{ProgressArc, TileView};
pub use tiles::{
    DEFAULT_TILE_POOL_SIZE, INVISIBLE_UPDATE_MARGIN, RefreshReport, RenderError, TileBinding,
    TileRenderEngine,
};
