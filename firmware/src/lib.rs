#![cfg_attr(not(test), no_std)]

//! Wearable display process.
//!
//! The device keeps a read-only copy of the token list pushed by the companion, corrects its
//! clock with the drift the companion measured, and renders the visible part of the list
//! through a fixed pool of tiles.

extern crate alloc;

pub mod app;
pub mod drift;
pub mod ui;

pub use app::{AppError, DeviceApp};
pub use drift::ClockDriftTracker;
