use core::ops::RangeInclusive;

use super::render::TileView;

/// Display-side virtual list that owns the physical tiles.
///
/// Mutating tile content does not repaint on its own; the engine calls [`redraw`] explicitly
/// once per refresh.
///
/// [`redraw`]: VirtualListHost::redraw
pub trait VirtualListHost {
    /// Logical item count the host lays out.
    fn length(&self) -> usize;

    /// Update the logical item count, triggering a relayout on the host.
    fn set_length(&mut self, length: usize);

    /// Index of the first tile currently on screen.
    fn first_visible_tile(&self) -> usize;

    /// Index of the last tile currently on screen.
    fn last_visible_tile(&self) -> usize;

    /// Write content into a pooled tile slot.
    fn configure_tile(&mut self, slot: usize, view: &TileView);

    fn set_list_visible(&mut self, visible: bool);

    fn redraw(&mut self);
}

/// Transient status elements outside of the list.
pub trait StatusSurface {
    fn set_clock_sync_message_visible(&mut self, visible: bool);
}

/// On-screen index range, clamped to the list bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleWindow {
    pub first: usize,
    pub last: usize,
    pub total_length: usize,
}

impl VisibleWindow {
    /// Clamp `first..=last` into `[0, total_length - 1]`.
    pub fn new(first: usize, last: usize, total_length: usize) -> Self {
        if total_length == 0 {
            return Self::empty();
        }
        let last = last.min(total_length - 1);
        let first = first.min(last);
        Self {
            first,
            last,
            total_length,
        }
    }

    pub fn empty() -> Self {
        Self {
            first: 0,
            last: 0,
            total_length: 0,
        }
    }

    pub fn from_host<H: VirtualListHost + ?Sized>(host: &H) -> Self {
        Self::new(
            host.first_visible_tile(),
            host.last_visible_tile(),
            host.length(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.total_length == 0
    }

    /// Visible range widened by `margin` on both sides, still inside the list.
    pub fn with_margin(&self, margin: usize) -> Option<RangeInclusive<usize>> {
        if self.is_empty() {
            return None;
        }
        let start = self.first.saturating_sub(margin);
        let end = self
            .last
            .saturating_add(margin)
            .min(self.total_length - 1);
        Some(start..=end)
    }
}
