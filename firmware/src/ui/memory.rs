use alloc::{collections::BTreeMap, vec::Vec};

use super::host::{StatusSurface, VirtualListHost};
use super::render::TileView;

/// Display host that keeps tiles in memory, used by the simulator and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryListHost {
    length: usize,
    first_visible: usize,
    last_visible: usize,
    tiles: BTreeMap<usize, TileView>,
    /// `(slot, logical index)` for every configure call, oldest first.
    pub configured: Vec<(usize, usize)>,
    pub list_visible: bool,
    pub clock_sync_visible: bool,
    pub redraws: usize,
}

impl MemoryListHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user scrolling so that `first..=last` is on screen.
    pub fn scroll_to(&mut self, first: usize, last: usize) {
        self.first_visible = first;
        self.last_visible = last;
    }

    pub fn tile(&self, slot: usize) -> Option<&TileView> {
        self.tiles.get(&slot)
    }

    /// Content currently shown for logical `index`, if some slot holds it.
    pub fn tile_for_index(&self, index: usize) -> Option<&TileView> {
        self.tiles.values().find(|view| view.index == index)
    }
}

impl VirtualListHost for MemoryListHost {
    fn length(&self) -> usize {
        self.length
    }

    fn set_length(&mut self, length: usize) {
        self.length = length;
    }

    fn first_visible_tile(&self) -> usize {
        self.first_visible
    }

    fn last_visible_tile(&self) -> usize {
        self.last_visible
    }

    fn configure_tile(&mut self, slot: usize, view: &TileView) {
        self.configured.push((slot, view.index));
        self.tiles.insert(slot, view.clone());
    }

    fn set_list_visible(&mut self, visible: bool) {
        self.list_visible = visible;
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}

impl StatusSurface for MemoryListHost {
    fn set_clock_sync_message_visible(&mut self, visible: bool) {
        self.clock_sync_visible = visible;
    }
}
