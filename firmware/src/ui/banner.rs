use super::host::StatusSurface;

/// How long the clock synchronization message stays on screen.
pub const CLOCK_SYNC_MESSAGE_DURATION_MS: u32 = 3_500;

/// Transient "clock synchronized" message with a timed auto-hide.
///
/// A second trigger while the message is up is ignored rather than restarting the timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockSyncBanner {
    duration_ms: u32,
    remaining_ms: Option<u32>,
}

impl ClockSyncBanner {
    pub fn new() -> Self {
        Self::with_duration(CLOCK_SYNC_MESSAGE_DURATION_MS)
    }

    pub fn with_duration(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            remaining_ms: None,
        }
    }

    pub fn is_showing(&self) -> bool {
        self.remaining_ms.is_some()
    }

    /// Show the message; returns `false` when it was already showing.
    pub fn show<S: StatusSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if self.is_showing() {
            return false;
        }
        self.remaining_ms = Some(self.duration_ms);
        surface.set_clock_sync_message_visible(true);
        true
    }

    /// Advance the auto-hide timer; returns `true` when the message was hidden by this tick.
    pub fn tick<S: StatusSurface + ?Sized>(&mut self, surface: &mut S, elapsed_ms: u32) -> bool {
        let Some(remaining) = self.remaining_ms else {
            return false;
        };
        if remaining > elapsed_ms {
            self.remaining_ms = Some(remaining - elapsed_ms);
            return false;
        }
        self.remaining_ms = None;
        surface.set_clock_sync_message_visible(false);
        true
    }
}

impl Default for ClockSyncBanner {
    fn default() -> Self {
        Self::new()
    }
}
