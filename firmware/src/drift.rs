use shared::totp::ClockDrift;

/// Clock correction applied before every code and progress computation.
///
/// Written once per calibration message from the companion and read by every render until the
/// next calibration. The tracker never triggers a render itself; callers refresh the list after
/// changing it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockDriftTracker {
    drift: ClockDrift,
}

impl ClockDriftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the drift; returns whether the value changed.
    pub fn set_drift(&mut self, drift: ClockDrift) -> bool {
        let changed = self.drift != drift;
        self.drift = drift;
        changed
    }

    pub fn drift(&self) -> ClockDrift {
        self.drift
    }

    /// Current time in milliseconds since the Unix epoch, corrected by the drift.
    pub fn adjusted_time_ms(&self, now_ms: u64) -> u64 {
        let adjusted = self.drift.apply(now_ms);
        if adjusted.is_negative() {
            0
        } else {
            adjusted as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_zero() {
        let tracker = ClockDriftTracker::new();
        assert_eq!(tracker.drift(), ClockDrift::ZERO);
        assert_eq!(tracker.adjusted_time_ms(42_000), 42_000);
    }

    #[test]
    fn applies_offset_when_setting_drift() {
        let mut tracker = ClockDriftTracker::new();
        assert!(tracker.set_drift(ClockDrift::from_secs_f64(5.25)));
        assert_eq!(tracker.adjusted_time_ms(10_000), 15_250);
        assert!(!tracker.set_drift(ClockDrift::from_millis(5_250)));
    }

    #[test]
    fn saturates_before_underflow() {
        let mut tracker = ClockDriftTracker::new();
        tracker.set_drift(ClockDrift::from_millis(-10_000));
        assert_eq!(tracker.adjusted_time_ms(1_000), 0);
    }
}
