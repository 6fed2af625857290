//! Clock drift calibration against the wearable's reported time.

use serde::Deserialize;
use shared::totp::ClockDrift;

/// `compensateClockDrift` toggle: settings toggles store JSON booleans, scripted writers may
/// store the strings `"true"` / `"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ToggleValue {
    Bool(bool),
    Text(TextToggle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TextToggle {
    True,
    False,
}

pub fn parse_toggle(raw: &str) -> Result<bool, serde_json::Error> {
    Ok(match serde_json::from_str(raw)? {
        ToggleValue::Bool(value) => value,
        ToggleValue::Text(TextToggle::True) => true,
        ToggleValue::Text(TextToggle::False) => false,
    })
}

/// Tracks the last measured drift and whether it is forwarded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockCalibration {
    compensate: bool,
    measured: Option<ClockDrift>,
}

impl Default for ClockCalibration {
    fn default() -> Self {
        Self {
            compensate: true,
            measured: None,
        }
    }
}

impl ClockCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compensate(&self) -> bool {
        self.compensate
    }

    pub fn set_compensate(&mut self, compensate: bool) {
        self.compensate = compensate;
    }

    pub fn measured(&self) -> Option<ClockDrift> {
        self.measured
    }

    /// Record a measurement: true time minus the device clock.
    ///
    /// Differences outside the `i64` range saturate at its bounds.
    pub fn measure(&mut self, device_now_ms: u64, companion_now_ms: u64) -> ClockDrift {
        let delta = i128::from(companion_now_ms) - i128::from(device_now_ms);
        let millis = i64::try_from(delta).unwrap_or_else(|_| {
            log::warn!("device time {device_now_ms} ms is out of range, clamping drift");
            if delta < 0 { i64::MIN } else { i64::MAX }
        });
        let drift = ClockDrift::from_millis(millis);
        self.measured = Some(drift);
        drift
    }

    /// Drift the device should apply under the current toggle.
    pub fn effective(&self) -> ClockDrift {
        match (self.compensate, self.measured) {
            (true, Some(drift)) => drift,
            _ => ClockDrift::ZERO,
        }
    }
}
