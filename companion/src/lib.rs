//! Companion process of the wrist authenticator.
//!
//! Interprets the settings key namespace, keeps the authoritative token list, and pushes token
//! snapshots and clock drift calibrations to the wearable.

pub mod clock;
pub mod device;
pub mod error;
pub mod fields;
pub mod keys;
pub mod protocol;
pub mod qr;
pub mod settings;
pub mod validation;

pub use clock::ClockCalibration;
pub use device::{DeviceLink, MemoryDeviceLink};
pub use error::CompanionError;
pub use keys::ControlKey;
pub use protocol::{SyncOutcome, SyncProtocol};
pub use qr::{ImagePick, MemoryQrDecoder, QrTagDecoder};
pub use settings::{ChangeEvent, FileSettings, MemorySettings, SettingsStorage};

#[cfg(test)]
mod tests;
