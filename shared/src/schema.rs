//! Messages exchanged between the companion and the wearable.
//!
//! Both directions are JSON encoded; the peer messaging layer only moves opaque byte payloads.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::tokens::TokenSnapshot;

/// Companion to device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceMessage {
    /// Full replacement of the device-side token list.
    Tokens(TokenSnapshot),
    /// New clock drift calibration, in milliseconds.
    #[serde(rename_all = "camelCase")]
    ClockDrift { drift_ms: i64 },
}

/// Device to companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompanionMessage {
    /// Device wall clock at the moment of sending.
    #[serde(rename_all = "camelCase")]
    DeviceTime { now_ms: u64 },
}

pub fn encode_device_message(message: &DeviceMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

pub fn decode_device_message(payload: &[u8]) -> Result<DeviceMessage, serde_json::Error> {
    serde_json::from_slice(payload)
}

pub fn encode_companion_message(message: &CompanionMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

pub fn decode_companion_message(payload: &[u8]) -> Result<CompanionMessage, serde_json::Error> {
    serde_json::from_slice(payload)
}
