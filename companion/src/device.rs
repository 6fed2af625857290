use shared::error::SharedError;
use shared::schema::{DeviceMessage, decode_device_message, encode_device_message};

/// Peer messaging channel towards the wearable. Carries opaque JSON payloads.
pub trait DeviceLink {
    fn send_payload(&mut self, payload: &[u8]) -> Result<(), SharedError>;

    fn send(&mut self, message: &DeviceMessage) -> Result<(), SharedError> {
        let payload = encode_device_message(message)?;
        self.send_payload(&payload)
    }
}

/// In-memory link that records every payload it is asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceLink {
    pub sent_payloads: Vec<Vec<u8>>,
    offline: bool,
}

impl MemoryDeviceLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail, as when the wearable is out of range.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Decode everything sent so far.
    pub fn sent_messages(&self) -> Result<Vec<DeviceMessage>, SharedError> {
        self.sent_payloads
            .iter()
            .map(|payload| decode_device_message(payload).map_err(SharedError::from))
            .collect()
    }

    pub fn last_message(&self) -> Option<DeviceMessage> {
        self.sent_payloads
            .last()
            .and_then(|payload| decode_device_message(payload).ok())
    }

    /// Drain recorded payloads, e.g. to forward them to a simulated device.
    pub fn take_payloads(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent_payloads)
    }
}

impl DeviceLink for MemoryDeviceLink {
    fn send_payload(&mut self, payload: &[u8]) -> Result<(), SharedError> {
        if self.offline {
            return Err(SharedError::Link("device is not connected".into()));
        }
        self.sent_payloads.push(payload.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sent_messages() {
        let mut link = MemoryDeviceLink::new();
        link.send(&DeviceMessage::ClockDrift { drift_ms: 250 })
            .expect("send");

        assert_eq!(
            link.last_message(),
            Some(DeviceMessage::ClockDrift { drift_ms: 250 })
        );
        assert_eq!(link.sent_messages().expect("decode").len(), 1);
        assert_eq!(link.take_payloads().len(), 1);
        assert!(link.sent_payloads.is_empty());
    }

    #[test]
    fn offline_link_fails_without_recording() {
        let mut link = MemoryDeviceLink::new();
        link.set_offline(true);
        assert!(matches!(
            link.send(&DeviceMessage::ClockDrift { drift_ms: 0 }),
            Err(SharedError::Link(_))
        ));
        assert!(link.sent_payloads.is_empty());
    }
}
