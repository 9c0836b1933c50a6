//! Device notification envelope and subscription attributes

use crate::constants::NOTIFICATION_DATA_OFFSET;
use ads_core::{AdsError, AdsResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked by the transport for every notification sample
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Handle identifying a notification subscription on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub u32);

/// When the device transmits samples (`ADSTRANS_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    NoTransmission = 0,
    ClientCycle = 1,
    ClientOnChange = 2,
    ServerCycle = 3,
    #[default]
    ServerOnChange = 4,
}

/// Attributes of a notification subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationAttrib {
    /// Number of bytes per sample
    pub length: usize,
    pub transmission_mode: TransmissionMode,
    /// Longest the device may delay a sample
    pub max_delay: Duration,
    /// Sampling period on the device
    pub cycle_time: Duration,
}

impl NotificationAttrib {
    /// On-change attributes with no delay or cycle time
    pub fn new(length: usize) -> Self {
        Self {
            length,
            transmission_mode: TransmissionMode::default(),
            max_delay: Duration::ZERO,
            cycle_time: Duration::ZERO,
        }
    }
}

/// One notification sample as delivered by the transport
///
/// The sample occupies `sample_size` bytes starting at `data_offset` in
/// `buffer`; the buffer may be longer than that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    handle: NotificationHandle,
    timestamp: u64,
    sample_size: u32,
    buffer: Bytes,
    data_offset: usize,
}

impl Notification {
    /// Create a notification from its parts
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Device file time of the sample
    /// * `sample_size` - Declared number of sample bytes
    /// * `buffer` - Envelope holding the sample
    /// * `data_offset` - Start of the sample inside `buffer`
    pub fn new(
        handle: NotificationHandle,
        timestamp: u64,
        sample_size: u32,
        buffer: Bytes,
        data_offset: usize,
    ) -> Self {
        Self {
            handle,
            timestamp,
            sample_size,
            buffer,
            data_offset,
        }
    }

    /// Parse a notification record: handle (u32), timestamp (u64),
    /// sample size (u32), then the sample
    pub fn from_bytes(buffer: Bytes) -> AdsResult<Self> {
        let header = buffer.get(..NOTIFICATION_DATA_OFFSET).ok_or_else(|| {
            AdsError::Decode(format!(
                "Notification record of {} bytes is shorter than its header",
                buffer.len()
            ))
        })?;
        let handle = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&header[4..12]);
        let sample_size = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
        Ok(Self {
            handle: NotificationHandle(handle),
            timestamp: u64::from_le_bytes(timestamp),
            sample_size,
            buffer,
            data_offset: NOTIFICATION_DATA_OFFSET,
        })
    }

    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Device file time of the sample
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Whole envelope, including anything around the sample
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    pub fn data_offset(&self) -> usize {
        self.data_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let mut record = Vec::new();
        record.extend_from_slice(&7u32.to_le_bytes());
        record.extend_from_slice(&132_539_328_000_000_000u64.to_le_bytes());
        record.extend_from_slice(&2u32.to_le_bytes());
        record.extend_from_slice(&[0x34, 0x12, 0xee, 0xee]);

        let notification = Notification::from_bytes(Bytes::from(record)).unwrap();
        assert_eq!(notification.handle(), NotificationHandle(7));
        assert_eq!(notification.timestamp(), 132_539_328_000_000_000);
        assert_eq!(notification.sample_size(), 2);
        assert_eq!(notification.data_offset(), NOTIFICATION_DATA_OFFSET);
        assert_eq!(notification.buffer().len(), 20);
    }

    #[test]
    fn test_from_bytes_short_header() {
        assert!(matches!(
            Notification::from_bytes(Bytes::from_static(&[0; 10])),
            Err(AdsError::Decode(_))
        ));
    }

    #[test]
    fn test_default_attrib() {
        let attrib = NotificationAttrib::new(4);
        assert_eq!(attrib.transmission_mode, TransmissionMode::ServerOnChange);
        assert_eq!(attrib.max_delay, Duration::ZERO);
    }
}
