//! Push notification decoding

use ads_core::{AdsError, AdsResult, TypeDescriptor, Value, decode_value, filetime_to_datetime};
use ads_transport::Notification;
use chrono::{DateTime, Utc};

/// Decode one notification sample
///
/// Exactly `sample_size` bytes starting at the notification's data offset
/// are decoded; anything else in the envelope is ignored.
///
/// # Returns
///
/// The sample's wall-clock timestamp and decoded value
pub fn decode_notification(
    notification: &Notification,
    descriptor: &TypeDescriptor,
) -> AdsResult<(DateTime<Utc>, Value)> {
    let start = notification.data_offset();
    let size = notification.sample_size() as usize;
    let buffer = notification.buffer();
    let sample = start
        .checked_add(size)
        .and_then(|end| buffer.get(start..end))
        .ok_or_else(|| {
            AdsError::Decode(format!(
                "Sample of {} bytes at offset {} exceeds envelope of {} bytes",
                size,
                start,
                buffer.len()
            ))
        })?;

    let value = decode_value(sample, descriptor)?;
    let timestamp = filetime_to_datetime(notification.timestamp())?;
    Ok((timestamp, value))
}
