//! Value consumers attached to symbols

use ads_core::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// State forwarded to sinks
///
/// Every publish merges into the previous payload: the value and timestamp
/// are replaced and the connection flag is set, nothing else is reset.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChannelPayload {
    pub connected: bool,
    pub value: Option<Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Receiver of symbol updates
///
/// Called from the device worker thread, poll threads and whatever thread
/// the transport delivers notifications on, possibly concurrently.
pub trait Sink: Send + Sync {
    fn send(&self, payload: &ChannelPayload);
}

impl Sink for crossbeam_channel::Sender<ChannelPayload> {
    fn send(&self, payload: &ChannelPayload) {
        if crossbeam_channel::Sender::send(self, payload.clone()).is_err() {
            log::debug!("Dropping payload for disconnected channel");
        }
    }
}

/// Identifies one sink attached to a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let payload = ChannelPayload {
            connected: true,
            value: Some(Value::Int32(3)),
            timestamp: None,
        };
        Sink::send(&tx, &payload);
        assert_eq!(rx.try_recv().unwrap(), payload);

        drop(rx);
        Sink::send(&tx, &payload);
    }

    #[test]
    fn test_payload_serializes() {
        let payload = ChannelPayload {
            connected: true,
            value: Some(Value::Bool(true)),
            timestamp: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["connected"], true);
    }
}
