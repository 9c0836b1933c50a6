//! Device symbols
//!
//! A [`Symbol`] is one (name, poll rate) pair on a device. It starts
//! unresolved; the first [`Symbol::set_connection`] queues its activation on
//! the device worker, which resolves the type and then either subscribes to
//! push notifications or reads once and joins the poll group for its rate.
//! Releasing the last sink tears the device-side state down again.

use crate::decoder::decode_notification;
use crate::device::DeviceCore;
use crate::poll::{PollCallback, PollId};
use crate::queue::Command;
use crate::resolver::resolve_symbol_type;
use crate::sink::{ChannelPayload, Sink, SinkId};
use ads_core::{AdsError, AdsResult, TypeDescriptor, Value, decode_value, encode_value};
use ads_transport::{
    Notification, NotificationCallback, NotificationHandle, SymbolAccess, Transport,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct SymbolState {
    descriptor: Option<TypeDescriptor>,
    notification: Option<NotificationHandle>,
    poll_id: Option<PollId>,
    activated: bool,
    released: bool,
    payload: ChannelPayload,
    // Bumped by every publish
    generation: u64,
    sinks: Vec<(SinkId, Arc<dyn Sink>)>,
    next_sink_id: u64,
}

/// Current payload owed to a sink that joined an active symbol
pub(crate) struct Replay {
    generation: u64,
    payload: ChannelPayload,
}

/// A named variable on a device
pub struct Symbol {
    device: Arc<DeviceCore>,
    name: String,
    poll_rate: Option<Duration>,
    state: Mutex<SymbolState>,
    // Held while payloads go out, so sinks see them in publish order
    delivery: ReentrantMutex<()>,
}

impl Symbol {
    pub(crate) fn new(device: Arc<DeviceCore>, name: &str, poll_rate: Option<Duration>) -> Self {
        Self {
            device,
            name: name.to_string(),
            poll_rate,
            state: Mutex::new(SymbolState::default()),
            delivery: ReentrantMutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll period, `None` for push notifications
    pub fn poll_rate(&self) -> Option<Duration> {
        self.poll_rate
    }

    pub(crate) fn key(&self) -> (String, Option<Duration>) {
        (self.name.clone(), self.poll_rate)
    }

    /// Resolved decoding shape, once the worker has resolved it
    pub fn descriptor(&self) -> Option<TypeDescriptor> {
        self.state.lock().descriptor.clone()
    }

    /// Last payload forwarded to the sinks
    pub fn payload(&self) -> ChannelPayload {
        self.state.lock().payload.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().payload.connected
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn sink_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Attach a sink and activate the symbol on first use
    ///
    /// Activation is queued on the device worker and happens once per
    /// symbol. A sink attached after a value was published receives the
    /// current payload immediately, unless a newer one reached it first.
    ///
    /// # Errors
    ///
    /// `SymbolReleased` if the symbol was torn down, `WorkerStopped` if the
    /// device worker is gone.
    pub fn set_connection(self: &Arc<Self>, sink: Arc<dyn Sink>) -> AdsResult<SinkId> {
        let (id, replay) = self.attach_sink(Arc::clone(&sink))?;
        self.replay(sink.as_ref(), replay);
        Ok(id)
    }

    /// Register `sink`, returning the payload still owed to it
    pub(crate) fn attach_sink(
        self: &Arc<Self>,
        sink: Arc<dyn Sink>,
    ) -> AdsResult<(SinkId, Option<Replay>)> {
        let mut state = self.state.lock();
        if state.released {
            return Err(AdsError::SymbolReleased(self.name.clone()));
        }
        let id = SinkId(state.next_sink_id);
        state.next_sink_id += 1;

        if state.activated {
            state.sinks.push((id, sink));
            let replay = state.payload.value.is_some().then(|| Replay {
                generation: state.generation,
                payload: state.payload.clone(),
            });
            return Ok((id, replay));
        }

        let symbol = Arc::clone(self);
        self.device.queue().submit(Command::new(
            format!("initialize({:?})", self.name),
            move |transport| Ok(symbol.initialize(transport)?),
        ))?;
        state.activated = true;
        state.sinks.push((id, sink));

        if let Some(rate) = self.poll_rate {
            let weak = Arc::downgrade(self);
            let callback: PollCallback = Arc::new(move || -> anyhow::Result<()> {
                let symbol = weak
                    .upgrade()
                    .ok_or_else(|| anyhow::anyhow!("symbol dropped"))?;
                symbol.poll_through_queue()?;
                Ok(())
            });
            let label = format!("poll({:?})", self.name);
            state.poll_id = Some(self.device.add_poll(rate, label, callback)?);
        }
        Ok((id, None))
    }

    /// Send an owed payload, skipped when a later publish already
    /// reached the sink
    pub(crate) fn replay(&self, sink: &dyn Sink, replay: Option<Replay>) {
        let Some(replay) = replay else {
            return;
        };
        let _delivery = self.delivery.lock();
        if self.state.lock().generation != replay.generation {
            return;
        }
        sink.send(&replay.payload);
    }

    /// Queue a write of `value`
    ///
    /// The value is encoded against the resolved type on the worker thread;
    /// encoding and device failures are logged there.
    pub fn write(self: &Arc<Self>, value: Value) -> AdsResult<()> {
        if self.is_released() {
            return Err(AdsError::SymbolReleased(self.name.clone()));
        }
        let label = format!("write({:?}, {})", self.name, value);
        let symbol = Arc::clone(self);
        self.device.queue().submit(Command::new(label, move |transport| {
            let descriptor = symbol.resolve(transport)?;
            let data = encode_value(&value, &descriptor)?;
            transport.write_by_name(&symbol.name, &data)?;
            Ok(())
        }))
    }

    /// Forward a new value to every sink
    ///
    /// Only the value, timestamp and connection flag of the payload change.
    pub fn publish(&self, timestamp: DateTime<Utc>, value: Value) {
        let _delivery = self.delivery.lock();
        let (payload, sinks) = {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            state.generation += 1;
            state.payload.connected = true;
            state.payload.value = Some(value);
            state.payload.timestamp = Some(timestamp);
            let sinks: Vec<Arc<dyn Sink>> =
                state.sinks.iter().map(|(_, sink)| Arc::clone(sink)).collect();
            (state.payload.clone(), sinks)
        };
        for sink in sinks {
            sink.send(&payload);
        }
    }

    /// Resolve and cache the decoding shape
    fn resolve(&self, transport: &mut dyn Transport) -> AdsResult<TypeDescriptor> {
        let cached = self.state.lock().descriptor.clone();
        if let Some(descriptor) = cached {
            return Ok(descriptor);
        }
        let descriptor =
            resolve_symbol_type(transport, &self.name, self.device.custom_types())?;
        self.state.lock().descriptor = Some(descriptor.clone());
        Ok(descriptor)
    }

    fn initialize(self: &Arc<Self>, transport: &mut dyn Transport) -> AdsResult<()> {
        let descriptor = self.resolve(transport)?;
        if self.poll_rate.is_some() {
            return self.poll(transport);
        }
        if self.is_released() {
            return Ok(());
        }

        let attrib = self.device.config().notification.attrib(descriptor.byte_size());
        let weak = Arc::downgrade(self);
        let callback: NotificationCallback = Arc::new(move |notification: &Notification| {
            if let Some(symbol) = weak.upgrade() {
                symbol.on_notification(notification);
            }
        });
        let handle = transport.add_notification(&self.name, attrib, callback)?;
        self.state.lock().notification = Some(handle);
        log::debug!(
            "Subscribed to {:?} on {} as {} (handle {})",
            self.name,
            self.device.identity(),
            descriptor,
            handle.0
        );
        Ok(())
    }

    /// Read the current value and publish it
    pub(crate) fn poll(&self, transport: &mut dyn Transport) -> AdsResult<()> {
        let descriptor = self.resolve(transport)?;
        let raw = transport.read_by_name(&self.name, descriptor.byte_size())?;
        let value = decode_value(&raw, &descriptor)?;
        self.publish(Utc::now(), value);
        Ok(())
    }

    fn poll_through_queue(self: &Arc<Self>) -> AdsResult<()> {
        let symbol = Arc::clone(self);
        self.device
            .queue()
            .call(format!("poll({:?})", self.name), move |transport| {
                symbol.poll(transport)
            })
    }

    fn on_notification(&self, notification: &Notification) {
        let Some(descriptor) = self.descriptor() else {
            log::warn!(
                "Dropping sample of {:?} on {}: type not resolved",
                self.name,
                self.device.identity()
            );
            return;
        };
        match decode_notification(notification, &descriptor) {
            Ok((timestamp, value)) => self.publish(timestamp, value),
            Err(e) => log::warn!(
                "Dropping sample of {:?} on {}: {}",
                self.name,
                self.device.identity(),
                e
            ),
        }
    }

    /// Detach one sink, returning how many remain
    pub(crate) fn detach(&self, id: SinkId) -> usize {
        let mut state = self.state.lock();
        state.sinks.retain(|(sink_id, _)| *sink_id != id);
        state.sinks.len()
    }

    /// Leave the poll group and queue removal of the push subscription
    pub(crate) fn teardown(self: &Arc<Self>) -> AdsResult<()> {
        let poll_id = {
            let mut state = self.state.lock();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.sinks.clear();
            state.poll_id.take()
        };
        if let (Some(rate), Some(id)) = (self.poll_rate, poll_id) {
            self.device.remove_poll(rate, id);
        }

        let symbol = Arc::clone(self);
        self.device.queue().submit(Command::new(
            format!("release({:?})", self.name),
            move |transport| {
                let handle = symbol.state.lock().notification.take();
                if let Some(handle) = handle {
                    transport.remove_notification(handle)?;
                }
                Ok(())
            },
        ))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("device", self.device.identity())
            .field("name", &self.name)
            .field("poll_rate", &self.poll_rate)
            .finish_non_exhaustive()
    }
}
