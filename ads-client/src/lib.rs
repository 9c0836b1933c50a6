//! ADS device connection manager
//!
//! This crate ties named device symbols to a small number of worker threads
//! per physical device.
//!
//! # Architecture
//!
//! - [`ConnectionRegistry`]: keyed cache of device workers, one per device identity
//! - [`DeviceWorker`]: owns the device transport; a single thread drains the
//!   device's command queue in FIFO order and one thread per poll rate
//!   round-robins the symbols polled at that rate
//! - [`Symbol`]: one (name, poll rate) pair on a device; resolves its type
//!   lazily on the worker thread and forwards decoded values to its sinks
//! - [`Connection`]: one consumer's view of a symbol, opened from a
//!   connection string
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use ads_client::{ConnectionRegistry, ChannelPayload};
//! use ads_core::{AdsResult, DeviceIdentity};
//! use ads_transport::Transport;
//! use std::sync::Arc;
//!
//! fn connect_transport(identity: &DeviceIdentity) -> AdsResult<Box<dyn Transport>> {
//!     unimplemented!("protocol client for {}", identity)
//! }
//!
//! let registry = ConnectionRegistry::new(connect_transport);
//! let (tx, rx) = crossbeam_channel::unbounded::<ChannelPayload>();
//! let connection = registry.connect("10.0.0.5/@0.5/MAIN.counter", Arc::new(tx))?;
//! let payload = rx.recv().unwrap();
//! println!("{:?}", payload.value);
//! # Ok::<(), ads_core::AdsError>(())
//! ```

pub mod config;
pub mod connection;
pub mod decoder;
pub mod device;
mod poll;
mod queue;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod symbol;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, CustomTypes, NotificationSettings};
pub use connection::Connection;
pub use decoder::decode_notification;
pub use device::DeviceWorker;
pub use registry::ConnectionRegistry;
pub use resolver::{resolve_entry, resolve_symbol_type};
pub use sink::{ChannelPayload, Sink, SinkId};
pub use symbol::Symbol;
