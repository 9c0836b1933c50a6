//! ADS symbol bridge
//!
//! Connects named symbols on Beckhoff-style controllers to value sinks,
//! either through device push notifications or fixed-rate polling. All
//! traffic for one device is serialized through a single worker thread.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `ads-core`: error type, connection string parsing, data types, value codec
//! - `ads-transport`: transport trait, notification envelope, symbol metadata
//! - `ads-client`: device workers, symbols, registry and connections
//!
//! The transport itself (socket and protocol framing) is supplied by the
//! application through [`transport::TransportFactory`].
//!
//! # Usage
//!
//! ```no_run
//! use ads::client::{ChannelPayload, ConnectionRegistry};
//! use ads::transport::Transport;
//! use ads::{AdsResult, DeviceIdentity};
//! use std::sync::Arc;
//!
//! fn open_transport(identity: &DeviceIdentity) -> AdsResult<Box<dyn Transport>> {
//!     unimplemented!("protocol client for {}", identity)
//! }
//!
//! let registry = ConnectionRegistry::new(open_transport);
//! let (tx, rx) = crossbeam_channel::unbounded::<ChannelPayload>();
//! let _connection = registry.connect("10.0.0.5/MAIN.flag", Arc::new(tx))?;
//! # Ok::<(), ads::AdsError>(())
//! ```

// Re-export core types
pub use ads_core::datatypes::*;
pub use ads_core::{
    AdsError, AdsResult, DeviceIdentity, TargetAddress, datetime_to_filetime, decode_value,
    encode_value, filetime_to_datetime, parse_address,
};

// Re-export the transport seam
pub mod transport {
    pub use ads_transport::*;
}

// Re-export client API
pub mod client {
    pub use ads_client::*;
}
