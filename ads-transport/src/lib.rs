//! Transport layer interface for the ADS symbol bridge
//!
//! The wire protocol itself lives outside this workspace. This crate defines
//! the [`Transport`] trait a protocol client implements, the notification
//! envelope it delivers, and the symbol-level helpers built on top of raw
//! index-group reads and writes.

pub mod access;
pub mod constants;
pub mod notification;
pub mod symbol_entry;
pub mod transport;

pub use access::SymbolAccess;
pub use ads_core::{AdsError, AdsResult};
pub use notification::{
    Notification, NotificationAttrib, NotificationCallback, NotificationHandle, TransmissionMode,
};
pub use symbol_entry::{SymbolEntry, SymbolUploadInfo, parse_symbol_table};
pub use transport::{Transport, TransportFactory};

#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
