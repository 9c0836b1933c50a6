//! Transport collaborator trait

use crate::notification::{NotificationAttrib, NotificationCallback, NotificationHandle};
use ads_core::{AdsResult, DeviceIdentity};
use bytes::Bytes;

/// Client for one device's request/response and notification protocol
///
/// Implementations own the socket and the protocol framing. The bridge never
/// calls a transport from more than one thread at a time: every call is
/// issued from the owning device's worker thread. Notification callbacks
/// may be invoked from any thread the implementation chooses.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait Transport: Send {
    /// Open the connection to the device
    fn open(&mut self) -> AdsResult<()>;

    /// Close the connection, dropping all notifications
    fn close(&mut self) -> AdsResult<()>;

    /// Check if the connection is open
    fn is_open(&self) -> bool;

    /// Read `length` bytes from an index group/offset
    fn read(&mut self, index_group: u32, index_offset: u32, length: usize) -> AdsResult<Bytes>;

    /// Write `data` to an index group/offset
    fn write(&mut self, index_group: u32, index_offset: u32, data: &[u8]) -> AdsResult<()>;

    /// Write `data` and read up to `read_length` bytes back in one request
    fn read_write(
        &mut self,
        index_group: u32,
        index_offset: u32,
        read_length: usize,
        data: &[u8],
    ) -> AdsResult<Bytes>;

    /// Subscribe to change notifications of a symbol
    ///
    /// # Returns
    ///
    /// Handle to pass to [`Transport::remove_notification`]
    fn add_notification(
        &mut self,
        symbol_name: &str,
        attrib: NotificationAttrib,
        callback: NotificationCallback,
    ) -> AdsResult<NotificationHandle>;

    /// Cancel a subscription created by [`Transport::add_notification`]
    fn remove_notification(&mut self, handle: NotificationHandle) -> AdsResult<()>;
}

/// Creates the transport for a device the first time it is used
pub trait TransportFactory: Send + Sync {
    fn create(&self, identity: &DeviceIdentity) -> AdsResult<Box<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&DeviceIdentity) -> AdsResult<Box<dyn Transport>> + Send + Sync,
{
    fn create(&self, identity: &DeviceIdentity) -> AdsResult<Box<dyn Transport>> {
        self(identity)
    }
}
