//! Consumer connections
//!
//! A [`Connection`] is the end-to-end path from a connection string to a
//! sink: parse the address, get the device worker, get the symbol and
//! attach the sink. Closing it releases the sink again.

use crate::device::DeviceWorker;
use crate::registry::ConnectionRegistry;
use crate::sink::{Sink, SinkId};
use crate::symbol::Symbol;
use ads_core::{AdsResult, TargetAddress, Value, parse_address};
use std::sync::Arc;

/// One consumer attached to a device symbol
#[derive(Debug)]
pub struct Connection {
    address: TargetAddress,
    device: Arc<DeviceWorker>,
    symbol: Arc<Symbol>,
    sink_id: SinkId,
    closed: bool,
}

impl Connection {
    /// Connect `sink` to the symbol named by `address`
    ///
    /// # Arguments
    ///
    /// * `address` - Connection string `<host>[:<port>]/[@<poll_rate>/]<symbol>`
    ///
    /// # Errors
    ///
    /// Address errors and transport creation failures are returned here.
    /// Failures on the device side, such as an unsupported symbol type, are
    /// logged by the worker and leave the connection without data.
    pub fn open(
        registry: &ConnectionRegistry,
        address: &str,
        sink: Arc<dyn Sink>,
    ) -> AdsResult<Self> {
        let address = parse_address(address)?;
        let device = registry.get_or_create(&address.identity())?;
        let (symbol, sink_id) = device.attach(&address.symbol, address.poll_interval(), sink)?;
        log::debug!(
            "Connected to {:?} on {} ({})",
            address.symbol,
            device.identity(),
            if address.use_push { "push" } else { "poll" }
        );
        Ok(Self {
            address,
            device,
            symbol,
            sink_id,
            closed: false,
        })
    }

    pub fn address(&self) -> &TargetAddress {
        &self.address
    }

    pub fn device(&self) -> &Arc<DeviceWorker> {
        &self.device
    }

    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue a write of `value` to the symbol
    pub fn write(&self, value: impl Into<Value>) -> AdsResult<()> {
        self.symbol.write(value.into())
    }

    /// Release this connection's sink
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> AdsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.release_symbol(&self.symbol, self.sink_id)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!(
                "Failed to release {:?} on {}: {}",
                self.address.symbol,
                self.device.identity(),
                e
            );
        }
    }
}
