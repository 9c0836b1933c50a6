//! Registry of device workers

use crate::config::{ClientConfig, CustomTypes};
use crate::connection::Connection;
use crate::device::DeviceWorker;
use crate::sink::Sink;
use ads_core::{AdsError, AdsResult, DeviceIdentity};
use ads_transport::TransportFactory;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL_REGISTRY: OnceCell<ConnectionRegistry> = OnceCell::new();

/// One [`DeviceWorker`] per device identity
///
/// Workers are created on first use and live until [`ConnectionRegistry::shutdown`].
pub struct ConnectionRegistry {
    devices: Mutex<HashMap<DeviceIdentity, Arc<DeviceWorker>>>,
    factory: Box<dyn TransportFactory>,
    config: Arc<ClientConfig>,
    custom_types: Arc<CustomTypes>,
}

impl ConnectionRegistry {
    /// Create a registry with default configuration
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self::with_config(factory, ClientConfig::default(), CustomTypes::default())
    }

    pub fn with_config(
        factory: impl TransportFactory + 'static,
        config: ClientConfig,
        custom_types: CustomTypes,
    ) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
            config: Arc::new(config),
            custom_types: Arc::new(custom_types),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the worker for `identity`, starting one if none is running
    pub fn get_or_create(&self, identity: &DeviceIdentity) -> AdsResult<Arc<DeviceWorker>> {
        let mut devices = self.devices.lock();
        if let Some(worker) = devices.get(identity).filter(|w| w.is_running()) {
            return Ok(Arc::clone(worker));
        }

        let transport = self.factory.create(identity)?;
        let worker = Arc::new(DeviceWorker::spawn(
            identity.clone(),
            transport,
            Arc::clone(&self.config),
            Arc::clone(&self.custom_types),
        )?);
        devices.insert(identity.clone(), Arc::clone(&worker));
        Ok(worker)
    }

    pub fn get(&self, identity: &DeviceIdentity) -> Option<Arc<DeviceWorker>> {
        self.devices.lock().get(identity).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Parse `address` and attach `sink` to the symbol it names
    pub fn connect(&self, address: &str, sink: Arc<dyn Sink>) -> AdsResult<Connection> {
        Connection::open(self, address, sink)
    }

    /// Stop every worker and forget them
    pub fn shutdown(&self) {
        let workers: Vec<Arc<DeviceWorker>> =
            self.devices.lock().drain().map(|(_, worker)| worker).collect();
        for worker in workers {
            worker.stop();
        }
    }

    /// Install the process-wide registry
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if a registry was already installed.
    pub fn install_global(registry: ConnectionRegistry) -> AdsResult<&'static ConnectionRegistry> {
        GLOBAL_REGISTRY
            .set(registry)
            .map_err(|_| AdsError::InvalidData("Global registry already installed".into()))?;
        Self::global()
            .ok_or_else(|| AdsError::InvalidData("Global registry not installed".into()))
    }

    /// The process-wide registry, if one was installed
    pub fn global() -> Option<&'static ConnectionRegistry> {
        GLOBAL_REGISTRY.get()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("devices", &self.devices.lock().keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
