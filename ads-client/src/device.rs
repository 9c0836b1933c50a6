//! Device workers
//!
//! A [`DeviceWorker`] serializes all protocol traffic for one device
//! through its command queue and schedules the poll groups of its symbols.

use crate::config::{ClientConfig, CustomTypes};
use crate::poll::{PollCallback, PollGroup, PollId};
use crate::queue::{Command, CommandQueue};
use crate::sink::{Sink, SinkId};
use crate::symbol::Symbol;
use ads_core::{AdsResult, DeviceIdentity};
use ads_transport::{SymbolAccess, SymbolEntry, Transport};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// State shared between a worker and its symbols
pub(crate) struct DeviceCore {
    identity: DeviceIdentity,
    queue: CommandQueue,
    poll_groups: Mutex<HashMap<Duration, PollGroup>>,
    config: Arc<ClientConfig>,
    custom_types: Arc<CustomTypes>,
}

impl DeviceCore {
    pub(crate) fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub(crate) fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn custom_types(&self) -> &CustomTypes {
        &self.custom_types
    }

    /// Register a callback with the poll group for `rate`, starting the
    /// group's thread if needed
    pub(crate) fn add_poll(
        self: &Arc<Self>,
        rate: Duration,
        label: String,
        callback: PollCallback,
    ) -> AdsResult<PollId> {
        let mut groups = self.poll_groups.lock();
        let group = match groups.entry(rate) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let core = Arc::downgrade(self);
                entry.insert(PollGroup::spawn(
                    &self.identity,
                    rate,
                    &self.config.thread_name_prefix,
                    Box::new(move || {
                        if let Some(core) = core.upgrade() {
                            core.drop_empty_group(rate);
                        }
                    }),
                )?)
            }
        };
        log::debug!(
            "Polling {} on {} every {:.3} sec",
            label,
            self.identity,
            rate.as_secs_f64()
        );
        Ok(group.add(label, callback))
    }

    /// Remove a callback, stopping the group once it is empty
    pub(crate) fn remove_poll(&self, rate: Duration, id: PollId) {
        let mut groups = self.poll_groups.lock();
        let Some(group) = groups.get_mut(&rate) else {
            return;
        };
        group.remove(id);
        if group.is_empty() {
            groups.remove(&rate);
            log::debug!(
                "Stopped poll group {} @ {:.3} sec",
                self.identity,
                rate.as_secs_f64()
            );
        }
    }

    /// Drop the group for `rate` after its last callback was evicted,
    /// unless a new callback joined in the meantime
    fn drop_empty_group(&self, rate: Duration) {
        let mut groups = self.poll_groups.lock();
        if groups.get(&rate).is_some_and(PollGroup::is_empty) {
            groups.remove(&rate);
            log::debug!(
                "Stopped poll group {} @ {:.3} sec: no callbacks left",
                self.identity,
                rate.as_secs_f64()
            );
        }
    }

    fn stop_polling(&self) {
        self.poll_groups.lock().clear();
    }
}

/// Owner of one device's transport, command queue and poll groups
pub struct DeviceWorker {
    core: Arc<DeviceCore>,
    symbols: Mutex<HashMap<(String, Option<Duration>), Arc<Symbol>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceWorker {
    /// Start a worker for `identity` on `transport`
    ///
    /// The worker thread starts immediately; the transport is opened when
    /// the first symbol is acquired.
    pub fn spawn(
        identity: DeviceIdentity,
        transport: Box<dyn Transport>,
        config: Arc<ClientConfig>,
        custom_types: Arc<CustomTypes>,
    ) -> AdsResult<Self> {
        let (queue, handle) = CommandQueue::spawn(
            identity.clone(),
            transport,
            &config.thread_name_prefix,
            config.call_timeout,
        )?;
        Ok(Self {
            core: Arc::new(DeviceCore {
                identity,
                queue,
                poll_groups: Mutex::new(HashMap::new()),
                config,
                custom_types,
            }),
            symbols: Mutex::new(HashMap::new()),
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.core.identity
    }

    pub fn is_running(&self) -> bool {
        self.core.queue.is_running()
    }

    /// Get the symbol for (`name`, `poll_rate`), creating it on first use
    ///
    /// Repeated calls with the same key return the same instance. Creating
    /// a symbol queues opening the transport if it is not open yet. The
    /// returned symbol can be released by another consumer before a sink
    /// is attached; use [`DeviceWorker::attach`] to get a live one.
    pub fn get_symbol(&self, name: &str, poll_rate: Option<Duration>) -> AdsResult<Arc<Symbol>> {
        let mut symbols = self.symbols.lock();
        self.lookup_or_create(&mut symbols, name, poll_rate)
    }

    /// Attach `sink` to the symbol for (`name`, `poll_rate`)
    ///
    /// Lookup and attach happen under the symbol table lock, so a
    /// concurrent release of the same key cannot hand back a torn down
    /// symbol.
    pub fn attach(
        &self,
        name: &str,
        poll_rate: Option<Duration>,
        sink: Arc<dyn Sink>,
    ) -> AdsResult<(Arc<Symbol>, SinkId)> {
        let (symbol, id, replay) = {
            let mut symbols = self.symbols.lock();
            let symbol = self.lookup_or_create(&mut symbols, name, poll_rate)?;
            let (id, replay) = symbol.attach_sink(Arc::clone(&sink))?;
            (symbol, id, replay)
        };
        symbol.replay(sink.as_ref(), replay);
        Ok((symbol, id))
    }

    fn lookup_or_create(
        &self,
        symbols: &mut HashMap<(String, Option<Duration>), Arc<Symbol>>,
        name: &str,
        poll_rate: Option<Duration>,
    ) -> AdsResult<Arc<Symbol>> {
        let key = (name.to_string(), poll_rate);
        if let Some(symbol) = symbols.get(&key).filter(|symbol| !symbol.is_released()) {
            return Ok(Arc::clone(symbol));
        }

        let identity = self.core.identity.clone();
        self.core.queue.submit(Command::new("open", move |transport| {
            if !transport.is_open() {
                transport.open()?;
                log::info!("Opened connection to {}", identity);
            }
            Ok(())
        }))?;

        let symbol = Arc::new(Symbol::new(Arc::clone(&self.core), name, poll_rate));
        symbols.insert(key, Arc::clone(&symbol));
        log::debug!(
            "Acquired symbol {:?} on {} ({})",
            name,
            self.core.identity,
            describe_rate(poll_rate)
        );
        Ok(symbol)
    }

    /// Detach `sink` from `symbol`
    ///
    /// When no sinks remain the symbol is torn down, and when it was the
    /// last symbol of the device the transport is closed. Both happen on
    /// the worker thread, after any command already queued.
    pub fn release_symbol(&self, symbol: &Arc<Symbol>, sink: SinkId) -> AdsResult<()> {
        let mut symbols = self.symbols.lock();
        if symbol.detach(sink) > 0 {
            return Ok(());
        }

        let key = symbol.key();
        if symbols
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, symbol))
        {
            symbols.remove(&key);
        }
        symbol.teardown()?;
        log::debug!(
            "Released symbol {:?} on {} ({})",
            symbol.name(),
            self.core.identity,
            describe_rate(symbol.poll_rate())
        );

        if symbols.is_empty() {
            let identity = self.core.identity.clone();
            self.core.queue.submit(Command::new("close", move |transport| {
                close_transport(transport, &identity)
            }))?;
        }
        Ok(())
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.lock().len()
    }

    /// Rates that currently have a poll group
    pub fn poll_rates(&self) -> Vec<Duration> {
        let mut rates: Vec<Duration> = self.core.poll_groups.lock().keys().copied().collect();
        rates.sort();
        rates
    }

    /// Queue an operation on the device transport
    ///
    /// Failures are logged by the worker thread.
    pub fn submit<F>(&self, label: impl Into<String>, operation: F) -> AdsResult<()>
    where
        F: FnOnce(&mut dyn Transport) -> anyhow::Result<()> + Send + 'static,
    {
        self.core.queue.submit(Command::new(label, operation))
    }

    /// Run an operation on the device transport and wait for its result
    ///
    /// Must not be called from a queued operation.
    pub fn call<T, F>(&self, label: impl Into<String>, operation: F) -> AdsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transport) -> AdsResult<T> + Send + 'static,
    {
        self.core.queue.call(label, operation)
    }

    /// Upload the device's symbol table, keyed by symbol name
    ///
    /// A transport opened only for the upload is closed again afterwards.
    pub fn enumerate_symbols(&self) -> AdsResult<BTreeMap<String, SymbolEntry>> {
        let identity = self.core.identity.clone();
        let entries = self.call("enumerate_symbols", move |transport| {
            let opened = !transport.is_open();
            if opened {
                transport.open()?;
            }
            let entries = transport.upload_symbols();
            if opened {
                if let Err(e) = close_transport(transport, &identity) {
                    log::warn!("Failed to close {} after upload: {:#}", identity, e);
                }
            }
            entries
        })?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect())
    }

    /// Stop polling, then stop the worker thread, which closes the transport
    pub fn stop(&self) {
        self.core.stop_polling();
        if self.core.queue.stop() {
            log::info!("Stopping device worker {}", self.core.identity);
        }

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Device worker {} thread panicked", self.core.identity);
        }
    }
}

impl Drop for DeviceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DeviceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceWorker")
            .field("identity", &self.core.identity)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn close_transport(transport: &mut dyn Transport, identity: &DeviceIdentity) -> anyhow::Result<()> {
    if transport.is_open() {
        transport.close()?;
        log::info!("Closed connection to {}", identity);
    }
    Ok(())
}

fn describe_rate(poll_rate: Option<Duration>) -> String {
    match poll_rate {
        Some(rate) => format!("poll @ {:.3} sec", rate.as_secs_f64()),
        None => "push".to_string(),
    }
}
