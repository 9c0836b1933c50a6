//! Per-device command queue
//!
//! Every transport call for a device is wrapped in a [`Command`] and executed
//! on that device's worker thread, one at a time, in submission order.

use ads_core::{AdsError, AdsResult, DeviceIdentity};
use ads_transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Operation = Box<dyn FnOnce(&mut dyn Transport) -> anyhow::Result<()> + Send>;

/// Deferred operation on a device transport
pub(crate) struct Command {
    /// Operation name and arguments, for failure logs
    label: String,
    operation: Operation,
}

impl Command {
    pub(crate) fn new<F>(label: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce(&mut dyn Transport) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            label: label.into(),
            operation: Box::new(operation),
        }
    }

    fn noop() -> Self {
        Self::new("noop", |_| Ok(()))
    }
}

/// Submitting side of a device's command queue
#[derive(Clone)]
pub(crate) struct CommandQueue {
    sender: Sender<Command>,
    running: Arc<AtomicBool>,
    call_timeout: Option<Duration>,
}

impl CommandQueue {
    /// Start the worker thread for `identity`
    ///
    /// The thread owns `transport` and closes it when the queue stops.
    pub(crate) fn spawn(
        identity: DeviceIdentity,
        transport: Box<dyn Transport>,
        thread_name_prefix: &str,
        call_timeout: Option<Duration>,
    ) -> AdsResult<(Self, JoinHandle<()>)> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let handle = thread::Builder::new()
            .name(format!("{}-{}", thread_name_prefix, identity))
            .spawn({
                let running = Arc::clone(&running);
                move || run_worker(identity, transport, receiver, running)
            })?;

        Ok((
            Self {
                sender,
                running,
                call_timeout,
            },
            handle,
        ))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append a command to the queue
    ///
    /// # Errors
    ///
    /// Returns `WorkerStopped` once the queue has been stopped.
    pub(crate) fn submit(&self, command: Command) -> AdsResult<()> {
        if !self.is_running() {
            return Err(AdsError::WorkerStopped);
        }
        self.sender
            .send(command)
            .map_err(|_| AdsError::WorkerStopped)
    }

    /// Run `operation` on the worker thread and wait for its result
    ///
    /// Must not be called from the worker thread itself.
    pub(crate) fn call<T, F>(&self, label: impl Into<String>, operation: F) -> AdsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transport) -> AdsResult<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.submit(Command::new(label, move |transport| {
            // The caller may have timed out and gone away
            let _ = reply_tx.send(operation(transport));
            Ok(())
        }))?;

        match self.call_timeout {
            Some(timeout) => reply_rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => AdsError::Timeout,
                RecvTimeoutError::Disconnected => AdsError::WorkerStopped,
            })?,
            None => reply_rx.recv().map_err(|_| AdsError::WorkerStopped)?,
        }
    }

    /// Clear the running flag and wake the worker with a no-op
    ///
    /// Returns false if the queue was already stopped.
    pub(crate) fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            return false;
        }
        let _ = self.sender.send(Command::noop());
        true
    }
}

fn run_worker(
    identity: DeviceIdentity,
    mut transport: Box<dyn Transport>,
    receiver: Receiver<Command>,
    running: Arc<AtomicBool>,
) {
    log::info!("Device worker {} started", identity);

    while running.load(Ordering::Acquire) {
        let Ok(Command { label, operation }) = receiver.recv() else {
            break;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| operation(transport.as_mut()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Device worker {} failure in {}: {:#}", identity, label, e),
            Err(payload) => log::error!(
                "Device worker {} failure in {}: panicked: {}",
                identity,
                label,
                panic_message(payload.as_ref())
            ),
        }
    }

    if transport.is_open() {
        match transport.close() {
            Ok(()) => log::info!("Closed connection to {}", identity),
            Err(e) => log::warn!("Failed to close connection to {}: {}", identity, e),
        }
    }
    log::info!("Device worker {} stopped", identity);
}

/// Best-effort text of a caught panic
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
