//! In-memory device used by the worker tests

use crate::sink::ChannelPayload;
use ads_core::{AdsError, AdsResult, DeviceIdentity};
use ads_transport::constants::{
    ADSIGRP_SYM_HNDBYNAME, ADSIGRP_SYM_INFOBYNAMEEX, ADSIGRP_SYM_RELEASEHND, ADSIGRP_SYM_UPLOAD,
    ADSIGRP_SYM_UPLOADINFO, ADSIGRP_SYM_VALBYHND, NOTIFICATION_DATA_OFFSET,
};
use ads_transport::{
    Notification, NotificationAttrib, NotificationCallback, NotificationHandle, SymbolEntry,
    Transport,
};
use bytes::Bytes;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Symbol not found
pub const ERR_SYMBOL_NOT_FOUND: u32 = 0x710;

pub const TEST_TIMESTAMP: u64 = 132_539_328_001_234_567;

pub struct Subscription {
    pub symbol: String,
    pub attrib: NotificationAttrib,
    callback: NotificationCallback,
}

#[derive(Default)]
pub struct FakeState {
    pub open: bool,
    pub open_calls: usize,
    pub close_calls: usize,
    pub info_requests: usize,
    pub value_reads: usize,
    pub symbols: HashMap<String, (SymbolEntry, Vec<u8>)>,
    pub subscriptions: HashMap<u32, Subscription>,
    pub removed_notifications: Vec<u32>,
    pub failing_reads: HashSet<String>,
    pub writes: Vec<(String, Vec<u8>)>,
    handles: HashMap<u32, String>,
    next_handle: u32,
}

/// Shared state behind every transport created for one fake device
#[derive(Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(self, name: &str, type_name: &str, data_type: u32, value: &[u8]) -> Self {
        let entry = SymbolEntry::new(name, type_name, "", data_type, value.len() as u32);
        self.state
            .lock()
            .symbols
            .insert(name.to_string(), (entry, value.to_vec()));
        self
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            state: Arc::clone(&self.state),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    pub fn set_value(&self, name: &str, value: &[u8]) {
        if let Some((_, stored)) = self.state.lock().symbols.get_mut(name) {
            *stored = value.to_vec();
        }
    }

    pub fn fail_reads_of(&self, name: &str) {
        self.state.lock().failing_reads.insert(name.to_string());
    }

    pub fn subscription_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.symbol == name)
            .count()
    }

    /// Fire a notification for every subscription of `name`
    ///
    /// The sample is wrapped in a padded envelope like a real device frame.
    pub fn notify(&self, name: &str, sample: &[u8]) -> usize {
        let callbacks: Vec<(u32, NotificationCallback)> = self
            .state
            .lock()
            .subscriptions
            .iter()
            .filter(|(_, s)| s.symbol == name)
            .map(|(handle, s)| (*handle, Arc::clone(&s.callback)))
            .collect();

        for (handle, callback) in &callbacks {
            let mut buffer = vec![0u8; NOTIFICATION_DATA_OFFSET];
            buffer.extend_from_slice(sample);
            buffer.extend_from_slice(&[0xee; 4]);
            let notification = Notification::new(
                NotificationHandle(*handle),
                TEST_TIMESTAMP,
                sample.len() as u32,
                Bytes::from(buffer),
                NOTIFICATION_DATA_OFFSET,
            );
            callback(&notification);
        }
        callbacks.len()
    }
}

struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

fn name_of(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn not_open() -> AdsError {
    AdsError::Transport("connection not open".into())
}

impl Transport for FakeTransport {
    fn open(&mut self) -> AdsResult<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.open_calls += 1;
        Ok(())
    }

    fn close(&mut self) -> AdsResult<()> {
        let mut state = self.state.lock();
        state.open = false;
        state.close_calls += 1;
        state.subscriptions.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn read(&mut self, index_group: u32, index_offset: u32, length: usize) -> AdsResult<Bytes> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(not_open());
        }
        match index_group {
            ADSIGRP_SYM_VALBYHND => {
                let name = state
                    .handles
                    .get(&index_offset)
                    .cloned()
                    .ok_or(AdsError::Device(ERR_SYMBOL_NOT_FOUND))?;
                if state.failing_reads.contains(&name) {
                    return Err(AdsError::Device(ERR_SYMBOL_NOT_FOUND));
                }
                state.value_reads += 1;
                let (_, value) = &state.symbols[&name];
                Ok(Bytes::copy_from_slice(&value[..length.min(value.len())]))
            }
            ADSIGRP_SYM_UPLOADINFO => {
                let size: usize = state.symbols.values().map(|(e, _)| e.to_bytes().len()).sum();
                let mut info = (state.symbols.len() as u32).to_le_bytes().to_vec();
                info.extend((size as u32).to_le_bytes());
                Ok(Bytes::from(info))
            }
            ADSIGRP_SYM_UPLOAD => {
                let mut names: Vec<&String> = state.symbols.keys().collect();
                names.sort();
                let mut table = Vec::new();
                for name in names {
                    table.extend(state.symbols[name].0.to_bytes());
                }
                Ok(Bytes::from(table))
            }
            _ => Err(AdsError::Device(0x702)),
        }
    }

    fn write(&mut self, index_group: u32, index_offset: u32, data: &[u8]) -> AdsResult<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(not_open());
        }
        match index_group {
            ADSIGRP_SYM_RELEASEHND => {
                let handle = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                state.handles.remove(&handle);
                Ok(())
            }
            ADSIGRP_SYM_VALBYHND => {
                let name = state
                    .handles
                    .get(&index_offset)
                    .cloned()
                    .ok_or(AdsError::Device(ERR_SYMBOL_NOT_FOUND))?;
                if let Some((_, value)) = state.symbols.get_mut(&name) {
                    *value = data.to_vec();
                }
                state.writes.push((name, data.to_vec()));
                Ok(())
            }
            _ => Err(AdsError::Device(0x702)),
        }
    }

    fn read_write(
        &mut self,
        index_group: u32,
        _index_offset: u32,
        _read_length: usize,
        data: &[u8],
    ) -> AdsResult<Bytes> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(not_open());
        }
        let name = name_of(data);
        let record = state
            .symbols
            .get(&name)
            .map(|(entry, _)| entry.to_bytes())
            .ok_or(AdsError::Device(ERR_SYMBOL_NOT_FOUND))?;
        match index_group {
            ADSIGRP_SYM_INFOBYNAMEEX => {
                state.info_requests += 1;
                Ok(Bytes::from(record))
            }
            ADSIGRP_SYM_HNDBYNAME => {
                state.next_handle += 1;
                let handle = state.next_handle;
                state.handles.insert(handle, name);
                Ok(Bytes::copy_from_slice(&handle.to_le_bytes()))
            }
            _ => Err(AdsError::Device(0x702)),
        }
    }

    fn add_notification(
        &mut self,
        symbol_name: &str,
        attrib: NotificationAttrib,
        callback: NotificationCallback,
    ) -> AdsResult<NotificationHandle> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(not_open());
        }
        if !state.symbols.contains_key(symbol_name) {
            return Err(AdsError::Device(ERR_SYMBOL_NOT_FOUND));
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.subscriptions.insert(
            handle,
            Subscription {
                symbol: symbol_name.to_string(),
                attrib,
                callback,
            },
        );
        Ok(NotificationHandle(handle))
    }

    fn remove_notification(&mut self, handle: NotificationHandle) -> AdsResult<()> {
        let mut state = self.state.lock();
        state.removed_notifications.push(handle.0);
        state
            .subscriptions
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(AdsError::Device(0x714))
    }
}

pub fn test_identity() -> DeviceIdentity {
    DeviceIdentity::new("10.0.0.5", "10.0.0.5.1.1", 851)
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn recv(rx: &Receiver<ChannelPayload>) -> ChannelPayload {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("no payload delivered")
}
