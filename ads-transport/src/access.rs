//! Symbol-level access built on raw index-group requests

use crate::constants::{
    ADSIGRP_SYM_HNDBYNAME, ADSIGRP_SYM_INFOBYNAMEEX, ADSIGRP_SYM_RELEASEHND, ADSIGRP_SYM_UPLOAD,
    ADSIGRP_SYM_UPLOADINFO, ADSIGRP_SYM_VALBYHND, SYMBOL_INFO_READ_LENGTH,
    SYMBOL_UPLOAD_INFO_LENGTH,
};
use crate::symbol_entry::{SymbolEntry, SymbolUploadInfo, parse_symbol_table};
use crate::transport::Transport;
use ads_core::{AdsError, AdsResult};
use bytes::Bytes;

/// Symbol access helpers available on every [`Transport`]
pub trait SymbolAccess {
    /// Query the metadata of a symbol in one request
    fn symbol_info(&mut self, name: &str) -> AdsResult<SymbolEntry>;

    /// Acquire a device handle for a symbol
    fn acquire_handle(&mut self, name: &str) -> AdsResult<u32>;

    /// Release a handle from [`SymbolAccess::acquire_handle`]
    fn release_handle(&mut self, handle: u32) -> AdsResult<()>;

    /// Read `length` bytes of a symbol's value
    ///
    /// The symbol handle is released even when the read fails.
    fn read_by_name(&mut self, name: &str, length: usize) -> AdsResult<Bytes>;

    /// Write the raw value of a symbol
    fn write_by_name(&mut self, name: &str, data: &[u8]) -> AdsResult<()>;

    /// Upload the device's complete symbol table
    fn upload_symbols(&mut self) -> AdsResult<Vec<SymbolEntry>>;
}

impl<T: Transport + ?Sized> SymbolAccess for T {
    fn symbol_info(&mut self, name: &str) -> AdsResult<SymbolEntry> {
        let response = self.read_write(
            ADSIGRP_SYM_INFOBYNAMEEX,
            0,
            SYMBOL_INFO_READ_LENGTH,
            &null_terminated(name),
        )?;
        SymbolEntry::parse(&response)
    }

    fn acquire_handle(&mut self, name: &str) -> AdsResult<u32> {
        let response = self.read_write(ADSIGRP_SYM_HNDBYNAME, 0, 4, &null_terminated(name))?;
        let bytes: [u8; 4] = response.get(..4).and_then(|b| b.try_into().ok()).ok_or_else(|| {
            AdsError::InvalidData(format!(
                "Handle response for {:?} has {} bytes",
                name,
                response.len()
            ))
        })?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn release_handle(&mut self, handle: u32) -> AdsResult<()> {
        self.write(ADSIGRP_SYM_RELEASEHND, 0, &handle.to_le_bytes())
    }

    fn read_by_name(&mut self, name: &str, length: usize) -> AdsResult<Bytes> {
        let handle = self.acquire_handle(name)?;
        let result = self.read(ADSIGRP_SYM_VALBYHND, handle, length);
        if let Err(e) = self.release_handle(handle) {
            log::warn!("Failed to release handle {} of {:?}: {}", handle, name, e);
        }
        result
    }

    fn write_by_name(&mut self, name: &str, data: &[u8]) -> AdsResult<()> {
        let handle = self.acquire_handle(name)?;
        let result = self.write(ADSIGRP_SYM_VALBYHND, handle, data);
        if let Err(e) = self.release_handle(handle) {
            log::warn!("Failed to release handle {} of {:?}: {}", handle, name, e);
        }
        result
    }

    fn upload_symbols(&mut self) -> AdsResult<Vec<SymbolEntry>> {
        let info = self.read(ADSIGRP_SYM_UPLOADINFO, 0, SYMBOL_UPLOAD_INFO_LENGTH)?;
        let info = SymbolUploadInfo::parse(&info)?;
        let table = self.read(ADSIGRP_SYM_UPLOAD, 0, info.symbol_size as usize)?;
        parse_symbol_table(&table)
    }
}

fn null_terminated(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    bytes
}
