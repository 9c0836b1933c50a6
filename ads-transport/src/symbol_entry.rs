//! Symbol metadata records
//!
//! A symbol entry is a little-endian header followed by the symbol name,
//! type name and comment, each null-terminated:
//!
//! ```text
//! entry_length u32 | index_group u32 | index_offset u32 | size u32 |
//! data_type u32 | flags u32 | name_len u16 | type_len u16 | comment_len u16 |
//! name\0 | type\0 | comment\0
//! ```

use crate::constants::{SYMBOL_ENTRY_HEADER_SIZE, SYMBOL_UPLOAD_INFO_LENGTH};
use ads_core::{AdsDataType, AdsError, AdsResult};

/// Metadata of one device symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Length of the whole record in bytes
    pub entry_length: u32,
    pub index_group: u32,
    pub index_offset: u32,
    /// Size of the symbol value in bytes
    pub size: u32,
    /// Numeric data type identifier
    pub data_type: u32,
    pub flags: u32,
    pub name: String,
    pub type_name: String,
    pub comment: String,
}

impl SymbolEntry {
    /// Create an entry with a computed record length
    pub fn new(name: &str, type_name: &str, comment: &str, data_type: u32, size: u32) -> Self {
        let entry_length =
            SYMBOL_ENTRY_HEADER_SIZE + name.len() + type_name.len() + comment.len() + 3;
        Self {
            entry_length: entry_length as u32,
            index_group: 0,
            index_offset: 0,
            size,
            data_type,
            flags: 0,
            name: name.to_string(),
            type_name: type_name.to_string(),
            comment: comment.to_string(),
        }
    }

    /// Parse a symbol entry record
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the record is shorter than its header or the
    /// string lengths it declares.
    pub fn parse(bytes: &[u8]) -> AdsResult<Self> {
        if bytes.len() < SYMBOL_ENTRY_HEADER_SIZE {
            return Err(AdsError::InvalidData(format!(
                "Symbol entry of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize;

        let name_len = u16_at(24);
        let type_len = u16_at(26);
        let comment_len = u16_at(28);

        let mut offset = SYMBOL_ENTRY_HEADER_SIZE;
        let name = read_string(bytes, &mut offset, name_len)?;
        let type_name = read_string(bytes, &mut offset, type_len)?;
        let comment = read_string(bytes, &mut offset, comment_len)?;

        Ok(Self {
            entry_length: u32_at(0),
            index_group: u32_at(4),
            index_offset: u32_at(8),
            size: u32_at(12),
            data_type: u32_at(16),
            flags: u32_at(20),
            name,
            type_name,
            comment,
        })
    }

    /// Encode the entry as a record
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entry_length as usize);
        for field in [
            self.entry_length,
            self.index_group,
            self.index_offset,
            self.size,
            self.data_type,
            self.flags,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        for text in [&self.name, &self.type_name, &self.comment] {
            out.extend_from_slice(&(text.len() as u16).to_le_bytes());
        }
        for text in [&self.name, &self.type_name, &self.comment] {
            out.extend_from_slice(text.as_bytes());
            out.push(0);
        }
        if out.len() < self.entry_length as usize {
            out.resize(self.entry_length as usize, 0);
        }
        out
    }

    /// Known data type of this symbol, if any
    pub fn ads_data_type(&self) -> Option<AdsDataType> {
        AdsDataType::from_u32(self.data_type)
    }
}

fn read_string(bytes: &[u8], offset: &mut usize, len: usize) -> AdsResult<String> {
    let end = *offset + len;
    let raw = bytes.get(*offset..end).ok_or_else(|| {
        AdsError::InvalidData(format!(
            "Symbol entry string at {}..{} exceeds record of {} bytes",
            offset,
            end,
            bytes.len()
        ))
    })?;
    // Skip the terminator
    *offset = end + 1;
    Ok(String::from_utf8_lossy(raw).into_owned())
}

/// Size of the device's symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolUploadInfo {
    pub symbol_count: u32,
    /// Bytes needed to upload every symbol entry
    pub symbol_size: u32,
}

impl SymbolUploadInfo {
    pub fn parse(bytes: &[u8]) -> AdsResult<Self> {
        if bytes.len() < SYMBOL_UPLOAD_INFO_LENGTH {
            return Err(AdsError::InvalidData(format!(
                "Symbol upload info of {} bytes, expected {}",
                bytes.len(),
                SYMBOL_UPLOAD_INFO_LENGTH
            )));
        }
        Ok(Self {
            symbol_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            symbol_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// Walk an uploaded symbol table
///
/// Stops at a zero-length entry or when fewer bytes than a header remain.
pub fn parse_symbol_table(bytes: &[u8]) -> AdsResult<Vec<SymbolEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while bytes.len() - offset >= SYMBOL_ENTRY_HEADER_SIZE {
        let rest = &bytes[offset..];
        let entry_length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        if entry_length == 0 {
            break;
        }
        let record = &rest[..entry_length.min(rest.len())];
        entries.push(SymbolEntry::parse(record)?);
        offset += entry_length.min(rest.len());
    }
    Ok(entries)
}
