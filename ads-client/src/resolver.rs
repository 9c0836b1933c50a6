//! Symbol type resolution
//!
//! Maps the metadata a device reports for a symbol to the
//! [`TypeDescriptor`] used to decode its values. Lookup order:
//!
//! 1. numeric type id in the custom table
//! 2. type name in the custom table
//! 3. numeric type id in the built-in table
//! 4. type name in the built-in table

use crate::config::CustomTypes;
use ads_core::{AdsDataType, AdsError, AdsResult, PrimitiveKind, TypeDescriptor};
use ads_transport::{SymbolAccess, SymbolEntry, Transport};

/// Query a symbol's metadata and resolve its decoding shape
///
/// Performs exactly one metadata request; callers cache the result.
pub fn resolve_symbol_type(
    transport: &mut dyn Transport,
    symbol_name: &str,
    custom_types: &CustomTypes,
) -> AdsResult<TypeDescriptor> {
    let entry = transport.symbol_info(symbol_name)?;
    resolve_entry(&entry, custom_types)
}

/// Resolve the decoding shape of already fetched metadata
///
/// # Errors
///
/// Returns `UnsupportedType` when neither table knows the type.
pub fn resolve_entry(entry: &SymbolEntry, custom_types: &CustomTypes) -> AdsResult<TypeDescriptor> {
    let kind = custom_types
        .by_id(entry.data_type)
        .or_else(|| custom_types.by_name(&entry.type_name))
        .cloned()
        .or_else(|| entry.ads_data_type().and_then(AdsDataType::primitive_kind))
        .or_else(|| PrimitiveKind::from_type_name(&entry.type_name))
        .ok_or_else(|| AdsError::UnsupportedType {
            type_name: entry.type_name.clone(),
            type_id: entry.data_type,
            size: entry.size,
            comment: entry.comment.clone(),
        })?;

    let descriptor = TypeDescriptor::from_reported_size(kind, entry.size as usize);
    log::debug!(
        "Resolved {:?} ({}, id {}, {} bytes) as {}",
        entry.name,
        entry.type_name,
        entry.data_type,
        entry.size,
        descriptor
    );
    Ok(descriptor)
}
