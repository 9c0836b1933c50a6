//! Core types and utilities for the ADS symbol bridge
//!
//! This crate provides the error taxonomy, connection-string parsing, the
//! device data-type table and the little-endian value codec used throughout
//! the workspace.

pub mod address;
pub mod codec;
pub mod datatypes;
pub mod error;
pub mod filetime;

pub use address::{DeviceIdentity, TargetAddress, parse_address};
pub use codec::{decode_value, encode_value};
pub use datatypes::*;
pub use error::{AdsError, AdsResult};
pub use filetime::{datetime_to_filetime, filetime_to_datetime};
