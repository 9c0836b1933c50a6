//! Data types used by the ADS symbol bridge

pub mod ads_type;
pub mod descriptor;
pub mod value;

// Re-export types
pub use ads_type::AdsDataType;
pub use descriptor::{PrimitiveKind, StructField, StructLayout, TypeDescriptor};
pub use value::Value;
