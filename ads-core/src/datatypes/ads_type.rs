//! Device-reported data type identifiers

use crate::datatypes::descriptor::PrimitiveKind;

/// Numeric data type identifiers reported in symbol metadata (`ADST_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AdsDataType {
    Void = 0,
    Int8 = 16,
    UInt8 = 17,
    Int16 = 2,
    UInt16 = 18,
    Int32 = 3,
    UInt32 = 19,
    Int64 = 20,
    UInt64 = 21,
    Real32 = 4,
    Real64 = 5,
    BigType = 65,
    String = 30,
    WString = 31,
    Real80 = 32,
    Bit = 33,
    MaxTypes = 34,
}

impl AdsDataType {
    /// Look up a data type by its numeric identifier
    pub fn from_u32(value: u32) -> Option<Self> {
        let data_type = match value {
            0 => Self::Void,
            16 => Self::Int8,
            17 => Self::UInt8,
            2 => Self::Int16,
            18 => Self::UInt16,
            3 => Self::Int32,
            19 => Self::UInt32,
            20 => Self::Int64,
            21 => Self::UInt64,
            4 => Self::Real32,
            5 => Self::Real64,
            65 => Self::BigType,
            30 => Self::String,
            31 => Self::WString,
            32 => Self::Real80,
            33 => Self::Bit,
            34 => Self::MaxTypes,
            _ => return None,
        };
        Some(data_type)
    }

    /// Numeric identifier as reported by the device
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Built-in decoding kind for this data type
    ///
    /// Void, big types, wide strings and 80-bit floats have no mapping.
    pub fn primitive_kind(self) -> Option<PrimitiveKind> {
        let kind = match self {
            Self::Int8 => PrimitiveKind::Int8,
            Self::UInt8 => PrimitiveKind::UInt8,
            Self::Int16 => PrimitiveKind::Int16,
            Self::UInt16 => PrimitiveKind::UInt16,
            Self::Int32 => PrimitiveKind::Int32,
            Self::UInt32 => PrimitiveKind::UInt32,
            Self::Int64 => PrimitiveKind::Int64,
            Self::UInt64 => PrimitiveKind::UInt64,
            Self::Real32 => PrimitiveKind::Real32,
            Self::Real64 => PrimitiveKind::Real64,
            Self::String => PrimitiveKind::String,
            Self::Bit => PrimitiveKind::Bool,
            Self::Void | Self::BigType | Self::WString | Self::Real80 | Self::MaxTypes => {
                return None;
            }
        };
        Some(kind)
    }
}
