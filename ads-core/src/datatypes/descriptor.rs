//! Resolved decoding shapes for device symbols

use crate::error::{AdsError, AdsResult};
use std::fmt;
use std::sync::Arc;

/// Decoding kind of a single element
///
/// Scalars have a fixed little-endian width. `String` is null-terminated and
/// sized by the symbol, `Struct` follows a registered fixed layout, and
/// `Opaque` elements are delivered as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Real32,
    Real64,
    /// Null-terminated string
    String,
    /// Fixed-layout composite
    Struct(Arc<StructLayout>),
    /// Raw bytes of the given width
    Opaque(usize),
}

impl PrimitiveKind {
    /// Width of one element in bytes
    ///
    /// For strings this is the width of one character; the string capacity is
    /// carried by the [`TypeDescriptor`].
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 | Self::String => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Real32 => 4,
            Self::Int64 | Self::UInt64 | Self::Real64 => 8,
            Self::Struct(layout) => layout.size(),
            Self::Opaque(width) => *width,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }

    /// Look up a kind by IEC 61131-3 type name
    ///
    /// Accepts sized strings such as `STRING(80)`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.starts_with("STRING(") && name.ends_with(')') {
            return Some(Self::String);
        }
        let kind = match name {
            "BOOL" | "BIT" => Self::Bool,
            "SINT" => Self::Int8,
            "USINT" | "BYTE" => Self::UInt8,
            "INT" => Self::Int16,
            "UINT" | "WORD" => Self::UInt16,
            "DINT" => Self::Int32,
            "UDINT" | "DWORD" => Self::UInt32,
            "LINT" => Self::Int64,
            "ULINT" | "LWORD" => Self::UInt64,
            "REAL" => Self::Real32,
            "LREAL" => Self::Real64,
            "STRING" => Self::String,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int8 => write!(f, "SINT"),
            Self::UInt8 => write!(f, "USINT"),
            Self::Int16 => write!(f, "INT"),
            Self::UInt16 => write!(f, "UINT"),
            Self::Int32 => write!(f, "DINT"),
            Self::UInt32 => write!(f, "UDINT"),
            Self::Int64 => write!(f, "LINT"),
            Self::UInt64 => write!(f, "ULINT"),
            Self::Real32 => write!(f, "REAL"),
            Self::Real64 => write!(f, "LREAL"),
            Self::String => write!(f, "STRING"),
            Self::Struct(layout) => write!(f, "{}", layout.name()),
            Self::Opaque(width) => write!(f, "BYTES({})", width),
        }
    }
}

/// Field of a [`StructLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    /// Byte offset from the start of the structure
    pub offset: usize,
    pub kind: PrimitiveKind,
}

impl StructField {
    pub fn new(name: &str, offset: usize, kind: PrimitiveKind) -> Self {
        Self {
            name: name.to_string(),
            offset,
            kind,
        }
    }
}

/// Fixed memory layout of a device structure type
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    name: String,
    size: usize,
    fields: Vec<StructField>,
}

impl StructLayout {
    /// Create a layout of `size` bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if a field is a string or nested structure, or
    /// does not fit inside `size`.
    pub fn new(name: &str, size: usize, fields: Vec<StructField>) -> AdsResult<Self> {
        for field in &fields {
            if matches!(field.kind, PrimitiveKind::String | PrimitiveKind::Struct(_)) {
                return Err(AdsError::InvalidData(format!(
                    "Field {}.{} must have a fixed-width scalar kind, got {}",
                    name, field.name, field.kind
                )));
            }
            let end = field.offset + field.kind.byte_width();
            if end > size {
                return Err(AdsError::InvalidData(format!(
                    "Field {}.{} ends at byte {} beyond structure size {}",
                    name, field.name, end, size
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            size,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the structure in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }
}

/// Resolved decoding shape of a symbol: element kind plus array length
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    kind: PrimitiveKind,
    array_length: usize,
    byte_size: usize,
}

impl TypeDescriptor {
    /// A single element of `kind`
    pub fn scalar(kind: PrimitiveKind) -> Self {
        let byte_size = kind.byte_width();
        Self {
            kind,
            array_length: 1,
            byte_size,
        }
    }

    /// A null-terminated string occupying `capacity` bytes on the device
    pub fn string(capacity: usize) -> Self {
        Self {
            kind: PrimitiveKind::String,
            array_length: 1,
            byte_size: capacity,
        }
    }

    /// `length` consecutive elements of `element`
    ///
    /// A length of zero or one yields a scalar descriptor.
    pub fn array(element: PrimitiveKind, length: usize) -> Self {
        let array_length = length.max(1);
        let byte_size = element.byte_width() * array_length;
        Self {
            kind: element,
            array_length,
            byte_size,
        }
    }

    /// Shape a kind by the byte size the device reported for the symbol
    ///
    /// Strings are never arrays. For other kinds the array length is the
    /// reported size divided by the element width; trailing padding that
    /// does not fill a whole element is dropped.
    pub fn from_reported_size(kind: PrimitiveKind, reported_size: usize) -> Self {
        if kind.is_string() {
            return Self::string(reported_size);
        }
        let width = kind.byte_width();
        let length = if width == 0 { 1 } else { reported_size / width };
        Self::array(kind, length)
    }

    /// Element kind
    pub fn kind(&self) -> &PrimitiveKind {
        &self.kind
    }

    pub fn array_length(&self) -> usize {
        self.array_length
    }

    pub fn is_array(&self) -> bool {
        self.array_length > 1
    }

    /// Number of bytes the symbol occupies on the device
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array() {
            write!(f, "ARRAY[0..{}] OF {}", self.array_length - 1, self.kind)
        } else if self.kind.is_string() {
            write!(f, "STRING({})", self.byte_size)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}
