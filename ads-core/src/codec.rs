//! Little-endian value codec
//!
//! Converts between raw symbol bytes and [`Value`]s according to a resolved
//! [`TypeDescriptor`]. Decoding never reads past the given slice and never
//! writes past a structure layout.

use crate::datatypes::{PrimitiveKind, StructLayout, TypeDescriptor, Value};
use crate::error::{AdsError, AdsResult};

/// Decode the raw bytes of a symbol
///
/// # Errors
///
/// Returns [`AdsError::Decode`] if `bytes` is shorter than a scalar or array
/// requires, or if a string is not valid UTF-8.
pub fn decode_value(bytes: &[u8], descriptor: &TypeDescriptor) -> AdsResult<Value> {
    let kind = descriptor.kind();
    if kind.is_string() {
        return decode_string(bytes);
    }
    if !descriptor.is_array() {
        return decode_element(bytes, kind);
    }

    let width = kind.byte_width();
    let needed = width * descriptor.array_length();
    if bytes.len() < needed {
        return Err(AdsError::Decode(format!(
            "{} needs {} bytes, got {}",
            descriptor,
            needed,
            bytes.len()
        )));
    }
    bytes[..needed]
        .chunks_exact(width.max(1))
        .map(|chunk| decode_element(chunk, kind))
        .collect::<AdsResult<Vec<_>>>()
        .map(Value::Array)
}

fn decode_element(bytes: &[u8], kind: &PrimitiveKind) -> AdsResult<Value> {
    let value = match kind {
        PrimitiveKind::Bool => Value::Bool(take::<1>(bytes)?[0] != 0),
        PrimitiveKind::Int8 => Value::Int8(i8::from_le_bytes(take(bytes)?)),
        PrimitiveKind::UInt8 => Value::UInt8(u8::from_le_bytes(take(bytes)?)),
        PrimitiveKind::Int16 => Value::Int16(i16::from_le_bytes(take(bytes)?)),
        PrimitiveKind::UInt16 => Value::UInt16(u16::from_le_bytes(take(bytes)?)),
        PrimitiveKind::Int32 => Value::Int32(i32::from_le_bytes(take(bytes)?)),
        PrimitiveKind::UInt32 => Value::UInt32(u32::from_le_bytes(take(bytes)?)),
        PrimitiveKind::Int64 => Value::Int64(i64::from_le_bytes(take(bytes)?)),
        PrimitiveKind::UInt64 => Value::UInt64(u64::from_le_bytes(take(bytes)?)),
        PrimitiveKind::Real32 => Value::Real32(f32::from_le_bytes(take(bytes)?)),
        PrimitiveKind::Real64 => Value::Real64(f64::from_le_bytes(take(bytes)?)),
        PrimitiveKind::String => decode_string(bytes)?,
        PrimitiveKind::Struct(layout) => decode_struct(bytes, layout)?,
        PrimitiveKind::Opaque(_) => Value::Bytes(bytes.to_vec()),
    };
    Ok(value)
}

/// Text up to, not including, the first null byte
fn decode_string(bytes: &[u8]) -> AdsResult<Value> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(|s| Value::String(s.to_string()))
        .map_err(|e| AdsError::Decode(format!("Invalid UTF-8 in string: {}", e)))
}

fn decode_struct(bytes: &[u8], layout: &StructLayout) -> AdsResult<Value> {
    let mut buffer = vec![0u8; layout.size()];
    let fit = bytes.len().min(buffer.len());
    buffer[..fit].copy_from_slice(&bytes[..fit]);

    let mut fields = Vec::with_capacity(layout.fields().len());
    for field in layout.fields() {
        let end = field.offset + field.kind.byte_width();
        let slice = buffer.get(field.offset..end).ok_or_else(|| {
            AdsError::Decode(format!(
                "Field {}.{} outside of layout",
                layout.name(),
                field.name
            ))
        })?;
        fields.push((field.name.clone(), decode_element(slice, &field.kind)?));
    }
    Ok(Value::Struct(fields))
}

fn take<const N: usize>(bytes: &[u8]) -> AdsResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| AdsError::Decode(format!("Expected {} bytes, got {}", N, bytes.len())))
}

/// Encode a value into the raw bytes of a symbol
///
/// Integer values are range-checked against the target width, and any
/// numeric value can be written to a floating point symbol. Strings are
/// null-terminated and padded to the symbol size.
///
/// # Errors
///
/// Returns [`AdsError::InvalidData`] when the value does not fit the
/// descriptor.
pub fn encode_value(value: &Value, descriptor: &TypeDescriptor) -> AdsResult<Vec<u8>> {
    let kind = descriptor.kind();
    if kind.is_string() {
        return encode_string(value, descriptor.byte_size());
    }
    if !descriptor.is_array() {
        let mut out = Vec::with_capacity(descriptor.byte_size());
        encode_element(value, kind, &mut out)?;
        return Ok(out);
    }

    let items = match value {
        Value::Array(items) if items.len() == descriptor.array_length() => items,
        other => {
            return Err(AdsError::InvalidData(format!(
                "Cannot write {} to {}",
                other, descriptor
            )));
        }
    };
    let mut out = Vec::with_capacity(descriptor.byte_size());
    for item in items {
        encode_element(item, kind, &mut out)?;
    }
    Ok(out)
}

fn encode_string(value: &Value, capacity: usize) -> AdsResult<Vec<u8>> {
    let text = value.as_str().ok_or_else(|| {
        AdsError::InvalidData(format!("Cannot write {} to a STRING symbol", value))
    })?;
    if capacity > 0 && text.len() + 1 > capacity {
        return Err(AdsError::InvalidData(format!(
            "String of {} bytes does not fit STRING({})",
            text.len(),
            capacity
        )));
    }
    let mut out = text.as_bytes().to_vec();
    out.resize(capacity.max(text.len() + 1), 0);
    Ok(out)
}

macro_rules! encode_int {
    ($value:expr, $ty:ty, $out:expr) => {{
        let raw = $value.as_i128().ok_or_else(|| {
            AdsError::InvalidData(format!("Expected an integer, got {}", $value))
        })?;
        let v = <$ty>::try_from(raw).map_err(|_| {
            AdsError::InvalidData(format!("{} out of range for {}", raw, stringify!($ty)))
        })?;
        $out.extend_from_slice(&v.to_le_bytes());
    }};
}

fn encode_element(value: &Value, kind: &PrimitiveKind, out: &mut Vec<u8>) -> AdsResult<()> {
    match kind {
        PrimitiveKind::Bool => {
            let raw = value.as_i128().ok_or_else(|| {
                AdsError::InvalidData(format!("Expected a boolean, got {}", value))
            })?;
            out.push((raw != 0) as u8);
        }
        PrimitiveKind::Int8 => encode_int!(value, i8, out),
        PrimitiveKind::UInt8 => encode_int!(value, u8, out),
        PrimitiveKind::Int16 => encode_int!(value, i16, out),
        PrimitiveKind::UInt16 => encode_int!(value, u16, out),
        PrimitiveKind::Int32 => encode_int!(value, i32, out),
        PrimitiveKind::UInt32 => encode_int!(value, u32, out),
        PrimitiveKind::Int64 => encode_int!(value, i64, out),
        PrimitiveKind::UInt64 => encode_int!(value, u64, out),
        PrimitiveKind::Real32 => {
            let v = value.as_f64().ok_or_else(|| {
                AdsError::InvalidData(format!("Expected a number, got {}", value))
            })?;
            out.extend_from_slice(&(v as f32).to_le_bytes());
        }
        PrimitiveKind::Real64 => {
            let v = value.as_f64().ok_or_else(|| {
                AdsError::InvalidData(format!("Expected a number, got {}", value))
            })?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveKind::String => {
            return Err(AdsError::InvalidData(
                "Strings can only be written as a whole symbol".to_string(),
            ));
        }
        PrimitiveKind::Struct(layout) => out.extend_from_slice(&encode_struct(value, layout)?),
        PrimitiveKind::Opaque(width) => match value {
            Value::Bytes(bytes) if bytes.len() <= *width => {
                out.extend_from_slice(bytes);
                out.resize(out.len() + width - bytes.len(), 0);
            }
            other => {
                return Err(AdsError::InvalidData(format!(
                    "Cannot write {} to BYTES({})",
                    other, width
                )));
            }
        },
    }
    Ok(())
}

/// Fields missing from `value` are written as zero
fn encode_struct(value: &Value, layout: &StructLayout) -> AdsResult<Vec<u8>> {
    let mut buffer = vec![0u8; layout.size()];
    match value {
        Value::Struct(_) => {
            for field in layout.fields() {
                if let Some(field_value) = value.field(&field.name) {
                    let mut encoded = Vec::with_capacity(field.kind.byte_width());
                    encode_element(field_value, &field.kind, &mut encoded)?;
                    buffer[field.offset..field.offset + encoded.len()].copy_from_slice(&encoded);
                }
            }
        }
        Value::Bytes(bytes) => {
            let fit = bytes.len().min(buffer.len());
            buffer[..fit].copy_from_slice(&bytes[..fit]);
        }
        other => {
            return Err(AdsError::InvalidData(format!(
                "Cannot write {} to {}",
                other,
                layout.name()
            )));
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::StructField;
    use std::sync::Arc;

    #[test]
    fn test_primitive_round_trip() {
        let cases = vec![
            (PrimitiveKind::Bool, Value::Bool(true)),
            (PrimitiveKind::Bool, Value::Bool(false)),
            (PrimitiveKind::Int8, Value::Int8(-128)),
            (PrimitiveKind::UInt8, Value::UInt8(255)),
            (PrimitiveKind::Int16, Value::Int16(-12345)),
            (PrimitiveKind::UInt16, Value::UInt16(54321)),
            (PrimitiveKind::Int32, Value::Int32(i32::MIN)),
            (PrimitiveKind::UInt32, Value::UInt32(0xdead_beef)),
            (PrimitiveKind::Int64, Value::Int64(-9_000_000_000)),
            (PrimitiveKind::UInt64, Value::UInt64(u64::MAX)),
            (PrimitiveKind::Real32, Value::Real32(3.25)),
            (PrimitiveKind::Real64, Value::Real64(-1.0e-300)),
        ];
        for (kind, value) in cases {
            let descriptor = TypeDescriptor::scalar(kind);
            let bytes = encode_value(&value, &descriptor).unwrap();
            assert_eq!(bytes.len(), descriptor.byte_size());
            assert_eq!(decode_value(&bytes, &descriptor).unwrap(), value);
        }
    }

    #[test]
    fn test_scalars_are_little_endian() {
        let descriptor = TypeDescriptor::scalar(PrimitiveKind::UInt32);
        assert_eq!(
            decode_value(&[0x78, 0x56, 0x34, 0x12], &descriptor).unwrap(),
            Value::UInt32(0x1234_5678)
        );
    }

    #[test]
    fn test_string_stops_at_first_null() {
        let descriptor = TypeDescriptor::string(16);
        let mut bytes = b"hello".to_vec();
        bytes.push(0);
        bytes.extend_from_slice(&[0xff, b'x', 0, 0xfe]);
        assert_eq!(
            decode_value(&bytes, &descriptor).unwrap(),
            Value::String("hello".to_string())
        );
        assert_eq!(
            decode_value(b"no-null", &descriptor).unwrap(),
            Value::String("no-null".to_string())
        );
    }

    #[test]
    fn test_string_encoding_is_padded_and_bounded() {
        let descriptor = TypeDescriptor::string(8);
        assert_eq!(
            encode_value(&Value::from("abc"), &descriptor).unwrap(),
            b"abc\0\0\0\0\0".to_vec()
        );
        assert!(encode_value(&Value::from("too long!"), &descriptor).is_err());
    }

    #[test]
    fn test_array_decodes_elements() {
        let descriptor = TypeDescriptor::array(PrimitiveKind::Int16, 3);
        let bytes = [1, 0, 0xff, 0xff, 2, 0, 0xaa];
        assert_eq!(
            decode_value(&bytes, &descriptor).unwrap(),
            Value::Array(vec![Value::Int16(1), Value::Int16(-1), Value::Int16(2)])
        );
        assert!(matches!(
            decode_value(&bytes[..5], &descriptor),
            Err(AdsError::Decode(_))
        ));
    }

    #[test]
    fn test_struct_copy_is_bounded() {
        let layout = Arc::new(
            StructLayout::new(
                "ST_Pair",
                6,
                vec![
                    StructField::new("a", 0, PrimitiveKind::UInt32),
                    StructField::new("b", 4, PrimitiveKind::Int16),
                ],
            )
            .unwrap(),
        );
        let descriptor = TypeDescriptor::scalar(PrimitiveKind::Struct(layout));

        // More bytes than the layout holds
        let value = decode_value(&[1, 0, 0, 0, 0xfe, 0xff, 9, 9, 9], &descriptor).unwrap();
        assert_eq!(value.field("a"), Some(&Value::UInt32(1)));
        assert_eq!(value.field("b"), Some(&Value::Int16(-2)));

        // Fewer bytes: the rest stays zero
        let value = decode_value(&[7, 0], &descriptor).unwrap();
        assert_eq!(value.field("a"), Some(&Value::UInt32(7)));
        assert_eq!(value.field("b"), Some(&Value::Int16(0)));

        let bytes = encode_value(
            &Value::Struct(vec![("b".to_string(), Value::Int16(3))]),
            &descriptor,
        )
        .unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 3, 0]);
    }

    #[test]
    fn test_opaque_bytes_pass_through() {
        let descriptor = TypeDescriptor::scalar(PrimitiveKind::Opaque(3));
        assert_eq!(
            decode_value(&[1, 2, 3], &descriptor).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_short_scalar_is_decode_error() {
        let descriptor = TypeDescriptor::scalar(PrimitiveKind::Real64);
        assert!(matches!(
            decode_value(&[0; 4], &descriptor),
            Err(AdsError::Decode(_))
        ));
    }

    #[test]
    fn test_integer_encoding_checks_range() {
        let descriptor = TypeDescriptor::scalar(PrimitiveKind::UInt8);
        assert_eq!(encode_value(&Value::Int32(200), &descriptor).unwrap(), vec![200]);
        assert!(encode_value(&Value::Int32(-1), &descriptor).is_err());
        assert!(encode_value(&Value::Real64(1.0), &descriptor).is_err());

        let real = TypeDescriptor::scalar(PrimitiveKind::Real64);
        assert_eq!(
            encode_value(&Value::Int16(2), &real).unwrap(),
            2.0f64.to_le_bytes().to_vec()
        );
    }
}
