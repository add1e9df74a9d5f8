//! Typed value model and block element codec.
//!
//! Typed blocks hold a run of column values in a tagged little-endian
//! encoding: one tag byte per element, followed by the payload for that
//! element's type. The decoder is driven by the block footer's recorded
//! element count; element-count disagreement indicates a writer bug and is
//! checked with a debug assertion, while truncated input is reported as
//! corruption.

use crate::error::{BlockError, BlockResult};

/// A single typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Undefined,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Byte string.
    String(Vec<u8>),
}

/// Element tag bytes in the typed block encoding.
const TAG_UNDEFINED: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;

impl Value {
    /// Returns the content-type tag used in index files for this value's
    /// type, or the empty string for [`Value::Undefined`].
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Value::Undefined => "",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

/// Encodes a run of values into a typed block body.
///
/// # Errors
///
/// String lengths are stored as `u32`; a string longer than 4 GiB cannot
/// be represented and is rejected as [`BlockError::Malformed`] rather than
/// truncated.
pub fn encode_typed_block(values: &[Value]) -> BlockResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(values.len() * 9);

    for value in values {
        match value {
            Value::Undefined => buf.push(TAG_UNDEFINED),
            Value::Integer(v) => {
                buf.push(TAG_INTEGER);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float(v) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::String(bytes) => {
                let len = u32::try_from(bytes.len()).map_err(|_| {
                    BlockError::malformed(format!(
                        "string value of {} bytes exceeds the u32 length limit",
                        bytes.len()
                    ))
                })?;
                buf.push(TAG_STRING);
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }

    Ok(buf)
}

/// Decodes a typed block body, appending `num_elem` values to `out`.
///
/// # Errors
///
/// Returns a [`BlockError::Malformed`] error if the body ends before
/// `num_elem` elements were decoded or carries an unknown element tag.
pub fn decode_typed_block(data: &[u8], num_elem: u64, out: &mut Vec<Value>) -> BlockResult<()> {
    let mut cursor = 0usize;
    let before = out.len();

    for _ in 0..num_elem {
        if cursor >= data.len() {
            return Err(BlockError::malformed("typed block body truncated"));
        }
        let tag = data[cursor];
        cursor += 1;

        match tag {
            TAG_UNDEFINED => out.push(Value::Undefined),
            TAG_INTEGER => {
                let bytes = take(data, &mut cursor, 8)?;
                out.push(Value::Integer(i64::from_le_bytes(
                    bytes.try_into().unwrap_or_default(),
                )));
            }
            TAG_FLOAT => {
                let bytes = take(data, &mut cursor, 8)?;
                out.push(Value::Float(f64::from_le_bytes(
                    bytes.try_into().unwrap_or_default(),
                )));
            }
            TAG_STRING => {
                let len_bytes = take(data, &mut cursor, 4)?;
                let len =
                    u32::from_le_bytes(len_bytes.try_into().unwrap_or_default()) as usize;
                let bytes = take(data, &mut cursor, len)?;
                out.push(Value::String(bytes.to_vec()));
            }
            other => {
                return Err(BlockError::malformed(format!(
                    "unknown element tag {other}"
                )));
            }
        }
    }

    debug_assert_eq!(
        (out.len() - before) as u64,
        num_elem,
        "decoded element count disagrees with block footer"
    );
    Ok(())
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> BlockResult<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .ok_or_else(|| BlockError::malformed("typed block body truncated"))?;
    if end > data.len() {
        return Err(BlockError::malformed("typed block body truncated"));
    }
    let slice = &data[*cursor..end];
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: Vec<Value>) {
        let encoded = encode_typed_block(&values).unwrap();
        let mut decoded = Vec::new();
        decode_typed_block(&encoded, values.len() as u64, &mut decoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn integer_roundtrip() {
        roundtrip(vec![
            Value::Integer(0),
            Value::Integer(-1),
            Value::Integer(i64::MAX),
        ]);
    }

    #[test]
    fn mixed_roundtrip() {
        roundtrip(vec![
            Value::Integer(42),
            Value::Float(2.5),
            Value::String(b"hello".to_vec()),
            Value::Undefined,
        ]);
    }

    #[test]
    fn empty_string_roundtrip() {
        roundtrip(vec![Value::String(Vec::new())]);
    }

    #[test]
    fn truncated_body_fails() {
        let encoded = encode_typed_block(&[Value::Integer(7)]).unwrap();
        let mut out = Vec::new();
        let result = decode_typed_block(&encoded[..encoded.len() - 1], 1, &mut out);
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn missing_elements_fail() {
        let encoded = encode_typed_block(&[Value::Undefined]).unwrap();
        let mut out = Vec::new();
        let result = decode_typed_block(&encoded, 2, &mut out);
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn unknown_tag_fails() {
        let mut out = Vec::new();
        let result = decode_typed_block(&[9], 1, &mut out);
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn decode_appends_to_existing_output() {
        let encoded = encode_typed_block(&[Value::Integer(1)]).unwrap();
        let mut out = vec![Value::Integer(0)];
        decode_typed_block(&encoded, 1, &mut out).unwrap();
        assert_eq!(out, vec![Value::Integer(0), Value::Integer(1)]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_string_is_rejected_not_truncated() {
        // Zeroed allocation stays virtual; the encoder bails on the length
        // check before copying a byte.
        let big = vec![0u8; u32::MAX as usize + 1];
        let result = encode_typed_block(&[Value::String(big)]);
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn content_type_tags() {
        assert_eq!(Value::Integer(1).content_type(), "integer");
        assert_eq!(Value::Float(1.0).content_type(), "float");
        assert_eq!(Value::String(Vec::new()).content_type(), "string");
        assert_eq!(Value::Undefined.content_type(), "");
    }
}
