//! Canonical JSON encoding.
//!
//! The canonical form is compact JSON with object keys sorted by byte order
//! and no insignificant whitespace. Two logically equal payloads always encode
//! to identical bytes, whatever order their maps were built in. The encoder
//! never consults the clock or any other ambient state.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CanonicalError, CanonicalResult};

/// Maximum nesting depth accepted by the encoder.
pub const MAX_DEPTH: usize = 128;

/// Encode any serializable value canonically.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> CanonicalResult<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| CanonicalError::Unsupported(e.to_string()))?;
    encode_value(&value)
}

/// Encode a JSON value canonically.
pub fn encode_value(value: &Value) -> CanonicalResult<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value, 0)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value, depth: usize) -> CanonicalResult<()> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::TooDeep { limit: MAX_DEPTH });
    }
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item, depth + 1)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key)?;
                out.push(b':');
                write_value(out, item, depth + 1)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> CanonicalResult<()> {
    serde_json::to_writer(&mut *out, s).map_err(|e| CanonicalError::Serialization(e.to_string()))
}
