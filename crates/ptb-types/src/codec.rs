//! Canonical wire codec.
//!
//! Every structure that crosses the trust boundary (discovered-data table,
//! instruction groups, resolution events) travels as canonical BCS:
//! little-endian fixed-width integers, length-prefixed variable fields, a
//! discriminant per enum variant, no self-delimiting framing beyond that.
//! Truncated or length-inconsistent buffers decode to
//! [`ResolveError::MalformedEncoding`], never a silent partial value.
//!
//! The one layout BCS does not cover is the wire key of a keyed-table
//! lookup. Its structured form is length-prefixed by hand (see
//! [`encode_structured_key`]) because field values are arbitrary binary and
//! may contain the path separator byte anywhere; splitting on the separator
//! past the first occurrence is forbidden.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ResolveError, Result};
use crate::lookup::{KeyField, LookupKind, LookupKindTag, TableKey};

/// Separator between a table path (identifier text) and the encoded key.
pub const KEY_SEPARATOR: u8 = 0xFF;

/// Encode any wire structure to canonical bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bcs::to_bytes(value).map_err(|e| ResolveError::MalformedEncoding(e.to_string()))
}

/// Decode any wire structure from canonical bytes.
///
/// The entire buffer must be consumed; trailing bytes are an error.
pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bcs::from_bytes(bytes).map_err(|e| ResolveError::MalformedEncoding(e.to_string()))
}

/// Encode a structured table key.
///
/// Layout: `field_count:u8`, then per field
/// `name_len:u8 ++ name ++ value_len:u16-BE ++ value`, in insertion order.
/// Deterministic: identical field lists always produce identical bytes.
pub fn encode_structured_key(fields: &[KeyField]) -> Result<Vec<u8>> {
    if fields.len() > u8::MAX as usize {
        return Err(ResolveError::Validation(format!(
            "structured key has {} fields, limit is {}",
            fields.len(),
            u8::MAX
        )));
    }
    let mut out = Vec::with_capacity(1 + fields.iter().map(|f| 3 + f.name.len() + f.value.len()).sum::<usize>());
    out.push(fields.len() as u8);
    for field in fields {
        if field.name.len() > u8::MAX as usize {
            return Err(ResolveError::Validation(format!(
                "structured key field name `{}` exceeds {} bytes",
                field.name,
                u8::MAX
            )));
        }
        if field.value.len() > u16::MAX as usize {
            return Err(ResolveError::Validation(format!(
                "structured key field `{}` value exceeds {} bytes",
                field.name,
                u16::MAX
            )));
        }
        out.push(field.name.len() as u8);
        out.extend_from_slice(field.name.as_bytes());
        out.extend_from_slice(&(field.value.len() as u16).to_be_bytes());
        out.extend_from_slice(&field.value);
    }
    Ok(out)
}

/// Decode a structured table key.
///
/// Consumes exactly `field_count` fields and requires the total consumed
/// length to equal the buffer length.
pub fn decode_structured_key(buf: &[u8]) -> Result<Vec<KeyField>> {
    let mut cursor = 0usize;
    let count = *buf
        .first()
        .ok_or_else(|| ResolveError::MalformedEncoding("structured key is empty".into()))?;
    cursor += 1;

    let mut fields = Vec::with_capacity(count as usize);
    for i in 0..count {
        let name_len = *buf.get(cursor).ok_or_else(|| {
            ResolveError::MalformedEncoding(format!("structured key truncated at field {i} name length"))
        })? as usize;
        cursor += 1;
        let name_bytes = buf.get(cursor..cursor + name_len).ok_or_else(|| {
            ResolveError::MalformedEncoding(format!("structured key truncated in field {i} name"))
        })?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| {
                ResolveError::MalformedEncoding(format!("structured key field {i} name is not UTF-8"))
            })?
            .to_string();
        cursor += name_len;

        let len_bytes = buf.get(cursor..cursor + 2).ok_or_else(|| {
            ResolveError::MalformedEncoding(format!("structured key truncated at field {i} value length"))
        })?;
        let value_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        cursor += 2;
        let value = buf
            .get(cursor..cursor + value_len)
            .ok_or_else(|| {
                ResolveError::MalformedEncoding(format!("structured key truncated in field {i} value"))
            })?
            .to_vec();
        cursor += value_len;

        fields.push(KeyField { name, value });
    }

    if cursor != buf.len() {
        return Err(ResolveError::MalformedEncoding(format!(
            "structured key has {} trailing bytes",
            buf.len() - cursor
        )));
    }
    Ok(fields)
}

/// Encode a descriptor's wire key per its kind.
pub fn encode_lookup_key(kind: &LookupKind) -> Result<Vec<u8>> {
    match kind {
        LookupKind::ByTypeSuffix { type_suffix, field } => {
            // Both sides are identifier text chosen by the descriptor's
            // author, so the bare separator is unambiguous here.
            let mut out = Vec::with_capacity(type_suffix.len() + 1 + field.len());
            out.extend_from_slice(type_suffix.as_bytes());
            out.push(KEY_SEPARATOR);
            out.extend_from_slice(field.as_bytes());
            Ok(out)
        }
        LookupKind::KeyedTableEntry { path, key, .. } => {
            let encoded_key = match key {
                TableKey::Raw(bytes) => bytes.clone(),
                TableKey::Structured(fields) => encode_structured_key(fields)?,
            };
            let mut out = Vec::with_capacity(path.len() + 1 + encoded_key.len());
            out.extend_from_slice(path.as_bytes());
            out.push(KEY_SEPARATOR);
            out.extend_from_slice(&encoded_key);
            Ok(out)
        }
        LookupKind::RawField { key } | LookupKind::RawObjectRefField { key } => Ok(key.clone()),
        LookupKind::NestedPath { path } => Ok(path.as_bytes().to_vec()),
    }
}

/// Rebuild a descriptor kind from its wire key.
///
/// The kind tag travels explicitly in the event, so no heuristics on the
/// key bytes are needed; `key_type` is only meaningful for keyed-table
/// entries.
pub fn decode_lookup_key(tag: LookupKindTag, key_type: &str, key: &[u8]) -> Result<LookupKind> {
    match tag {
        LookupKindTag::ByTypeSuffix => {
            let (suffix, field) = split_at_separator(key)?;
            Ok(LookupKind::ByTypeSuffix {
                type_suffix: utf8_segment(suffix, "type suffix")?,
                field: utf8_segment(field, "extract field")?,
            })
        }
        LookupKindTag::KeyedRaw => {
            let (path, rest) = split_at_separator(key)?;
            Ok(LookupKind::KeyedTableEntry {
                path: utf8_segment(path, "table path")?,
                key: TableKey::Raw(rest.to_vec()),
                key_type: key_type.to_string(),
            })
        }
        LookupKindTag::KeyedStructured => {
            let (path, rest) = split_at_separator(key)?;
            Ok(LookupKind::KeyedTableEntry {
                path: utf8_segment(path, "table path")?,
                key: TableKey::Structured(decode_structured_key(rest)?),
                key_type: key_type.to_string(),
            })
        }
        LookupKindTag::RawField => Ok(LookupKind::RawField { key: key.to_vec() }),
        LookupKindTag::RawObjectRefField => Ok(LookupKind::RawObjectRefField { key: key.to_vec() }),
        LookupKindTag::NestedPath => Ok(LookupKind::NestedPath {
            path: utf8_segment(key, "nested path")?,
        }),
    }
}

/// Split at the first separator only; everything after may be binary.
fn split_at_separator(key: &[u8]) -> Result<(&[u8], &[u8])> {
    let pos = key.iter().position(|&b| b == KEY_SEPARATOR).ok_or_else(|| {
        ResolveError::MalformedEncoding("lookup key is missing its separator byte".into())
    })?;
    Ok((&key[..pos], &key[pos + 1..]))
}

fn utf8_segment(bytes: &[u8], what: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| ResolveError::MalformedEncoding(format!("lookup key {what} is not UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, value: &[u8]) -> KeyField {
        KeyField {
            name: name.to_string(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn structured_key_round_trips() {
        let fields = vec![field("chain", &[1, 0]), field("addr", &[0xAB; 32])];
        let encoded = encode_structured_key(&fields).unwrap();
        assert_eq!(decode_structured_key(&encoded).unwrap(), fields);
    }

    #[test]
    fn structured_key_is_deterministic() {
        let fields = vec![field("a", b"x"), field("b", b"yz")];
        assert_eq!(
            encode_structured_key(&fields).unwrap(),
            encode_structured_key(&fields).unwrap()
        );
    }

    #[test]
    fn structured_key_survives_separator_bytes_in_values() {
        // 32-byte address values legitimately contain 0xFF, possibly many
        // times; length prefixes keep decoding exact.
        let mut addr = [0xFFu8; 32];
        addr[5] = 0x00;
        let fields = vec![
            field("addr", &addr),
            field("chain", &[0xFF, 0xFF]),
            field("amount", &[0xFF, 0, 0, 0, 0, 0, 0, 0]),
        ];
        let encoded = encode_structured_key(&fields).unwrap();
        assert_eq!(decode_structured_key(&encoded).unwrap(), fields);
    }

    #[test]
    fn structured_key_length_formula_holds() {
        let fields = vec![field("chain", &[1, 0]), field("recipient", &[7u8; 32])];
        let encoded = encode_structured_key(&fields).unwrap();
        let expected: usize = 1 + fields.iter().map(|f| 1 + f.name.len() + 2 + f.value.len()).sum::<usize>();
        assert_eq!(encoded.len(), expected);
    }

    #[test]
    fn structured_key_rejects_truncation_and_trailing_bytes() {
        let fields = vec![field("addr", &[9u8; 32])];
        let mut encoded = encode_structured_key(&fields).unwrap();

        let truncated = &encoded[..encoded.len() - 1];
        assert!(matches!(
            decode_structured_key(truncated),
            Err(ResolveError::MalformedEncoding(_))
        ));

        encoded.push(0);
        assert!(matches!(
            decode_structured_key(&encoded),
            Err(ResolveError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn structured_key_rejects_overlong_count() {
        // Declared count exceeds available fields.
        let buf = [3u8, 1, b'a', 0, 0];
        assert!(matches!(
            decode_structured_key(&buf),
            Err(ResolveError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn by_type_suffix_key_round_trips() {
        let kind = LookupKind::ByTypeSuffix {
            type_suffix: "::registry::Registry".into(),
            field: "package".into(),
        };
        let key = encode_lookup_key(&kind).unwrap();
        let decoded = decode_lookup_key(LookupKindTag::ByTypeSuffix, "", &key).unwrap();
        assert_eq!(decoded, kind);
    }

    #[test]
    fn keyed_structured_key_round_trips_through_wire_form() {
        let kind = LookupKind::KeyedTableEntry {
            path: "state.routes".into(),
            key: TableKey::Structured(vec![field("chain", &[0xFF, 0x01]), field("addr", &[0xFF; 32])]),
            key_type: "0x2::table::Key".into(),
        };
        let key = encode_lookup_key(&kind).unwrap();
        let decoded = decode_lookup_key(LookupKindTag::KeyedStructured, "0x2::table::Key", &key).unwrap();
        assert_eq!(decoded, kind);
    }

    #[test]
    fn canonical_decode_rejects_truncation() {
        let encoded = to_canonical_bytes(&vec![1u64, 2, 3]).unwrap();
        let err = from_canonical_bytes::<Vec<u64>>(&encoded[..encoded.len() - 2]);
        assert!(matches!(err, Err(ResolveError::MalformedEncoding(_))));
    }
}
