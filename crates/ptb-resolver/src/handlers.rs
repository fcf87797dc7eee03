//! Lookup handlers: one per descriptor kind.
//!
//! Each handler turns a [`LookupQuery`] into resolved bytes by querying the
//! ledger, or fails with a contextualized error carrying the descriptor
//! kind, parent address, key, and semantic key. Any failure aborts the
//! whole session; there is no partial success at this layer.

use serde_json::Value;
use tracing::debug;

use ptb_transport::{ChildEntry, LedgerClient};
use ptb_types::{
    KeyField, LookupKind, LookupQuery, ObjectAddr, ObjectRef, ResolveError, Result, TableKey,
};

/// Resolve one lookup against the ledger.
pub fn resolve_lookup(client: &dyn LedgerClient, query: &LookupQuery) -> Result<Vec<u8>> {
    debug!(
        kind = query.kind.name(),
        semantic_key = %query.semantic_key,
        parent = %query.parent.to_hex_short(),
        "dispatching lookup"
    );
    match &query.kind {
        LookupKind::ByTypeSuffix { type_suffix, field } => {
            by_type_suffix(client, query, type_suffix, field)
        }
        LookupKind::KeyedTableEntry {
            path,
            key,
            key_type,
        } => keyed_table_entry(client, query, path, key, key_type),
        LookupKind::RawField { key } => raw_field(client, query, key),
        LookupKind::RawObjectRefField { key } => raw_object_ref_field(client, query, key),
        LookupKind::NestedPath { path } => nested_path(client, query, path),
    }
}

/// Context string attached to every handler error.
fn lookup_context(query: &LookupQuery) -> String {
    format!(
        "{} lookup `{}` on parent {}",
        query.kind.name(),
        query.semantic_key,
        query.parent.to_hex_short()
    )
}

fn rpc_err(query: &LookupQuery, op: &str, err: impl std::fmt::Display) -> ResolveError {
    ResolveError::rpc(format!("{op} for {}", lookup_context(query)), err)
}

fn by_type_suffix(
    client: &dyn LedgerClient,
    query: &LookupQuery,
    type_suffix: &str,
    field: &str,
) -> Result<Vec<u8>> {
    let entries = client
        .list_child_entries(query.parent)
        .map_err(|e| rpc_err(query, "child enumeration", e))?;

    let matched = entries.iter().find(|e| {
        e.value_type
            .as_deref()
            .map(|t| t.ends_with(type_suffix))
            .unwrap_or(false)
    });

    if let Some(entry) = matched {
        let fields = if !entry.value_json.is_null() {
            entry.value_json.clone()
        } else if let Some(id) = entry.object_id {
            client
                .fetch_object(id)
                .map_err(|e| rpc_err(query, "sub-entry fetch", e))?
                .fields
        } else {
            Value::Null
        };
        let value = fields.get(field).ok_or_else(|| {
            ResolveError::missing_field(field, lookup_context(query))
        })?;
        let addr_str = value.as_str().ok_or_else(|| {
            ResolveError::type_mismatch("address string", value.to_string(), lookup_context(query))
        })?;
        let addr = ObjectAddr::from_hex(addr_str).map_err(|_| {
            ResolveError::type_mismatch("address string", addr_str, lookup_context(query))
        })?;
        return Ok(addr.as_bytes().to_vec());
    }

    // Some ledger object models carry package provenance in the declared
    // type label instead of a field. When the caller asked for the
    // conventional "package" field and no sub-entry matched, derive the
    // address from the parent's own type.
    if field == "package" {
        let parent_obj = client
            .fetch_object(query.parent)
            .map_err(|e| rpc_err(query, "parent fetch", e))?;
        let type_string = parent_obj.type_string.ok_or_else(|| {
            ResolveError::missing_field("type", lookup_context(query))
        })?;
        let package = type_string.split("::").next().unwrap_or("");
        let addr = ObjectAddr::from_hex(package).map_err(|_| {
            ResolveError::type_mismatch(
                "package-qualified type label",
                type_string.clone(),
                lookup_context(query),
            )
        })?;
        return Ok(addr.as_bytes().to_vec());
    }

    Err(ResolveError::missing_field(
        format!("sub-entry with type suffix `{type_suffix}`"),
        lookup_context(query),
    ))
}

fn keyed_table_entry(
    client: &dyn LedgerClient,
    query: &LookupQuery,
    path: &str,
    key: &TableKey,
    key_type: &str,
) -> Result<Vec<u8>> {
    let parent_obj = client
        .fetch_object(query.parent)
        .map_err(|e| rpc_err(query, "parent fetch", e))?;

    let table_node = walk_path(&parent_obj.fields, path, query)?;
    let table_id = extract_object_id(table_node).ok_or_else(|| {
        ResolveError::missing_field(
            format!("table handle at path `{path}`"),
            lookup_context(query),
        )
    })?;

    let key_bytes = match key {
        TableKey::Raw(bytes) => bytes.clone(),
        TableKey::Structured(fields) => {
            let mut out = Vec::new();
            for field in fields {
                out.extend_from_slice(&encode_key_field(field, query)?);
            }
            out
        }
    };

    let entry = client
        .fetch_child_entry(table_id, key_type, &key_bytes)
        .map_err(|e| rpc_err(query, "table entry fetch", e))?
        .ok_or_else(|| {
            ResolveError::missing_field(
                format!("table entry under key 0x{}", hex_key(&key_bytes)),
                lookup_context(query),
            )
        })?;

    table_value_bytes(&entry, query)
}

fn nested_path(client: &dyn LedgerClient, query: &LookupQuery, path: &str) -> Result<Vec<u8>> {
    let parent_obj = client
        .fetch_object(query.parent)
        .map_err(|e| rpc_err(query, "parent fetch", e))?;
    let terminal = walk_path(&parent_obj.fields, path, query)?;
    terminal_to_bytes(terminal, query)
}

fn raw_field(client: &dyn LedgerClient, query: &LookupQuery, key: &[u8]) -> Result<Vec<u8>> {
    let entry = find_entry_by_key(client, query, key)?;
    if !entry.value_json.is_null() {
        terminal_to_bytes(&entry.value_json, query)
    } else if let Some(bytes) = entry.value_bytes {
        Ok(bytes)
    } else {
        Err(ResolveError::missing_field("value", lookup_context(query)))
    }
}

fn raw_object_ref_field(
    client: &dyn LedgerClient,
    query: &LookupQuery,
    key: &[u8],
) -> Result<Vec<u8>> {
    let entry = find_entry_by_key(client, query, key)?;
    let id = entry.object_id.ok_or_else(|| {
        ResolveError::missing_field("object id", lookup_context(query))
    })?;
    let version = entry.version.ok_or_else(|| {
        ResolveError::missing_field("version", lookup_context(query))
    })?;
    // An entry with no digest packs zero digest bytes.
    let digest = match entry.digest {
        Some(d) => bs58::decode(&d).into_vec().map_err(|_| {
            ResolveError::MalformedEncoding(format!(
                "digest `{d}` is not base58 ({})",
                lookup_context(query)
            ))
        })?,
        None => Vec::new(),
    };
    Ok(ObjectRef { id, version, digest }.pack())
}

/// Locate a sub-entry by raw key bytes on the parent itself.
fn find_entry_by_key(
    client: &dyn LedgerClient,
    query: &LookupQuery,
    key: &[u8],
) -> Result<ChildEntry> {
    let entries = client
        .list_child_entries(query.parent)
        .map_err(|e| rpc_err(query, "child enumeration", e))?;
    entries
        .into_iter()
        .find(|e| e.name_bytes == key)
        .ok_or_else(|| {
            ResolveError::missing_field(
                format!("sub-entry under key 0x{}", hex_key(key)),
                lookup_context(query),
            )
        })
}

/// Walk a dot-separated path through an object's JSON fields.
fn walk_path<'a>(fields: &'a Value, path: &str, query: &LookupQuery) -> Result<&'a Value> {
    let mut current = fields;
    for segment in path.split('.') {
        current = current.get(segment).ok_or_else(|| {
            ResolveError::missing_field(
                format!("`{segment}` while walking `{path}`"),
                lookup_context(query),
            )
        })?;
    }
    Ok(current)
}

/// Pull an object address out of a field node: either a bare address
/// string or a wrapper with an `id` field (possibly doubly nested).
fn extract_object_id(node: &Value) -> Option<ObjectAddr> {
    match node {
        Value::String(s) => ObjectAddr::from_hex(s).ok(),
        Value::Object(_) => {
            let id = node.get("id")?;
            match id {
                Value::String(s) => ObjectAddr::from_hex(s).ok(),
                Value::Object(_) => id
                    .get("id")
                    .and_then(|inner| inner.as_str())
                    .and_then(|s| ObjectAddr::from_hex(s).ok()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Encode one structured key field per the naming heuristic: "chain"-like
/// names are fixed-width integers carried verbatim, "addr"-like names raw
/// byte arrays, "amount"/"value"-like names width-probed unsigned integers
/// re-encoded as u64, anything else raw bytes.
fn encode_key_field(field: &KeyField, query: &LookupQuery) -> Result<Vec<u8>> {
    let name = field.name.to_ascii_lowercase();
    if name.contains("chain") || name.contains("addr") {
        return Ok(field.value.clone());
    }
    if name.contains("amount") || name.contains("value") {
        let widened = match field.value.len() {
            1 => field.value[0] as u64,
            2 => u16::from_le_bytes([field.value[0], field.value[1]]) as u64,
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(&field.value);
                u32::from_le_bytes(b) as u64
            }
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&field.value);
                u64::from_le_bytes(b)
            }
            n => {
                return Err(ResolveError::type_mismatch(
                    "integer of width 1, 2, 4, or 8",
                    format!("{n} bytes in key field `{}`", field.name),
                    lookup_context(query),
                ))
            }
        };
        return Ok(widened.to_le_bytes().to_vec());
    }
    Ok(field.value.clone())
}

/// Value conversion for keyed-table entries: canonical bytes pass through,
/// strings become UTF-8, arrays become byte arrays.
fn table_value_bytes(entry: &ChildEntry, query: &LookupQuery) -> Result<Vec<u8>> {
    if let Some(bytes) = &entry.value_bytes {
        return Ok(bytes.clone());
    }
    match &entry.value_json {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => byte_array(items, query),
        other => Err(ResolveError::type_mismatch(
            "string, byte array, or canonical bytes",
            other.to_string(),
            lookup_context(query),
        )),
    }
}

/// Terminal value conversion for nested-path and raw-field lookups.
fn terminal_to_bytes(value: &Value, query: &LookupQuery) -> Result<Vec<u8>> {
    match value {
        // A 0x-prefixed string is an address when it parses as one;
        // otherwise it is text that merely starts with 0x, e.g. a
        // package-qualified coin type.
        Value::String(s) => {
            if s.starts_with("0x") {
                if let Ok(addr) = ObjectAddr::from_hex(s) {
                    return Ok(addr.as_bytes().to_vec());
                }
            }
            Ok(s.as_bytes().to_vec())
        }
        Value::Number(n) => {
            let v = n.as_u64().ok_or_else(|| {
                ResolveError::type_mismatch(
                    "unsigned 64-bit integer",
                    n.to_string(),
                    lookup_context(query),
                )
            })?;
            Ok(v.to_le_bytes().to_vec())
        }
        Value::Bool(b) => Ok(vec![u8::from(*b)]),
        Value::Array(items) => byte_array(items, query),
        other => Err(ResolveError::type_mismatch(
            "string, number, boolean, or byte array",
            other.to_string(),
            lookup_context(query),
        )),
    }
}

fn byte_array(items: &[Value], query: &LookupQuery) -> Result<Vec<u8>> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|v| *v <= u8::MAX as u64)
                .map(|v| v as u8)
                .ok_or_else(|| {
                    ResolveError::type_mismatch(
                        "byte array",
                        item.to_string(),
                        lookup_context(query),
                    )
                })
        })
        .collect()
}

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}
