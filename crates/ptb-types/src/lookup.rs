//! Lookup descriptors: how a session names data it is still missing.
//!
//! A [`LookupQuery`] is the in-memory form a session records; a
//! [`LookupEvent`] is its wire form inside a needs-data outcome. The wire
//! form carries an explicit kind discriminant, so the orchestrator never has
//! to guess a descriptor's shape from its key bytes.

use serde::{Deserialize, Serialize};

use crate::address::ObjectAddr;
use crate::codec;
use crate::error::Result;

/// One named field of a structured table key. The value is opaque bytes;
/// interpretation is left to the keyed-table handler's naming heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyField {
    pub name: String,
    pub value: Vec<u8>,
}

impl KeyField {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Key of a keyed-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKey {
    /// Already-encoded key bytes, used verbatim.
    Raw(Vec<u8>),
    /// Named fields, length-prefix encoded on the wire.
    Structured(Vec<KeyField>),
}

/// How to find one datum, relative to a parent object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupKind {
    /// Scan the parent's keyed sub-entries for a value whose declared type
    /// ends with `type_suffix`, then extract `field` as an address.
    ByTypeSuffix { type_suffix: String, field: String },
    /// Walk `path` through the parent's fields to a table handle, then
    /// point-fetch the entry under `key`.
    KeyedTableEntry {
        path: String,
        key: TableKey,
        key_type: String,
    },
    /// Fetch the sub-entry stored under an opaque key on the parent itself.
    RawField { key: Vec<u8> },
    /// Like `RawField`, but the result is a packed object reference
    /// (id, version, digest), not a scalar.
    RawObjectRefField { key: Vec<u8> },
    /// Walk a dot-separated path through the parent's own fields.
    NestedPath { path: String },
}

impl LookupKind {
    pub fn tag(&self) -> LookupKindTag {
        match self {
            LookupKind::ByTypeSuffix { .. } => LookupKindTag::ByTypeSuffix,
            LookupKind::KeyedTableEntry { key: TableKey::Raw(_), .. } => LookupKindTag::KeyedRaw,
            LookupKind::KeyedTableEntry { key: TableKey::Structured(_), .. } => {
                LookupKindTag::KeyedStructured
            }
            LookupKind::RawField { .. } => LookupKindTag::RawField,
            LookupKind::RawObjectRefField { .. } => LookupKindTag::RawObjectRefField,
            LookupKind::NestedPath { .. } => LookupKindTag::NestedPath,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LookupKind::ByTypeSuffix { .. } => "by-type-suffix",
            LookupKind::KeyedTableEntry { .. } => "keyed-table-entry",
            LookupKind::RawField { .. } => "raw-field",
            LookupKind::RawObjectRefField { .. } => "raw-object-ref-field",
            LookupKind::NestedPath { .. } => "nested-path",
        }
    }

    /// Key-type string carried on the wire; empty except for table entries.
    fn wire_key_type(&self) -> String {
        match self {
            LookupKind::KeyedTableEntry { key_type, .. } => key_type.clone(),
            _ => String::new(),
        }
    }
}

/// Wire discriminant for [`LookupKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupKindTag {
    ByTypeSuffix,
    KeyedRaw,
    KeyedStructured,
    RawField,
    RawObjectRefField,
    NestedPath,
}

/// One requested datum: where to look, how, and the session-unique name
/// the result will be stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupQuery {
    pub semantic_key: String,
    pub parent: ObjectAddr,
    pub kind: LookupKind,
}

impl LookupQuery {
    pub fn new(semantic_key: impl Into<String>, parent: ObjectAddr, kind: LookupKind) -> Self {
        Self {
            semantic_key: semantic_key.into(),
            parent,
            kind,
        }
    }

    /// Encode into the wire event carried by a needs-data outcome.
    pub fn to_event(&self) -> Result<LookupEvent> {
        Ok(LookupEvent {
            parent_object: self.parent,
            kind: self.kind.tag(),
            lookup_key: codec::encode_lookup_key(&self.kind)?,
            key_type: self.kind.wire_key_type(),
            semantic_key: self.semantic_key.clone(),
        })
    }

    /// Rebuild the query from its wire event.
    pub fn from_event(event: &LookupEvent) -> Result<Self> {
        Ok(Self {
            semantic_key: event.semantic_key.clone(),
            parent: event.parent_object,
            kind: codec::decode_lookup_key(event.kind, &event.key_type, &event.lookup_key)?,
        })
    }
}

/// Wire form of one missing-datum request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEvent {
    pub parent_object: ObjectAddr,
    pub kind: LookupKindTag,
    pub lookup_key: Vec<u8>,
    /// Declared key type; empty unless the descriptor is a table entry.
    pub key_type: String,
    pub semantic_key: String,
}
