//! The discovered-data table: the only state a session carries across
//! rounds.
//!
//! Append-only and first-write-wins: inserting an existing key again keeps
//! the duplicate in storage but never changes what `lookup` returns. There
//! is no deletion.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: Vec<u8>,
}

/// Ordered key → bytes store for data discovered during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredData {
    entries: Vec<Entry>,
}

impl DiscoveredData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Existing entries under the same key are retained
    /// and keep winning lookups.
    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.push(Entry {
            key: key.into(),
            value,
        });
    }

    /// First inserted value for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_slice())
    }

    /// All keys in insertion order, duplicates included.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical wire encoding of the ordered entry list.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::to_canonical_bytes(&self.entries)
    }

    /// Decode from wire bytes. An empty buffer is an empty table, not an
    /// error; anything else must decode exactly.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        Ok(Self {
            entries: codec::from_canonical_bytes(bytes)?,
        })
    }
}
