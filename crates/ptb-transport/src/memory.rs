//! Deterministic in-memory ledger.
//!
//! Serves fetches from locally registered state instead of the network,
//! which makes full resolution sessions runnable offline. The trial pass is
//! a registered closure standing in for the on-ledger session entry point:
//! it receives the payload and the encoded discovered-data table and returns
//! the canonical bytes of one resolution event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{anyhow, Result};
use serde_json::Value;

use ptb_types::ObjectAddr;

use crate::{ChildEntry, LedgerClient, LedgerObject};

/// Closure standing in for the on-ledger session entry point.
pub type SessionProgram = Box<dyn Fn(&[u8], &[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// In-memory [`LedgerClient`] for offline runs and tests.
#[derive(Default)]
pub struct MemoryLedger {
    objects: HashMap<ObjectAddr, LedgerObject>,
    children: HashMap<ObjectAddr, Vec<ChildEntry>>,
    program: Option<SessionProgram>,
    dry_runs: AtomicU32,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object with a declared type and JSON fields.
    pub fn with_object(
        mut self,
        addr: ObjectAddr,
        type_string: impl Into<String>,
        fields: Value,
    ) -> Self {
        self.objects.insert(
            addr,
            LedgerObject {
                address: addr,
                version: 1,
                digest: None,
                type_string: Some(type_string.into()),
                fields,
            },
        );
        self
    }

    /// Register a fully specified object.
    pub fn with_ledger_object(mut self, object: LedgerObject) -> Self {
        self.objects.insert(object.address, object);
        self
    }

    /// Register one keyed sub-entry under a parent.
    pub fn with_child(mut self, parent: ObjectAddr, entry: ChildEntry) -> Self {
        self.children.entry(parent).or_default().push(entry);
        self
    }

    /// Register the session program executed by `dry_run`.
    pub fn with_program(
        mut self,
        program: impl Fn(&[u8], &[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.program = Some(Box::new(program));
        self
    }

    /// Number of trial passes executed so far.
    pub fn dry_run_count(&self) -> u32 {
        self.dry_runs.load(Ordering::Relaxed)
    }
}

impl LedgerClient for MemoryLedger {
    fn dry_run(&self, payload: &[u8], discovered: &[u8]) -> Result<Vec<u8>> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| anyhow!("no session program registered"))?;
        self.dry_runs.fetch_add(1, Ordering::Relaxed);
        program(payload, discovered)
    }

    fn fetch_object(&self, addr: ObjectAddr) -> Result<LedgerObject> {
        self.objects
            .get(&addr)
            .cloned()
            .ok_or_else(|| anyhow!("object {} not found", addr.to_hex_short()))
    }

    fn list_child_entries(&self, parent: ObjectAddr) -> Result<Vec<ChildEntry>> {
        Ok(self.children.get(&parent).cloned().unwrap_or_default())
    }

    fn fetch_child_entry(
        &self,
        parent: ObjectAddr,
        key_type: &str,
        key_bytes: &[u8],
    ) -> Result<Option<ChildEntry>> {
        Ok(self
            .children
            .get(&parent)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|e| e.name_type == key_type && e.name_bytes == key_bytes)
            })
            .cloned())
    }
}
