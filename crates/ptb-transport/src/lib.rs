//! Ledger-query boundary.
//!
//! The resolution protocol needs four things from a ledger: a zero-cost
//! trial execution that returns one emitted event, object fetches, keyed
//! sub-entry enumeration, and keyed sub-entry point fetch. [`LedgerClient`]
//! captures exactly that surface; everything above it is transport-agnostic.
//!
//! Implementations:
//! - [`graphql::GraphQLLedger`]: blocking HTTP client against a GraphQL
//!   fullnode endpoint
//! - [`memory::MemoryLedger`]: deterministic in-memory ledger for offline
//!   runs and tests

pub mod graphql;
pub mod memory;
pub mod network;

pub use graphql::GraphQLLedger;
pub use memory::MemoryLedger;

use anyhow::Result;
use serde_json::Value;

use ptb_types::ObjectAddr;

/// A ledger object's current fields and declared type.
#[derive(Debug, Clone)]
pub struct LedgerObject {
    pub address: ObjectAddr,
    pub version: u64,
    /// Content digest, base58 when sourced from the network.
    pub digest: Option<String>,
    /// Declared type label, e.g. `0xabc::vault::Vault`.
    pub type_string: Option<String>,
    /// JSON rendering of the object's fields.
    pub fields: Value,
}

/// One keyed sub-entry (dynamic field) of a parent object.
#[derive(Debug, Clone, Default)]
pub struct ChildEntry {
    /// Declared type of the key, e.g. `u64` or `0x2::object::ID`.
    pub name_type: String,
    /// Canonical bytes of the key.
    pub name_bytes: Vec<u8>,
    /// Declared type of the stored value.
    pub value_type: Option<String>,
    /// JSON rendering of the stored value.
    pub value_json: Value,
    /// Canonical bytes of the stored value, when the source provides them.
    pub value_bytes: Option<Vec<u8>>,
    /// Address of the wrapper object, when the value is itself an object.
    pub object_id: Option<ObjectAddr>,
    pub version: Option<u64>,
    pub digest: Option<String>,
}

/// The ledger operations the resolution protocol depends on.
///
/// Blocking and object-safe; the protocol is strictly sequential, so one
/// outstanding call at a time is all that ever happens.
pub trait LedgerClient {
    /// Run one zero-cost trial pass of the session entry point with the
    /// given payload and encoded discovered-data table, returning the
    /// canonical bytes of the single resolution event it emits.
    fn dry_run(&self, payload: &[u8], discovered: &[u8]) -> Result<Vec<u8>>;

    /// Fetch an object's current fields and declared type by address.
    fn fetch_object(&self, addr: ObjectAddr) -> Result<LedgerObject>;

    /// Enumerate the keyed sub-entries of a parent object.
    fn list_child_entries(&self, parent: ObjectAddr) -> Result<Vec<ChildEntry>>;

    /// Fetch one keyed sub-entry by typed key bytes.
    fn fetch_child_entry(
        &self,
        parent: ObjectAddr,
        key_type: &str,
        key_bytes: &[u8],
    ) -> Result<Option<ChildEntry>>;
}
