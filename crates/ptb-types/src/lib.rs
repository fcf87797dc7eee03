//! Shared types and wire codec for the ptb-resolve workspace.
//!
//! This crate is the vocabulary of the resolution protocol:
//! - [`address`]: 32-byte addresses and hex normalization
//! - [`model`]: inputs, commands, arguments, instruction groups, outcomes
//! - [`lookup`]: lookup descriptors and their wire events
//! - [`discovered`]: the append-only discovered-data table
//! - [`codec`]: canonical BCS wrappers plus the structured-key layout
//! - [`error`]: the closed error taxonomy

pub mod address;
pub mod codec;
pub mod discovered;
pub mod error;
pub mod lookup;
pub mod model;

pub use address::{normalize_address, ObjectAddr};
pub use discovered::DiscoveredData;
pub use error::{ResolveError, Result};
pub use lookup::{KeyField, LookupEvent, LookupKind, LookupKindTag, LookupQuery, TableKey};
pub use model::{
    Argument, Command, Input, InstructionGroup, MoveTarget, ObjectRef, ResolutionOutcome,
};
