//! Resolution protocol for call sequences with not-yet-known inputs.
//!
//! A session's trial pass builds a declarative call sequence and reports
//! what data it is still missing; the orchestrator fetches that data
//! through ledger lookups and retries, bounded by an iteration budget;
//! the reconstructor replays the finalized sequence against a live
//! transaction-building API.
//!
//! - [`session`]: call-sequence builder and lookup request tracker
//! - [`orchestrator`]: the iterate-simulate-parse-fetch loop
//! - [`handlers`]: one ledger-lookup handler per descriptor kind
//! - [`reconstruct`]: instruction-group replay over [`reconstruct::TxAssembler`]

pub mod handlers;
pub mod orchestrator;
pub mod reconstruct;
pub mod session;

pub use handlers::resolve_lookup;
pub use orchestrator::{Orchestrator, OrchestratorConfig, ResolvedSession, MAX_ROUND_LIMIT};
pub use reconstruct::{reconstruct, reconstruct_group, RecordingAssembler, TxAssembler};
pub use session::{CommandResult, InputHandle, LookupTracker, Session, TxBuilder};
