//! The resolution orchestrator: iterate, simulate, parse, fetch.
//!
//! Each round runs one zero-cost trial pass seeded with the current
//! discovered-data table, decodes the single emitted event, and either
//! finishes (resolved or contract error) or resolves the one surfaced
//! lookup and goes again. The table is the only state carried across
//! rounds, so round n+1 always observes everything discovered through
//! round n.

use std::time::Duration;

use tracing::{debug, info, warn};

use ptb_transport::LedgerClient;
use ptb_types::{
    codec, DiscoveredData, InstructionGroup, LookupQuery, ResolutionOutcome, ResolveError, Result,
};

use crate::handlers;

/// Hard ceiling on the configurable round budget.
pub const MAX_ROUND_LIMIT: u32 = 100;

const DEFAULT_MAX_ROUNDS: u32 = 16;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Iteration budget: trial passes per session, 1..=100.
    pub max_rounds: u32,
    /// Extra attempts for transport-failed ledger lookups. Zero preserves
    /// the reference behavior of no retry. Trial passes are never retried;
    /// their failures are semantic.
    pub lookup_retries: u32,
    /// Base backoff between lookup retry attempts, scaled linearly.
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            lookup_retries: 0,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 || self.max_rounds > MAX_ROUND_LIMIT {
            return Err(ResolveError::Validation(format!(
                "iteration budget must be between 1 and {MAX_ROUND_LIMIT}, got {}",
                self.max_rounds
            )));
        }
        Ok(())
    }
}

/// A finished session: the instruction group plus everything discovered
/// on the way there.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub group: InstructionGroup,
    pub discovered: DiscoveredData,
    /// Trial passes it took, including the final resolving one.
    pub rounds: u32,
}

/// Drives one resolution session at a time against a ledger client.
pub struct Orchestrator<'a> {
    client: &'a dyn LedgerClient,
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a dyn LedgerClient) -> Self {
        Self {
            client,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(client: &'a dyn LedgerClient, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Run the session to completion.
    ///
    /// Returns the resolved instruction group, or the first error: a
    /// contract-reported failure, a failed lookup (wrapped with its
    /// descriptor context), a malformed event, or budget exhaustion.
    pub fn resolve(&self, payload: &[u8]) -> Result<ResolvedSession> {
        self.config.validate()?;
        let mut discovered = DiscoveredData::new();

        for round in 1..=self.config.max_rounds {
            debug!(round, discovered = discovered.len(), "trial pass");
            let event_bytes = self
                .client
                .dry_run(payload, &discovered.encode()?)
                .map_err(|e| ResolveError::rpc("trial execution", e))?;

            match codec::from_canonical_bytes::<ResolutionOutcome>(&event_bytes)? {
                ResolutionOutcome::Resolved(group) => {
                    info!(
                        rounds = round,
                        inputs = group.inputs.len(),
                        commands = group.commands.len(),
                        "session resolved"
                    );
                    return Ok(ResolvedSession {
                        group,
                        discovered,
                        rounds: round,
                    });
                }
                ResolutionOutcome::Error(message) => {
                    return Err(ResolveError::Contract(message));
                }
                ResolutionOutcome::NeedsData(events) => {
                    // The emission step surfaces one representative
                    // descriptor per round.
                    let event = events.first().ok_or_else(|| {
                        ResolveError::MalformedEncoding(
                            "needs-data event carried no descriptors".into(),
                        )
                    })?;
                    let query = LookupQuery::from_event(event)?;
                    let bytes = self.fetch_with_retry(&query)?;
                    debug!(
                        semantic_key = %query.semantic_key,
                        len = bytes.len(),
                        "stored discovered value"
                    );
                    discovered.insert(query.semantic_key, bytes);
                }
            }
        }

        Err(ResolveError::IterationBudgetExceeded {
            budget: self.config.max_rounds,
        })
    }

    fn fetch_with_retry(&self, query: &LookupQuery) -> Result<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            match handlers::resolve_lookup(self.client, query) {
                Ok(bytes) => return Ok(bytes),
                Err(err @ ResolveError::Rpc { .. }) if attempt < self.config.lookup_retries => {
                    attempt += 1;
                    warn!(
                        semantic_key = %query.semantic_key,
                        attempt,
                        error = %err,
                        "lookup transport failure, retrying"
                    );
                    std::thread::sleep(self.config.retry_backoff * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
