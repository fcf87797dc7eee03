//! ptb-resolve: resolve a call sequence's inputs against a live ledger.
//!
//! The `resolve` command drives a full resolution session: repeated
//! zero-cost trial passes of the session entry point, fetching each
//! surfaced lookup until the instruction group resolves or the iteration
//! budget runs out. The `inspect` command decodes a finalized instruction
//! group from its canonical bytes and prints the operations it would
//! replay.
//!
//! ## Example Usage
//!
//! ```bash
//! # Resolve a redemption payload on mainnet
//! ptb-resolve resolve \
//!     --target 0x77…::resolver::resolve \
//!     --payload 0xdeadbeef
//!
//! # Decode a finalized instruction group
//! ptb-resolve inspect 0x0203…
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ptb_resolver::{reconstruct, Orchestrator, OrchestratorConfig, RecordingAssembler};
use ptb_transport::{network, GraphQLLedger};
use ptb_types::MoveTarget;

#[derive(Parser)]
#[command(name = "ptb-resolve", version, about = "Iterative input resolution for call sequences")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a resolution session against a GraphQL endpoint.
    Resolve {
        /// Session entry point, `0xADDR::module::function`.
        #[arg(long)]
        target: String,

        /// Hex-encoded primary payload.
        #[arg(long)]
        payload: String,

        /// GraphQL endpoint; falls back to PTB_GRAPHQL_ENDPOINT, then mainnet.
        #[arg(long)]
        endpoint: Option<String>,

        /// Iteration budget: trial passes per session (1-100).
        #[arg(long, default_value_t = 16)]
        max_rounds: u32,

        /// Retry attempts for transient lookup failures.
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// Decode a hex-encoded instruction group and print its operations.
    Inspect {
        /// Canonical instruction-group bytes, hex.
        blob: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Resolve {
            target,
            payload,
            endpoint,
            max_rounds,
            retries,
        } => run_resolve(&target, &payload, endpoint.as_deref(), max_rounds, retries),
        Commands::Inspect { blob } => run_inspect(&blob),
    }
}

fn run_resolve(
    target: &str,
    payload: &str,
    endpoint: Option<&str>,
    max_rounds: u32,
    retries: u32,
) -> Result<()> {
    let target = MoveTarget::parse(target)?;
    let payload = decode_hex(payload).context("invalid --payload")?;
    let endpoint = network::resolve_graphql_endpoint(endpoint);

    let ledger = GraphQLLedger::new(&endpoint, target);
    let orchestrator = Orchestrator::with_config(
        &ledger,
        OrchestratorConfig {
            max_rounds,
            lookup_retries: retries,
            ..Default::default()
        },
    );

    let resolved = orchestrator.resolve(&payload)?;
    let encoded = ptb_types::codec::to_canonical_bytes(&resolved.group)?;

    let summary = json!({
        "endpoint": endpoint,
        "network": network::infer_network_from_url(&endpoint).unwrap_or("custom"),
        "rounds": resolved.rounds,
        "discovered": resolved.discovered.keys(),
        "inputs": resolved.group.inputs.len(),
        "commands": resolved.group.commands.len(),
        "required_objects": resolved.group.required_objects.iter()
            .map(|a| a.to_hex())
            .collect::<Vec<_>>(),
        "required_types": resolved.group.required_types,
        "encoded": format!("0x{}", hex::encode(encoded)),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_inspect(blob: &str) -> Result<()> {
    let raw = decode_hex(blob).context("invalid instruction-group hex")?;
    let mut assembler = RecordingAssembler::new();
    reconstruct(&raw, &mut assembler)?;
    for op in &assembler.ops {
        println!("{op}");
    }
    Ok(())
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(s.trim().trim_start_matches("0x"))?)
}
