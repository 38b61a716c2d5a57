//! tessera: Demo CLI
//!
//! Runs the verification engine against a live agent described by a
//! capability manifest, or traces field provenance for a recorded chain run.
//!
//! Usage:
//!   cargo run -p demo -- verify manifest.json --endpoint http://localhost:8080/agent
//!   cargo run -p demo -- trace final.json nodes.json --run-id run-1
//!
//! Secrets come from the environment: `AGENT_JWT_SECRET` signs bearer tokens
//! and `TESSERA_AGENT_SECRET` is used as the HMAC key of the verified agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessera_contracts::{
    agent::AuthConfig,
    error::{TesseraError, TesseraResult},
    manifest::AgentManifest,
    provenance::NodeOutput,
};
use tessera_core::{traits::AgentStore, InMemoryAgentStore, StaticSecretResolver};
use tessera_invoke::{AgentClient, ClientConfig};
use tessera_provenance::ProvenanceTracker;
use tessera_verify::VerificationEngine;

/// Environment variable holding the HMAC key for the agent under test.
const AGENT_SECRET_ENV: &str = "TESSERA_AGENT_SECRET";

// ── CLI definition ────────────────────────────────────────────────────────────

/// tessera: verify third-party agents and trace where their outputs came from.
#[derive(Parser)]
#[command(name = "tessera-demo", about = "tessera agent verification and provenance demo")]
struct Cli {
    /// Client configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe an agent described by a capability manifest and print its report.
    Verify {
        /// Path to the agent's manifest JSON.
        manifest: PathBuf,
        /// Endpoint URL the agent is reachable at.
        #[arg(long)]
        endpoint: String,
        #[arg(long, default_value = "demo-owner")]
        owner: String,
    },
    /// Trace the fields of a final output back to recorded node outputs.
    Trace {
        /// Path to the final output JSON object.
        final_output: PathBuf,
        /// Path to a JSON array of `{ "node_id", "output" }` records.
        nodes: PathBuf,
        #[arg(long, default_value = "demo-run")]
        run_id: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-attempt output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Verify { manifest, endpoint, owner } => {
            run_verify(cli.config.as_deref(), &manifest, endpoint, owner).await
        }
        Command::Trace { final_output, nodes, run_id } => {
            run_trace(&final_output, &nodes, &run_id).await
        }
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_verify(
    config: Option<&Path>,
    manifest: &Path,
    endpoint: String,
    owner: String,
) -> TesseraResult<()> {
    let config = match config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    let manifest: AgentManifest = parse_json(&read_json(manifest)?, "manifest")?;
    let agent = manifest.into_agent(endpoint, owner);

    let mut secrets = StaticSecretResolver::from_env([config.service_secret_ref.as_str()]);
    if let AuthConfig::Hmac { secret_ref } = &agent.auth {
        if let Ok(key) = std::env::var(AGENT_SECRET_ENV) {
            secrets = secrets.with_secret(secret_ref.clone(), key);
        }
    }

    let store = InMemoryAgentStore::new();
    store.put_agent(&agent).await?;

    let client = AgentClient::http(config, Arc::new(secrets))?;
    let engine = VerificationEngine::new(Arc::new(client));
    let report = engine.verify_registered(&store, &agent.id).await?;
    let agent = store.get_agent(&agent.id).await?;

    info!(agent_id = %agent.id, status = ?agent.status, "verification stored");
    println!("agent:  {} ({})", agent.name, agent.id);
    println!("level:  {}", report.level());
    println!("score:  {:.4}", report.score());
    print_json(&report)
}

async fn run_trace(final_output: &Path, nodes: &Path, run_id: &str) -> TesseraResult<()> {
    let final_output = read_json(final_output)?;
    let nodes: Vec<NodeOutput> = parse_json(&read_json(nodes)?, "node outputs")?;

    let store = InMemoryAgentStore::new();
    store.append_node_outputs(run_id, nodes).await?;

    let tracker = ProvenanceTracker::new();
    tracker.trace_run(&store, run_id, &final_output).await?;
    print_json(&tracker.export_report(run_id)?)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_json(path: &Path) -> TesseraResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| TesseraError::Config {
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&text).map_err(|e| TesseraError::Config {
        reason: format!("{} is not valid JSON: {e}", path.display()),
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &Value, what: &str) -> TesseraResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| TesseraError::Config {
        reason: format!("invalid {what}: {e}"),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> TesseraResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| TesseraError::Payload {
        reason: e.to_string(),
    })?;
    println!("{text}");
    Ok(())
}
