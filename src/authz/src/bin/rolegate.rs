//! # Rolegate CLI
//!
//! Offline access checks against a JSON fixture holding a principal, the
//! role catalog and the principal's grants.
//!
//! ## Commands
//!
//! - `check <action> <resource> [--context <json>]` - print the decision (exit 1 on deny)
//! - `policy` - print the assembled policy
//! - `grant <permission-json>` - upsert a grant, print the rebuilt policy
//!
//! ## Configuration
//!
//! - `ROLEGATE_FIXTURE` - fixture path (default: built-in demo data)
//! - `ROLEGATE_CONFIG` - TOML service configuration
//! - `ROLEGATE_UNRESOLVED_ROLES`, `ROLEGATE_FETCH_TIMEOUT_MS` - config overrides
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rolegate_authz::{Fixture, MemoryStore, Permission, PolicyService, ResourceContext, ServiceConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Rolegate access-control CLI
#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Evaluate RBAC + attribute-condition policies")]
#[command(version)]
struct Cli {
    /// Fixture with principal, roles and grants (JSON)
    #[arg(short, long, env = "ROLEGATE_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Service configuration (TOML)
    #[arg(short, long, env = "ROLEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether the principal may perform an action on a resource
    Check {
        action: String,
        resource: String,

        /// Resource context as a JSON object, e.g. '{"ownerId":"u_1"}'
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the assembled policy
    Policy,

    /// Upsert a grant for the principal and print the rebuilt policy
    Grant {
        /// Permission as JSON
        permission: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,rolegate_authz={}", log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    }
    .apply_env()?;

    let fixture = match &cli.fixture {
        Some(path) => Fixture::load(path)?,
        None => {
            info!("no fixture given, using demo data");
            Fixture::demo()
        }
    };
    let principal_id = fixture.principal.id.clone();

    let service = PolicyService::from_store(config, Arc::new(MemoryStore::from_fixture(fixture)));
    let policy = service.refresh().await.context("failed to build policy")?;

    match cli.command {
        Command::Check {
            action,
            resource,
            context,
        } => {
            let ctx = match context {
                Some(raw) => {
                    let value = serde_json::from_str(&raw).context("--context is not valid JSON")?;
                    ResourceContext::from_json(value)?
                }
                None => ResourceContext::new(),
            };

            let decision = service.explain(&action, &resource, &ctx);
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(if decision.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Policy => {
            println!("{}", serde_json::to_string_pretty(policy.as_ref())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Grant { permission } => {
            let grant: Permission = serde_json::from_str(&permission).context("permission is not valid JSON")?;
            let policy = service.upsert_grant(&principal_id, grant).await?;
            println!("{}", serde_json::to_string_pretty(policy.as_ref())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
