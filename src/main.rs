//! HVAC-PDM server and command-line diagnostics
//!
//! ```text
//! hvac-pdm serve [--addr HOST:PORT]
//! hvac-pdm diagnose <equipment-id> [--preference auto|manual_only|standard_only] [--mode local|ai]
//! hvac-pdm quality <equipment-id>
//! hvac-pdm config
//! ```
//!
//! Global flags: `--db <path>` (sled directory), `--log-json`.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hvac_pdm::api;
use hvac_pdm::config::DiagnosticsConfig;
use hvac_pdm::diagnostics::{AnalysisMode, DiagnoseRequest, DiagnosticService};
use hvac_pdm::llm::{backends_from_config, ModelKind};
use hvac_pdm::orchestrator::DiagnosticOrchestrator;
use hvac_pdm::storage::SledStore;
use hvac_pdm::types::ReadingSourcePreference;

#[derive(Parser, Debug)]
#[command(name = "hvac-pdm")]
#[command(about = "Predictive-maintenance diagnostics for HVAC equipment")]
#[command(version)]
struct CliArgs {
    /// sled database directory (overrides `[storage] path`)
    #[arg(long, global = true, env = "HVAC_PDM_DB")]
    db: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Bind address (overrides `[server] addr`)
        #[arg(long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },
    /// Diagnose one piece of equipment and print the session as JSON
    Diagnose {
        equipment_id: String,
        #[arg(long, default_value = "auto")]
        preference: ReadingSourcePreference,
        #[arg(long, default_value = "local")]
        mode: AnalysisMode,
        /// Restrict AI mode to these models (repeatable)
        #[arg(long = "model")]
        models: Vec<ModelKind>,
    },
    /// Print the data-quality assessment for one piece of equipment
    Quality { equipment_id: String },
    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn build_service(config: Arc<DiagnosticsConfig>, db: Option<String>) -> Result<DiagnosticService> {
    let path = db.unwrap_or_else(|| config.storage.path.clone());
    let store = SledStore::open(&path).with_context(|| format!("opening sled database at {path}"))?;
    info!(path = %path, "Storage opened");

    let backends = backends_from_config(&config.ai);
    let service = DiagnosticService::new(Arc::new(store), Arc::clone(&config));
    if backends.is_empty() {
        warn!("No AI backends configured, AI mode will fall back to the local policy engine");
        return Ok(service);
    }
    info!(models = ?backends.keys().collect::<Vec<_>>(), "AI backends configured");
    Ok(service.with_orchestrator(DiagnosticOrchestrator::new(backends, &config.ai)))
}

async fn serve(service: DiagnosticService, addr: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    axum::serve(listener, api::create_app(service))
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server error");
            anyhow::anyhow!("HTTP server error: {e}")
        })?;
    info!("Graceful shutdown complete");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = Arc::new(DiagnosticsConfig::load());

    match args.command {
        Command::Config => {
            print!("{}", config.to_toml().context("serializing config")?);
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            let service = build_service(Arc::clone(&config), args.db)?;
            serve(service, addr).await?;
        }
        Command::Diagnose { equipment_id, preference, mode, models } => {
            let service = build_service(Arc::clone(&config), args.db)?;
            let session = service
                .diagnose(DiagnoseRequest {
                    equipment_id,
                    source_preference: preference,
                    mode,
                    models: models.into_iter().collect::<BTreeSet<_>>(),
                })
                .await
                .context("diagnosis failed")?;
            print_json(&session)?;
        }
        Command::Quality { equipment_id } => {
            let service = build_service(Arc::clone(&config), args.db)?;
            let assessment = service.data_quality(&equipment_id).context("data-quality assessment failed")?;
            print_json(&assessment)?;
        }
    }
    Ok(())
}
