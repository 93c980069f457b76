//! Resource breaker daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   failure reports                       ┌───────────────────────────────┐
//!   ─────────────────▶ admin API ────────▶│ CircuitRegistry               │
//!                      (axum)             │   one actor task per resource │
//!                         │               └──────────────┬────────────────┘
//!                         │                              │ trip
//!                         │ ForceCloseCircuit            ▼
//!                         │               ┌───────────────────────────────┐
//!                         └──────────────▶│ WorkflowRuntime               │
//!                                         │   BreakerWorkflow per resource│
//!                                         │   stop → cooldown → start     │
//!                                         └──────────────┬────────────────┘
//!                                                        │
//!                                                        ▼
//!                                         management plane (HTTP controller)
//!
//!   circuits.json / workflows.json: durable state, replayed on restart
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use resource_breaker::admin::{setup_admin_router, AdminState};
use resource_breaker::config::load_or_default;
use resource_breaker::lifecycle::{self, signals, Shutdown};
use resource_breaker::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "resource-breaker")]
#[command(about = "Adaptive circuit breaker for managed resources", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resource-breaker starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = lifecycle::start(&config)?;

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    signals::spawn_signal_listener(&shutdown);

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(
            AdminState {
                circuits: service.circuits.clone(),
                workflows: service.workflows.clone(),
            },
            &config.admin.api_key,
        );
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;
    } else {
        tracing::info!("Admin API disabled");
        let _ = stop.recv().await;
    }

    tracing::info!(
        active_workflows = service.workflows.active_count(),
        "Shutdown complete"
    );
    Ok(())
}
