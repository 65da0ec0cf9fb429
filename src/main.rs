//! Artifact gateway
//!
//! A single stable endpoint in front of heterogeneous backends that all serve
//! the same shared artifact.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                    ARTIFACT GATEWAY                    │
//!                    │                                                        │
//!  Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐        │
//!  ──────────────────┼─▶│   net   │──▶│   http   │──▶│   dispatch   │        │
//!                    │  │listener │   │  server  │   │  dispatcher  │        │
//!                    │  └─────────┘   └──────────┘   └──────┬───────┘        │
//!                    │                                      │ snapshot       │
//!                    │                      ┌───────────────▼──────┐         │
//!                    │                      │ health::Tracker      │◀─ probes│
//!                    │                      │ + load_balancer      │         │
//!                    │                      └───────────────┬──────┘         │
//!                    │                                      ▼                │
//!  Client Response   │                              ┌──────────────┐         │   vm / task / fn
//!  ◀─────────────────┼──────────────────────────────│  forwarder   │◀────────┼── backends
//!                    │                              └──────────────┘         │
//!                    │  admin API (register / deregister / reset), metrics    │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use artifact_gateway::admin::{setup_admin_router, AdminState};
use artifact_gateway::config::loader::{apply_env_overrides, read_config};
use artifact_gateway::config::{validate_config, ConfigError, GatewayConfig};
use artifact_gateway::http::HttpServer;
use artifact_gateway::lifecycle::{shutdown, signals, startup, Shutdown};
use artifact_gateway::net;
use artifact_gateway::observability::{logging, metrics};

const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

#[derive(Parser)]
#[command(name = "artifact-gateway", version)]
#[command(about = "Dispatches requests across heterogeneous backends serving one shared artifact")]
struct Cli {
    /// TOML configuration file; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inbound bind address (overrides config and environment)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    config.observability.json_logs |= cli.json_logs;

    logging::init_logging(&config.observability);

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            tracing::error!(field = %e.field, "{}", e.message);
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "artifact-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        policy = ?config.dispatch.policy,
        static_backends = config.backends.len(),
        health_interval_secs = config.health_check.interval_secs,
        retention_secs = config.tracker.retention_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config.clone())?;
    // Held for the lifetime of the process so manifest changes keep flowing
    let _artifact_watcher = startup::track_expected_version(&config, server.expected_version())?;

    if config.admin.enabled {
        if config.admin.api_key == PLACEHOLDER_API_KEY {
            tracing::warn!("Admin API is using the placeholder API key");
        }
        let listener = net::bind(&config.admin.bind_address, "admin").await?;
        let router = setup_admin_router(AdminState::new(server.tracker(), &config.admin.api_key));
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown::recv(stop))
                .await
            {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    let listener = net::bind(&config.listener.bind_address, "inbound").await?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
