//! Reference backend: serves the shared artifact over HTTP on one port.

use std::path::PathBuf;

use clap::Parser;

use artifact_gateway::admin::handlers::RegisterRequest;
use artifact_gateway::admin::AdminClient;
use artifact_gateway::artifact::host::host_router;
use artifact_gateway::artifact::ArtifactWatcher;
use artifact_gateway::config::schema::ObservabilityConfig;
use artifact_gateway::lifecycle::{shutdown, signals, Shutdown};
use artifact_gateway::observability::logging;
use artifact_gateway::{net, BackendKind, ColdStartClass};

#[derive(Parser)]
#[command(name = "artifact-host")]
#[command(about = "Serves the shared artifact and announces itself to the gateway", long_about = None)]
struct Cli {
    /// Manifest on shared storage
    #[arg(short, long, default_value = "/mnt/artifacts/artifact.toml")]
    manifest: PathBuf,

    /// The single listener this backend binds
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Health path; defaults to the manifest's, then /health
    #[arg(long)]
    health_path: Option<String>,

    /// Stable backend identifier
    #[arg(long, default_value = "artifact-host")]
    id: String,

    #[arg(long, value_enum, default_value_t = BackendKind::PersistentInstance)]
    kind: BackendKind,

    #[arg(long, value_enum)]
    cold_start: Option<ColdStartClass>,

    /// Address announced to the gateway; defaults to the bound address
    #[arg(long)]
    advertise: Option<String>,

    /// Gateway admin API to announce to, e.g. http://gateway:8081
    #[arg(long)]
    gateway: Option<String>,

    #[arg(long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&ObservabilityConfig {
        log_level: cli.log_level.clone(),
        ..ObservabilityConfig::default()
    });

    let (watcher, mut updates) = ArtifactWatcher::new(&cli.manifest)?;
    let artifact = watcher.current();
    let _watch = watcher.run()?;
    tokio::spawn(async move {
        while let Some(reference) = updates.recv().await {
            tracing::info!(version = %reference.version, "Serving new artifact version");
        }
    });

    {
        let loaded = artifact.load();
        tracing::info!(name = %loaded.name, version = %loaded.version, module = ?loaded.module_path, "Artifact loaded");
    }

    let listener = net::bind(&cli.bind, "artifact").await?;
    let advertise = match cli.advertise {
        Some(address) => address,
        None => listener.local_addr()?.to_string(),
    };
    let app = host_router(artifact, cli.health_path.as_deref(), &cli.id);

    let gateway = cli.gateway.as_deref().map(|url| AdminClient::new(url, &cli.key));
    if let Some(client) = &gateway {
        let request = RegisterRequest {
            id: cli.id.clone(),
            kind: cli.kind,
            address: advertise.clone(),
            cold_start_class: cli.cold_start,
        };
        match client.register(&request).await {
            Ok(response) => tracing::info!(id = %response.id, outcome = ?response.outcome, "Announced to gateway"),
            Err(e) => tracing::warn!(error = %e, "Failed to announce to gateway; relying on static config"),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::recv(shutdown.subscribe()))
        .await?;

    // Best effort: the gateway demotes silent backends on its own
    if let Some(client) = &gateway {
        if let Err(e) = client.deregister(&cli.id).await {
            tracing::warn!(error = %e, "Failed to withdraw from gateway");
        }
    }

    tracing::info!("artifact-host stopped");
    Ok(())
}
