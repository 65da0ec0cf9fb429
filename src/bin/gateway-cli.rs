use clap::{Parser, Subcommand};
use serde::Serialize;

use artifact_gateway::admin::handlers::RegisterRequest;
use artifact_gateway::admin::AdminClient;
use artifact_gateway::{BackendKind, ColdStartClass};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the artifact gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and readiness counts
    Status,
    /// List backends with readiness, weight and latency
    Backends,
    /// Register a backend by hand
    Register {
        id: String,
        #[arg(value_enum)]
        kind: BackendKind,
        /// host:port
        address: String,
        /// Derived from the kind when omitted
        #[arg(long, value_enum)]
        cold_start: Option<ColdStartClass>,
    },
    /// Remove a backend
    Deregister { id: String },
    /// Return an ejected backend to unknown
    Reset { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = AdminClient::new(&cli.url, &cli.key);

    match cli.command {
        Commands::Status => print_json(&client.status().await?)?,
        Commands::Backends => print_json(&client.backends().await?)?,
        Commands::Register {
            id,
            kind,
            address,
            cold_start,
        } => {
            let response = client
                .register(&RegisterRequest {
                    id,
                    kind,
                    address,
                    cold_start_class: cold_start,
                })
                .await?;
            print_json(&response)?;
        }
        Commands::Deregister { id } => {
            client.deregister(&id).await?;
            println!("Backend '{}' deregistered", id);
        }
        Commands::Reset { id } => print_json(&client.reset(&id).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
