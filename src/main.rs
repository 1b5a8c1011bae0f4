use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use schemacraft_api::config::{self, Environment};
use schemacraft_api::database::DatabaseManager;
use schemacraft_api::{app, AppState};

#[derive(Debug, Parser)]
#[command(name = "schemacraft-api", version, about = "Schema-driven CRUD and auth over your own MongoDB")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Interface to bind (overrides SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Run against in-process storage instead of MongoDB
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up MONGODB_URI, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("schemacraft_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = config::config().clone();
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if settings.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }
    if settings.environment == Environment::Production && settings.security.jwt_secret.len() < 32 {
        tracing::warn!("JWT_SECRET is shorter than 32 characters");
    }
    tracing::info!("Starting SchemaCraft API in {:?} mode", settings.environment);

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = if cli.in_memory {
        tracing::warn!("Running with in-memory storage, nothing will be persisted");
        AppState::in_memory(settings)
    } else {
        let manager = DatabaseManager::new(&settings.database);
        let platform = manager
            .platform_store(&settings.database)
            .await
            .context("failed to connect the platform database")?;
        AppState::new(Arc::new(settings), Arc::new(platform), Arc::new(manager))
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("🚀 SchemaCraft API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
