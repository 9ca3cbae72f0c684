use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobboard_api::config::{self, AppConfig};
use jobboard_api::database::{DatabaseManager, PgStore};
use jobboard_api::routes::{app, AppState};

#[derive(Parser)]
#[command(name = "jobboard-api")]
#[command(about = "Job board API server")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve,
    #[command(about = "Apply pending database migrations and exit")]
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, NEXTAUTH_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = config::config().clone();
    tracing::info!("Starting Job Board API in {:?} mode", config.environment);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = DatabaseManager::connect_lazy(&config.database)?;
            DatabaseManager::migrate(&pool).await?;
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("NEXTAUTH_SECRET is not set; login and protected routes will answer 503");
    }

    let pool = DatabaseManager::connect_lazy(&config.database)?;
    if config.database.auto_migrate {
        DatabaseManager::migrate(&pool).await?;
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("jobboard-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::new(config, Arc::new(PgStore::new(pool)), http);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Job Board API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
