//! soundsketch-engine - prompt-to-soundscape service
//!
//! Resolves free-text prompts into ambient sound tags, selects candidate
//! recordings from the search collaborator, and serves the resulting
//! scene over HTTP.

use anyhow::Result;
use clap::Parser;
use soundsketch_common::config::TomlConfig;
use soundsketch_engine::AppState;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "soundsketch-engine", version, about = "Prompt-to-soundscape engine")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite cache database
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting soundsketch-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TomlConfig::load(args.config.as_deref())?;

    let db_path = match args.database {
        Some(path) => path,
        None => default_database_path()?,
    };
    info!("Database: {}", db_path.display());

    let db_pool = soundsketch_engine::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(db_pool, config)?;
    if state.llm.is_none() {
        info!("No language model configured; tag resolution uses the rules tier");
    }

    let app = soundsketch_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Platform data directory fallback for the cache database.
fn default_database_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("cannot determine platform data directory"))?;
    Ok(dir.join("soundsketch").join("cache.db"))
}
