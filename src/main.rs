//! CipherSwarm server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use cipherswarm::adapters::http::{build_router, AppState};
use cipherswarm::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, PoolConfig, SqliteAgentErrorRepository,
    SqliteAgentRepository, SqliteAttackRepository, SqliteCampaignRepository,
    SqliteCrackRepository, SqliteHashListRepository, SqliteTaskRepository, SqliteZapRepository,
};
use cipherswarm::domain::models::Config;
use cipherswarm::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, CampaignRepository, CrackRepository,
    HashListRepository, TaskRepository, ZapRepository,
};
use cipherswarm::infrastructure::{config::ConfigLoader, logging};
use cipherswarm::services::{
    AgentRegistry, CrackIngestor, EventBus, ProgressReconciler, TaskScheduler, Timekeeper,
};

#[derive(Parser)]
#[command(name = "cipherswarm", version, about = "Distributed password-cracking coordination server")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordination server
    Serve {
        /// Listen address, overriding the configured one
        #[arg(long)]
        host: Option<String>,
        /// Listen port, overriding the configured one
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Migrate => migrate(config).await,
    }
}

async fn migrate(config: Config) -> Result<()> {
    let pool = connect(&config).await?;
    let applied = Migrator::new(pool)
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run database migrations")?;
    println!("applied {applied} migration(s)");
    Ok(())
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    logging::init(&config.logging)?;

    let pool = connect(&config).await?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to run database migrations")?;

    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let attacks: Arc<dyn AttackRepository> = Arc::new(SqliteAttackRepository::new(pool.clone()));
    let campaigns: Arc<dyn CampaignRepository> =
        Arc::new(SqliteCampaignRepository::new(pool.clone()));
    let hash_lists: Arc<dyn HashListRepository> =
        Arc::new(SqliteHashListRepository::new(pool.clone()));
    let cracks: Arc<dyn CrackRepository> = Arc::new(SqliteCrackRepository::new(pool.clone()));
    let zaps: Arc<dyn ZapRepository> = Arc::new(SqliteZapRepository::new(pool.clone()));
    let agent_errors: Arc<dyn AgentErrorRepository> =
        Arc::new(SqliteAgentErrorRepository::new(pool.clone()));

    let events = Arc::new(EventBus::default());
    let scheduler = Arc::new(TaskScheduler::new(
        tasks.clone(),
        agents.clone(),
        attacks.clone(),
        campaigns.clone(),
        hash_lists.clone(),
        agent_errors.clone(),
        events.clone(),
        config.scheduler.clone(),
    ));
    let registry = Arc::new(AgentRegistry::new(
        agents.clone(),
        agent_errors.clone(),
        scheduler.clone(),
        events.clone(),
        &config.scheduler,
    ));
    let reconciler = Arc::new(ProgressReconciler::new(
        tasks.clone(),
        attacks.clone(),
        campaigns.clone(),
        events.clone(),
        config.scheduler.clone(),
    ));
    let ingestor = Arc::new(CrackIngestor::new(
        tasks.clone(),
        attacks.clone(),
        campaigns.clone(),
        hash_lists.clone(),
        cracks,
        zaps,
        scheduler.clone(),
        events.clone(),
    ));
    let timekeeper = Arc::new(Timekeeper::new(
        agents.clone(),
        tasks.clone(),
        attacks.clone(),
        campaigns.clone(),
        agent_errors,
        scheduler.clone(),
        events.clone(),
        config.scheduler.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = timekeeper.clone();
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let state = AppState {
        registry,
        scheduler,
        reconciler,
        ingestor,
        events,
        tasks,
        attacks,
        campaigns,
        hash_lists,
    };
    let app = build_router(state);

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, "cipherswarm server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
    info!("cipherswarm server stopped");
    Ok(())
}

async fn connect(config: &Config) -> Result<sqlx::SqlitePool> {
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    create_pool(&config.database.url, Some(pool_config))
        .await
        .context("Failed to create database pool")
}
