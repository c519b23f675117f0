use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetrac::config::{self, Config};
use timetrac::store::memory::MemoryStore;
use timetrac::store::postgres::PgStore;
use timetrac::store::TokenLedger;
use timetrac::{api, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "timetrac=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Migrate) => {
            let db = connect_postgres(&cfg, "migrate").await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(cli::Commands::Revoke { token_id }) => {
            let db = connect_postgres(&cfg, "revoke").await?;
            if db.revoke_token(&token_id, Utc::now()).await? {
                println!("Token revoked.");
            } else {
                println!("Token not found.");
            }
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Operator commands act on persistent state, which the in-memory store never has.
async fn connect_postgres(cfg: &Config, command: &str) -> anyhow::Result<PgStore> {
    if cfg.uses_memory_store() {
        anyhow::bail!(
            "`{}` needs a Postgres DATABASE_URL; the in-memory store has nothing to act on",
            command
        );
    }
    PgStore::connect(&cfg.database_url)
        .await
        .context("failed to connect to DATABASE_URL")
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let state = if cfg.uses_memory_store() {
        tracing::warn!("Using in-memory store; nothing will survive a restart");
        AppState::new(cfg, Arc::new(MemoryStore::new()))?
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database_url)
            .await
            .context("failed to connect to DATABASE_URL")?;

        tracing::info!("Running migrations...");
        db.migrate().await?;

        AppState::new(cfg, Arc::new(db))?
    };

    let cors_origin = state.config.cors_origin.clone();
    let app = api::router(Arc::new(state))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("TimeTrac API listening on {} (CORS origin: {})", addr, cors_origin);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
