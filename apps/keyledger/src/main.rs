use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use keyledger_admin::admin_router;
use keyledger_core::EntityStore;
use keyledger_storage::{SeaOrmStorage, Storage};
use tracing::{info, warn};

mod cli;
mod data_dir;
mod dsn;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("keyledger failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Cli::parse().into_config()?;
    info!(
        host = %config.host,
        port = config.port,
        dsn = %config.dsn,
        data_dir = %config.data_dir,
        admin_key_set = config.admin_key.is_some(),
        "config loaded"
    );

    let storage = SeaOrmStorage::connect(&config.dsn).await?;
    info!(dsn = %config.dsn, "db connected");
    storage.sync().await?;

    let store = Arc::new(EntityStore::load(Arc::new(storage)).await?);
    let app = admin_router(store, config.admin_key.clone());

    let bind = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keyledger=info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
