use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use proctabd::config::DEFAULT_CONFIG_PATH;
use proctabd::{Config, ProcessService, ProcfsSource, api};

#[derive(Parser, Debug)]
#[command(version, about = "Serve the local process table over HTTP")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the listen address from the config file
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.api.listen_addr = listen;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let source = ProcfsSource::new().context("failed to initialise procfs source")?;
    let service = ProcessService::new(Arc::new(source), config.snapshot.clone());
    let app = api::router(service);

    let listener = tokio::net::TcpListener::bind(&config.api.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api.listen_addr))?;
    info!(
        "[api] listening on {} (workers={}, timeout_ms={})",
        config.api.listen_addr, config.snapshot.workers, config.snapshot.timeout_ms
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("[api] shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("[api] failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
