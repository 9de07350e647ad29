//! # lebensmittel-backend
//!
//! Backend binary: loads settings, opens the record store and starts the
//! HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lebensmittel_core::logging::{LogFormat, init_subscriber};
use lebensmittel_server::shutdown::ShutdownOutcome;
use lebensmittel_server::{JwtValidator, LebensmittelServer, ServerConfig, metrics};
use lebensmittel_settings::Settings;
use lebensmittel_store::{ConnectionConfig, Store};

const DEFAULT_SECRET: &str = "your-secret-key-here";

/// Lebensmittel household backend.
#[derive(Parser, Debug)]
#[command(name = "lebensmittel-backend", about = "Lebensmittel household backend")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database, or `:memory:` (overrides settings).
    #[arg(long)]
    db_path: Option<String>,

    /// Settings file (default: `~/.lebensmittel/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => lebensmittel_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => lebensmittel_settings::load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.db_path {
            settings.database.path.clone_from(path);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    if path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Open the store and build a server from `settings`. Does not bind.
fn build_server(settings: &Settings) -> Result<LebensmittelServer> {
    ensure_parent_dir(&settings.database.path)?;
    let store = Store::open(
        &settings.database.path,
        &ConnectionConfig {
            pool_size: settings.database.pool_size,
            ..ConnectionConfig::default()
        },
    )
    .context("Failed to open database")?;

    if settings.auth.secret_key == DEFAULT_SECRET {
        tracing::warn!("using the default token secret; set SECRET_KEY in production");
    }
    let validator = JwtValidator::new(&settings.auth.secret_key, settings.auth.leeway_secs);
    Ok(LebensmittelServer::new(
        ServerConfig::from(settings),
        store,
        Arc::new(validator),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );

    let mut server = build_server(&settings)?;
    match metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let addr = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Lebensmittel backend listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    match server.shutdown().graceful_shutdown(None).await {
        ShutdownOutcome::Drained => tracing::info!("Shutdown complete"),
        ShutdownOutcome::TimedOut => tracing::warn!("Shutdown timed out, remaining tasks aborted"),
    }
    Ok(())
}
