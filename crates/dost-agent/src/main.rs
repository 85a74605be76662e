//! # dost-agent
//!
//! DOST server binary: loads settings, installs logging and metrics, wires
//! the in-process collaborators and serves HTTP + `WebSocket` until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dost_server::AppState;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// DOST personal assistant server.
#[derive(Parser, Debug)]
#[command(name = "dost", about = "DOST personal assistant server")]
struct Cli {
    /// Settings file (defaults to `~/.dost/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings.unwrap_or_else(dost_settings::settings_path);
    let mut settings = dost_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    let settings = dost_settings::init_settings(settings);

    dost_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    let metrics = match dost_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(error) => {
            tracing::warn!(%error, "metrics recorder not installed, /metrics will be empty");
            None
        }
    };

    let state = AppState::in_process(&settings, metrics);
    let learning = state.learning.clone();

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        addr = %listener.local_addr().context("Failed to read bound address")?,
        "DOST server listening"
    );

    dost_server::serve(listener, state, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await
    .context("Server error")?;

    learning.cleanup();
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_defer_to_settings() {
        let cli = Cli::parse_from(["dost"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.settings.is_none());
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from(["dost", "--host", "0.0.0.0", "--port", "8080", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
    }
}
