//! audionote CLI entrypoint

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use audionote::cli::Cli;
use audionote::config;

#[tokio::main]
async fn main() -> Result<()> {
    // Config errors are reported by the command itself
    let cfg = config::config().ok();
    let level = cfg.map(|c| c.log_level.as_str()).unwrap_or("info");

    let file_layer = cfg
        .and_then(|c| c.log_file.as_ref())
        .and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            OpenOptions::new().create(true).append(true).open(path).ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    // Parse and execute CLI
    let cli = Cli::parse();
    cli.execute().await
}
