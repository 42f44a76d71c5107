use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use devproxy::{load_config, logger, DevServer};

/// Local development reverse proxy with prefix-based path rewriting
#[derive(Parser, Debug)]
#[command(name = "devproxy", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "devproxy.json")]
    config: PathBuf,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        load_config(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    logger::init_logger(config.log_dir.as_deref());

    let (server, handle) = DevServer::start(&config).await?;
    info!("press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    server.stop();
    let _ = handle.await;

    Ok(())
}
