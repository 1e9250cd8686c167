use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kiosksync_server::{ServerConfig, run};

#[derive(Parser)]
#[command(name = "kiosksync-server", about = "KioskSync admin server", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8750)]
    port: u16,

    /// Directory distributed to kiosks.
    #[arg(long)]
    content_root: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kiosksync=debug")),
        )
        .init();

    let config = ServerConfig {
        bind_addr: cli.bind,
        port: cli.port,
        content_root: cli.content_root,
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_token.cancel();
        }
    });

    if let Err(e) = run(config, shutdown).await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
