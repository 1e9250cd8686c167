use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kiosksync_client::{HttpCoordinator, SyncConfig, SyncDriver, SyncEvent};
use kiosksync_transfer::HttpFileSource;

#[derive(Parser)]
#[command(name = "kiosksyncd", about = "KioskSync kiosk daemon", version)]
struct Cli {
    /// Admin server base URL, e.g. http://10.0.0.5:8750.
    #[arg(long)]
    server_url: String,

    /// Stable identity of this kiosk.
    #[arg(long)]
    kiosk_id: String,

    /// Directory kept in sync with the admin's content.
    #[arg(long)]
    sync_root: PathBuf,

    /// Extra paths (relative to the sync root) excluded from syncing.
    #[arg(long)]
    exclude: Vec<String>,
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

    let mut config = SyncConfig::new(&cli.server_url, &cli.kiosk_id, &cli.sync_root);
    config.excludes = cli.exclude;

    let turns = match HttpCoordinator::new(&config.server_url, &config.kiosk_id, config.retry.clone()) {
        Ok(turns) => turns,
        Err(e) => {
            error!(error = %e, "cannot build coordinator client");
            std::process::exit(1);
        }
    };
    let source = match HttpFileSource::new(&config.server_url, &config.kiosk_id) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot build file source");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let mut handle = SyncDriver::new(config, turns, source).spawn(shutdown.clone());

    // Sync once at startup; external collaborators trigger later syncs.
    handle.trigger_sync();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                shutdown.cancel();
                break;
            }
            event = handle.next_event() => match event {
                Some(SyncEvent::Completed { files_transferred }) => {
                    info!(files_transferred, "sync completed");
                }
                Some(SyncEvent::Failed { reason }) => {
                    error!(reason = %reason, "sync failed");
                }
                Some(SyncEvent::StateChanged { from, to }) => {
                    info!(?from, ?to, "sync state changed");
                }
                None => break,
            }
        }
    }

    handle.join().await;
}
