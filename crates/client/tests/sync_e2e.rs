//! End-to-end sync against a real in-process admin server.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use kiosksync_client::{HttpCoordinator, SyncConfig, SyncDriver, SyncEvent, SyncHandle};
use kiosksync_server::AppState;
use kiosksync_transfer::{HttpFileSource, RetryPolicy, TransferConfig};

/// Serves `content_root` on an ephemeral port, returning the base URL.
async fn start_server(content_root: &TempDir, shutdown: CancellationToken) -> String {
    let state = Arc::new(AppState::new(content_root.path().to_path_buf()));
    let app = kiosksync_server::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });

    format!("http://{addr}")
}

fn start_kiosk(server_url: &str, kiosk_root: &TempDir, shutdown: CancellationToken) -> SyncHandle {
    let mut config = SyncConfig::new(server_url, "kiosk-e2e", kiosk_root.path());
    config.tick_interval = Duration::from_millis(10);
    config.poll_interval = Duration::from_millis(10);
    config.stall_timeout = Duration::from_secs(20);
    config.retry = RetryPolicy::new(2, Duration::from_millis(10));
    config.transfer = TransferConfig {
        // Low threshold so the streamed path is exercised with small fixtures.
        large_file_threshold: 1024,
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..TransferConfig::default()
    };

    let turns = HttpCoordinator::new(server_url, "kiosk-e2e", config.retry.clone()).unwrap();
    let source = HttpFileSource::new(server_url, "kiosk-e2e").unwrap();
    SyncDriver::new(config, turns, source).spawn(shutdown)
}

async fn run_one_sync(handle: &mut SyncHandle) -> SyncEvent {
    handle.trigger_sync();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match handle.next_event().await {
                Some(event @ (SyncEvent::Completed { .. } | SyncEvent::Failed { .. })) => {
                    return event;
                }
                Some(_) => {}
                None => panic!("driver exited early"),
            }
        }
    })
    .await
    .expect("sync did not finish in time")
}

#[tokio::test]
async fn fresh_kiosk_pulls_everything_then_nothing() {
    let admin = TempDir::new().unwrap();
    std::fs::write(admin.path().join("hint01.txt"), b"look under the clock").unwrap();
    std::fs::create_dir_all(admin.path().join("video")).unwrap();
    // Over the lowered threshold: takes the streamed, resumable path. The
    // .mp4 extension also keeps it out of zlib compression.
    let big: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(admin.path().join("video/intro.mp4"), &big).unwrap();

    let shutdown = CancellationToken::new();
    let server_url = start_server(&admin, shutdown.clone()).await;

    let kiosk = TempDir::new().unwrap();
    let mut handle = start_kiosk(&server_url, &kiosk, shutdown.clone());

    let first = run_one_sync(&mut handle).await;
    assert_eq!(first, SyncEvent::Completed { files_transferred: 2 });
    assert_eq!(
        std::fs::read(kiosk.path().join("hint01.txt")).unwrap(),
        b"look under the clock"
    );
    assert_eq!(std::fs::read(kiosk.path().join("video/intro.mp4")).unwrap(), big);
    assert!(!kiosk.path().join("video/intro.mp4.temp").exists());

    // Second sync finds the kiosk current.
    let second = run_one_sync(&mut handle).await;
    assert_eq!(second, SyncEvent::Completed { files_transferred: 0 });

    shutdown.cancel();
    handle.join().await;
}

#[tokio::test]
async fn changed_admin_file_is_redelivered() {
    let admin = TempDir::new().unwrap();
    std::fs::write(admin.path().join("hint.txt"), b"version one").unwrap();

    let shutdown = CancellationToken::new();
    let server_url = start_server(&admin, shutdown.clone()).await;

    let kiosk = TempDir::new().unwrap();
    let mut handle = start_kiosk(&server_url, &kiosk, shutdown.clone());

    let first = run_one_sync(&mut handle).await;
    assert_eq!(first, SyncEvent::Completed { files_transferred: 1 });

    std::fs::write(admin.path().join("hint.txt"), b"version two, longer").unwrap();

    let second = run_one_sync(&mut handle).await;
    assert_eq!(second, SyncEvent::Completed { files_transferred: 1 });
    assert_eq!(
        std::fs::read(kiosk.path().join("hint.txt")).unwrap(),
        b"version two, longer"
    );

    shutdown.cancel();
    handle.join().await;
}

#[tokio::test]
async fn partial_download_resumes_against_real_server() {
    let admin = TempDir::new().unwrap();
    let big: Vec<u8> = (0..8000u32).map(|i| (i % 249) as u8).collect();
    std::fs::write(admin.path().join("big.bin"), &big).unwrap();

    let shutdown = CancellationToken::new();
    let server_url = start_server(&admin, shutdown.clone()).await;

    let kiosk = TempDir::new().unwrap();
    // Pre-seed a sidecar as if an earlier session died mid-stream.
    std::fs::write(kiosk.path().join("big.bin.temp"), &big[..3000]).unwrap();

    let mut handle = start_kiosk(&server_url, &kiosk, shutdown.clone());
    let event = run_one_sync(&mut handle).await;
    assert_eq!(event, SyncEvent::Completed { files_transferred: 1 });
    assert_eq!(std::fs::read(kiosk.path().join("big.bin")).unwrap(), big);

    shutdown.cancel();
    handle.join().await;
}
