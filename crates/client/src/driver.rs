//! Sync driver: the kiosk-side session state machine.
//!
//! One background task drives one session at a time through
//! `Idle → RequestingTurn → Queued → Active → Diffing → Transferring →
//! Finishing → Idle`. A per-tick stall watchdog compares the shared
//! [`StallClock`] against the configured threshold; expiry drops all
//! in-memory session state (on-disk `.temp` sidecars survive for resume)
//! and re-enters `RequestingTurn`. That watchdog is the only cancellation
//! path; individual file failures never abort a session.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kiosksync_inventory::{Inventory, InventoryConfig, InventoryManager};
use kiosksync_protocol::types::SyncStatus;
use kiosksync_transfer::{FileSource, StallClock, TransferEngine};

use crate::config::SyncConfig;
use crate::coordinator::TurnSource;
use crate::diff::diff;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Where the driver currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    RequestingTurn,
    Queued,
    Active,
    Diffing,
    Transferring,
    Finishing,
    Stalled,
}

/// Events emitted to external collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    StateChanged { from: SyncState, to: SyncState },
    Completed { files_transferred: usize },
    Failed { reason: String },
}

/// Handle to a spawned driver: trigger syncs, consume events.
pub struct SyncHandle {
    trigger: mpsc::Sender<()>,
    events: mpsc::Receiver<SyncEvent>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Requests a sync. A no-op while a session is already running.
    pub fn trigger_sync(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Next event, or `None` once the driver has shut down.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Waits for the driver task to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

struct Session {
    generation: u64,
    wanted: Vec<(String, String)>,
    transferred: usize,
    failed: usize,
}

pub struct SyncDriver<T: TurnSource, S: FileSource> {
    config: SyncConfig,
    turns: T,
    inventory: InventoryManager,
    engine: TransferEngine<S>,
    clock: StallClock,
    state: SyncState,
    session: Option<Session>,
    last_poll: Option<Instant>,
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl<T, S> SyncDriver<T, S>
where
    T: TurnSource + 'static,
    S: FileSource + 'static,
{
    pub fn new(config: SyncConfig, turns: T, source: S) -> Self {
        let clock = StallClock::new();
        let inventory = InventoryManager::new(
            config.sync_root.clone(),
            config.sync_root.join(&config.cache_file),
            InventoryConfig {
                excludes: config.all_excludes(),
                ..InventoryConfig::default()
            },
        );
        let engine = TransferEngine::new(
            source,
            config.sync_root.clone(),
            config.transfer.clone(),
            clock.clone(),
        );
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            turns,
            inventory,
            engine,
            clock,
            state: SyncState::Idle,
            session: None,
            last_poll: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Spawns the driver task.
    pub fn spawn(mut self, shutdown: CancellationToken) -> SyncHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let events = self
            .events_rx
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1);
        let task = tokio::spawn(async move { self.run(trigger_rx, shutdown).await });
        SyncHandle {
            trigger: trigger_tx,
            events,
            task,
        }
    }

    async fn run(&mut self, mut trigger: mpsc::Receiver<()>, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        info!(kiosk = %self.config.kiosk_id, "sync driver running");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(()) = trigger.recv() => self.on_trigger(),
                _ = tick.tick() => {
                    if self.state == SyncState::Idle {
                        continue;
                    }
                    let watchdog = self.clock.clone();
                    let limit = self.config.stall_timeout;
                    tokio::select! {
                        _ = stalled(watchdog, limit) => self.hard_reset(),
                        _ = self.step() => {}
                    }
                }
            }
        }

        info!("sync driver stopped");
    }

    fn on_trigger(&mut self) {
        if self.state == SyncState::Idle {
            self.clock.touch();
            self.set_state(SyncState::RequestingTurn);
        } else {
            debug!(state = ?self.state, "sync trigger ignored, session in progress");
        }
    }

    /// Hard session reset: the only path that discards in-memory progress.
    fn hard_reset(&mut self) {
        warn!(
            state = ?self.state,
            idle = ?self.clock.idle_for(),
            "no progress within stall threshold, resetting session"
        );
        self.set_state(SyncState::Stalled);
        self.session = None;
        self.clock.touch();
        self.set_state(SyncState::RequestingTurn);
    }

    async fn step(&mut self) {
        match self.state {
            SyncState::Idle | SyncState::Stalled => {}
            SyncState::RequestingTurn => self.step_requesting().await,
            SyncState::Queued => self.step_queued().await,
            SyncState::Active => self.set_state(SyncState::Diffing),
            SyncState::Diffing => self.step_diffing().await,
            SyncState::Transferring => self.step_transferring().await,
            SyncState::Finishing => self.step_finishing().await,
        }
    }

    async fn step_requesting(&mut self) {
        if !self.should_poll() {
            return;
        }
        match self.turns.request_sync().await {
            Ok(turn) => {
                self.clock.touch();
                self.session = Some(Session {
                    generation: turn.generation,
                    wanted: Vec::new(),
                    transferred: 0,
                    failed: 0,
                });
                match turn.status {
                    SyncStatus::Active => {
                        info!(generation = turn.generation, "sync slot granted");
                        self.set_state(SyncState::Active);
                    }
                    SyncStatus::Queued => {
                        info!(
                            generation = turn.generation,
                            position = ?turn.position,
                            "queued for sync slot"
                        );
                        self.set_state(SyncState::Queued);
                    }
                    SyncStatus::NotQueued => {
                        // Should not happen on request; re-request next tick.
                        warn!("request_sync answered not_queued");
                    }
                }
            }
            Err(e) => warn!(error = %e, "turn request failed"),
        }
    }

    async fn step_queued(&mut self) {
        if !self.should_poll() {
            return;
        }
        match self.turns.sync_status().await {
            Ok(turn) => {
                self.clock.touch();
                match turn.status {
                    SyncStatus::Active => {
                        info!(generation = turn.generation, "promoted to sync slot");
                        if let Some(session) = &mut self.session {
                            session.generation = turn.generation;
                        }
                        self.set_state(SyncState::Active);
                    }
                    SyncStatus::Queued => {
                        debug!(position = ?turn.position, "still queued");
                    }
                    SyncStatus::NotQueued => {
                        // Generation advanced under us; the old session is
                        // gone, so get back in line.
                        info!(generation = turn.generation, "session invalidated, re-requesting turn");
                        self.session = None;
                        self.set_state(SyncState::RequestingTurn);
                    }
                }
            }
            Err(e) => warn!(error = %e, "status poll failed"),
        }
    }

    async fn step_diffing(&mut self) {
        let manifest: Inventory = match self.turns.manifest().await {
            Ok(manifest) => {
                self.clock.touch();
                manifest
            }
            Err(e) => {
                warn!(error = %e, "manifest fetch failed");
                return;
            }
        };

        // Cheap diff against the cached inventory first; only a non-empty
        // result pays for the full re-hash, which then filters stale-cache
        // false positives before any transfer.
        let cheap = diff(&self.inventory.cached(), &manifest);
        let wanted = if cheap.is_empty() {
            cheap
        } else {
            let progress_clock = self.clock.clone();
            match self
                .inventory
                .full_inventory_with_progress(move || progress_clock.touch())
                .await
            {
                Ok(local) => {
                    self.clock.touch();
                    diff(&local, &manifest)
                }
                Err(e) => {
                    warn!(error = %e, "inventory pass failed");
                    return;
                }
            }
        };

        info!(files = wanted.len(), "diff complete");
        let pairs: Vec<(String, String)> = wanted
            .into_iter()
            .filter_map(|path| manifest.get(&path).map(|hash| (path, hash.clone())))
            .collect();

        if let Some(session) = &mut self.session {
            session.wanted = pairs;
        }
        if self.session.as_ref().is_some_and(|s| s.wanted.is_empty()) {
            self.set_state(SyncState::Finishing);
        } else {
            self.set_state(SyncState::Transferring);
        }
    }

    async fn step_transferring(&mut self) {
        let Some(session) = &self.session else {
            self.set_state(SyncState::Finishing);
            return;
        };
        let wanted = session.wanted.clone();

        let outcome = self
            .engine
            .transfer(&wanted, |file| {
                if let Err(e) = self.inventory.record(&file.path, &file.hash) {
                    warn!(path = %file.path, error = %e, "inventory record failed");
                }
            })
            .await;

        info!(
            transferred = outcome.transferred.len(),
            failed = outcome.failed.len(),
            "transfer round complete"
        );
        for (path, reason) in &outcome.failed {
            warn!(path = %path, reason = %reason, "file not transferred");
        }

        if let Some(session) = &mut self.session {
            session.transferred = outcome.transferred.len();
            session.failed = outcome.failed.len();
        }
        self.set_state(SyncState::Finishing);
    }

    async fn step_finishing(&mut self) {
        let session_generation = self.session.as_ref().map(|s| s.generation).unwrap_or(0);
        // Always release the slot, success or not, so one kiosk's bad sync
        // cannot deadlock the fleet queue.
        match self.turns.finish_sync().await {
            Ok(generation) => {
                self.clock.touch();
                debug!(session_generation, generation, "sync slot released");
            }
            Err(e) => warn!(error = %e, "finish_sync failed, releasing locally anyway"),
        }

        let (transferred, failed) = self
            .session
            .as_ref()
            .map(|s| (s.transferred, s.failed))
            .unwrap_or((0, 0));
        self.session = None;
        self.set_state(SyncState::Idle);

        // Terminal event goes out after the Idle transition, so a collaborator
        // reacting to it can trigger the next sync immediately.
        if failed == 0 {
            info!(files = transferred, "sync complete");
            self.emit(SyncEvent::Completed {
                files_transferred: transferred,
            });
        } else {
            self.emit(SyncEvent::Failed {
                reason: format!("{failed} files failed to transfer"),
            });
        }
    }

    /// Throttles network polls in the waiting states to the poll interval.
    fn should_poll(&mut self) -> bool {
        let due = self
            .last_poll
            .is_none_or(|last| last.elapsed() >= self.config.poll_interval);
        if due {
            self.last_poll = Some(Instant::now());
        }
        due
    }

    fn set_state(&mut self, to: SyncState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        debug!(?from, ?to, "state change");
        self.state = to;
        self.last_poll = None;
        self.emit(SyncEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SyncEvent) {
        // Collaborators may lag or be absent; events are best-effort.
        let _ = self.events_tx.try_send(event);
    }
}

/// Resolves once the clock has been idle for `limit`.
async fn stalled(clock: StallClock, limit: std::time::Duration) {
    loop {
        let idle = clock.idle_for();
        if idle >= limit {
            return;
        }
        tokio::time::sleep(limit - idle).await;
    }
}
