use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, info};

use kiosksync_protocol::types::SyncStatus;

/// The outcome of a queue operation for one kiosk.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub status: SyncStatus,
    pub generation: u64,
    /// Present when `status` is `Queued`. Best-effort UX only; not a
    /// correctness property under concurrent requests.
    pub position: Option<usize>,
}

struct QueueState {
    generation: u64,
    /// Front of the deque holds the sync slot. Entries always belong to the
    /// current generation: finishing a sync clears the whole line.
    waiting: VecDeque<String>,
}

/// Single-slot sync queue. Thread-safe; every operation takes the one lock.
pub struct SyncQueue {
    state: Mutex<QueueState>,
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                generation: 0,
                waiting: VecDeque::new(),
            }),
        }
    }

    /// Asks for a turn. The first request to find the slot empty is granted
    /// `active`; every other request is enqueued with a position. Re-requests
    /// from an already-listed kiosk are idempotent.
    pub fn request_sync(&self, kiosk_id: &str) -> Turn {
        let mut s = self.state.lock().unwrap();

        let index = match s.waiting.iter().position(|k| k == kiosk_id) {
            Some(index) => index,
            None => {
                s.waiting.push_back(kiosk_id.to_string());
                let index = s.waiting.len() - 1;
                info!(kiosk = kiosk_id, generation = s.generation, index, "sync requested");
                index
            }
        };

        turn_for(index, s.generation)
    }

    /// Non-mutating poll. Kiosks unknown to the current generation get
    /// `not_queued`, signalling that they must re-request a turn.
    pub fn sync_status(&self, kiosk_id: &str) -> Turn {
        let s = self.state.lock().unwrap();
        match s.waiting.iter().position(|k| k == kiosk_id) {
            Some(index) => turn_for(index, s.generation),
            None => Turn {
                status: SyncStatus::NotQueued,
                generation: s.generation,
                position: None,
            },
        }
    }

    /// Releases the slot and advances the generation by exactly one,
    /// regardless of whether the caller's sync succeeded or whether the
    /// caller even held the slot. Every session from the old generation is
    /// destroyed; waiting kiosks will observe `not_queued` and re-request.
    pub fn finish_sync(&self, kiosk_id: &str) -> u64 {
        let mut s = self.state.lock().unwrap();
        if s.waiting.front().map(String::as_str) != Some(kiosk_id) {
            debug!(kiosk = kiosk_id, "finish_sync from a non-active kiosk");
        }
        s.generation += 1;
        s.waiting.clear();
        info!(kiosk = kiosk_id, generation = s.generation, "sync finished, slot released");
        s.generation
    }

    /// Current generation counter.
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }
}

fn turn_for(index: usize, generation: u64) -> Turn {
    if index == 0 {
        Turn {
            status: SyncStatus::Active,
            generation,
            position: None,
        }
    } else {
        Turn {
            status: SyncStatus::Queued,
            generation,
            position: Some(index),
        }
    }
}
