use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// StallClock
// ---------------------------------------------------------------------------

/// Timestamp of the most recent successful operation.
///
/// Touched on every successful network call, hash, and file write; the sync
/// driver's stall watchdog compares against it once per tick and forces a
/// hard session reset when it falls too far behind.
#[derive(Clone)]
pub struct StallClock {
    last_ok: Arc<Mutex<Instant>>,
}

impl Default for StallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StallClock {
    pub fn new() -> Self {
        Self {
            last_ok: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Records a successful operation at the current instant.
    pub fn touch(&self) {
        *self.last_ok.lock().unwrap() = Instant::now();
    }

    /// Time elapsed since the last successful operation.
    pub fn idle_for(&self) -> Duration {
        self.last_ok.lock().unwrap().elapsed()
    }
}

// ---------------------------------------------------------------------------
// ThroughputMeter
// ---------------------------------------------------------------------------

/// Sliding-window throughput meter behind the periodic download logs.
///
/// Owned by a single download loop, so no interior locking; one chunk is
/// recorded per stream read and the rate is read out once per log line.
pub struct ThroughputMeter {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

/// Retention cap, in case chunks arrive much faster than the window drains.
const MAX_SAMPLES: usize = 256;

impl ThroughputMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Records `bytes` received at the current instant and drops samples
    /// that have aged out of the window.
    pub fn record(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back((now, bytes));

        if let Some(cutoff) = now.checked_sub(self.window) {
            while self.samples.front().is_some_and(|(at, _)| *at < cutoff) {
                self.samples.pop_front();
            }
        }
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Bytes per second across the retained samples, or 0.0 until two
    /// samples exist. The first sample only anchors the span; its bytes
    /// arrived before the measured interval started.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let span = last.duration_since(*first);
        if span.is_zero() {
            return 0.0;
        }
        let received: u64 = self.samples.iter().skip(1).map(|(_, b)| b).sum();
        received as f64 / span.as_secs_f64()
    }
}
