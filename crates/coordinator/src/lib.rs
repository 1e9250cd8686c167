//! Single-slot sync queue for the kiosk fleet.
//!
//! At most one kiosk holds the sync slot at a time; everyone else waits in
//! line. A monotonically increasing generation counter versions the slot:
//! advancing it (via [`SyncQueue::finish_sync`]) implicitly destroys every
//! session created under the old generation, so kiosks holding stale queue
//! positions observe `not_queued` and re-request a turn.
//!
//! This queue is the only cross-kiosk shared mutable state in the whole
//! protocol, and it is mutated exclusively through the three operations
//! below, serialized behind one mutex.

mod queue;

pub use queue::{SyncQueue, Turn};
