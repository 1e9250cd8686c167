//! Kiosk-side sync client.
//!
//! Owns the whole client lifecycle: asking the admin server for a turn,
//! diffing the local inventory against the manifest, pulling changed files
//! through the transfer engine, and releasing the slot. External
//! collaborators interact through two signals only: a sync trigger in and
//! a [`SyncEvent`] stream out.

mod config;
mod coordinator;
mod diff;
mod driver;

pub use config::SyncConfig;
pub use coordinator::{HttpCoordinator, TurnSource};
pub use diff::diff;
pub use driver::{SyncDriver, SyncEvent, SyncHandle, SyncState};

/// Errors produced by the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("inventory error: {0}")]
    Inventory(#[from] kiosksync_inventory::InventoryError),
}
