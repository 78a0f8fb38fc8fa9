//! Session persistence and recovery.
//! The basic idea is:
//!  - One durable record mirrors the in-memory session state and is overwritten
//!    whole on every transition.
//!  - On startup the record is loaded; a `is_running` flag means the previous
//!    process ended mid-session and the whole gap counts as tracked time.
//!  - Completed sessions are appended to a JSON-lines ledger that reports are
//!    derived from.

pub mod entities;
pub mod history;
pub mod store;
pub mod tracker;

use anyhow::Result;

use crate::utils::{
    clock::Clock,
    paths::AppPaths,
};

use self::{history::HistoryLedgerImpl, store::SessionStoreImpl, tracker::Tracker};

/// Wires a tracker to the file-backed store and ledger under `paths`.
pub fn create_tracker(
    paths: &AppPaths,
    clock: impl Clock,
) -> Result<Tracker<SessionStoreImpl, HistoryLedgerImpl>> {
    let store = SessionStoreImpl::new(paths.session_file());
    let ledger = HistoryLedgerImpl::new(paths.history_file());
    Ok(Tracker::new(store, ledger, Box::new(clock)))
}
