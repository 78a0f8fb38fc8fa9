//! Persistent coding session timer. Tracks wall-clock time spent in a session,
//! survives process termination by reconstructing elapsed time on restart, and
//! keeps an append-only history of completed sessions for monthly reports.
//!

pub mod cli;
pub mod session;
pub mod utils;
