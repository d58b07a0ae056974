//! Crash-safe persisted state shared by every monitoring task.
//!
//! A single JSON document ([`PersistedState`]) holds alert cooldown
//! timestamps, the traffic accounting baseline and scheduling markers.
//! [`StateStore`] owns it exclusively: every mutation happens under a mutex
//! and is written back with an atomic temp-file + rename before the lock is
//! released.

pub mod document;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use document::{PersistedState, TrafficState};
pub use store::StateStore;
