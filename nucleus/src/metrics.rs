//! Runtime-wide counters.
//!
//! All counters are monotonic `AtomicU64`s updated with relaxed ordering;
//! reading them never takes a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RuntimeMetricsStorage {
    pub(crate) provisions_started: AtomicU64,
    pub(crate) provisions_failed: AtomicU64,
    /// Container created but package installation failed.
    pub(crate) provisions_partial: AtomicU64,
    pub(crate) servers_started: AtomicU64,
    pub(crate) servers_stopped: AtomicU64,
    pub(crate) servers_destroyed: AtomicU64,
    /// Shutdown errors ignored while deleting.
    pub(crate) shutdowns_swallowed: AtomicU64,
    pub(crate) commands_executed: AtomicU64,
    pub(crate) commands_failed: AtomicU64,
}

impl RuntimeMetricsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        RuntimeMetrics {
            provisions_started: load(&self.provisions_started),
            provisions_failed: load(&self.provisions_failed),
            provisions_partial: load(&self.provisions_partial),
            servers_started: load(&self.servers_started),
            servers_stopped: load(&self.servers_stopped),
            servers_destroyed: load(&self.servers_destroyed),
            shutdowns_swallowed: load(&self.shutdowns_swallowed),
            commands_executed: load(&self.commands_executed),
            commands_failed: load(&self.commands_failed),
        }
    }
}

/// Point-in-time copy of the runtime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    pub provisions_started: u64,
    pub provisions_failed: u64,
    pub provisions_partial: u64,
    pub servers_started: u64,
    pub servers_stopped: u64,
    pub servers_destroyed: u64,
    pub shutdowns_swallowed: u64,
    pub commands_executed: u64,
    pub commands_failed: u64,
}
