//! Thread-safe server record manager.
//!
//! Keeps an in-memory cache of every record in front of the SQLite store.
//! All mutations are database-first: the store is written before the cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nucleus_shared::{NucleusError, NucleusResult};

use super::config::ServerConfig;
use super::state::{LifecycleState, ServerState};
use crate::db::ServerStore;
use crate::hypervisor::Ctid;
use crate::runtime::types::ServerInfo;

#[derive(Debug, Clone)]
struct CacheEntry {
    config: ServerConfig,
    state: ServerState,
}

/// Cloneable handle shared by the runtime and the lifecycle operations.
#[derive(Clone)]
pub struct ServerManager {
    inner: Arc<RwLock<ServerManagerInner>>,
}

struct ServerManagerInner {
    servers: HashMap<String, CacheEntry>,
    store: ServerStore,
}

impl std::fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerManager").finish()
    }
}

impl ServerManager {
    /// Create a manager and warm the cache from the store.
    pub fn open(store: ServerStore) -> NucleusResult<Self> {
        let servers = store
            .list_all()?
            .into_iter()
            .map(|(config, state)| (config.name.clone(), CacheEntry { config, state }))
            .collect::<HashMap<_, _>>();

        tracing::debug!(count = servers.len(), "Loaded server records");

        Ok(Self {
            inner: Arc::new(RwLock::new(ServerManagerInner { servers, store })),
        })
    }

    fn read(&self) -> NucleusResult<RwLockReadGuard<'_, ServerManagerInner>> {
        self.inner
            .read()
            .map_err(|e| NucleusError::Internal(format!("manager lock poisoned: {}", e)))
    }

    fn write(&self) -> NucleusResult<RwLockWriteGuard<'_, ServerManagerInner>> {
        self.inner
            .write()
            .map_err(|e| NucleusError::Internal(format!("manager lock poisoned: {}", e)))
    }

    /// Register a new server record.
    ///
    /// Fails with `Validation` if the logical name is already recorded.
    pub fn register(&self, config: ServerConfig, state: ServerState) -> NucleusResult<()> {
        let mut inner = self.write()?;

        if inner.servers.contains_key(&config.name) {
            return Err(NucleusError::Validation(format!(
                "server '{}' already exists",
                config.name
            )));
        }

        inner.store.save(&config, &state)?;

        tracing::debug!(server = %config.name, status = %state.status, "Registered server");
        inner
            .servers
            .insert(config.name.clone(), CacheEntry { config, state });
        Ok(())
    }

    pub fn get(&self, name: &str) -> NucleusResult<Option<(ServerConfig, ServerState)>> {
        Ok(self
            .read()?
            .servers
            .get(name)
            .map(|e| (e.config.clone(), e.state.clone())))
    }

    pub fn contains(&self, name: &str) -> NucleusResult<bool> {
        Ok(self.read()?.servers.contains_key(name))
    }

    /// Recorded CTID for `name`, if any.
    pub fn recorded_ctid(&self, name: &str) -> NucleusResult<Option<Ctid>> {
        Ok(self
            .read()?
            .servers
            .get(name)
            .and_then(|e| e.state.ctid))
    }

    /// Apply `mutate` to a copy of the state, persist it, then cache it.
    ///
    /// Returns `Ok(None)` when no record exists for `name`.
    fn update(
        &self,
        name: &str,
        mutate: impl FnOnce(&mut ServerState) -> NucleusResult<()>,
    ) -> NucleusResult<Option<ServerState>> {
        let mut inner = self.write()?;

        let Some(entry) = inner.servers.get(name) else {
            return Ok(None);
        };
        let mut state = entry.state.clone();
        mutate(&mut state)?;

        inner.store.update_state(name, &state)?;

        if let Some(entry) = inner.servers.get_mut(name) {
            entry.state = state.clone();
        }
        Ok(Some(state))
    }

    /// Strict transition used by provisioning. Illegal moves are rejected.
    pub fn transition(&self, name: &str, next: LifecycleState) -> NucleusResult<()> {
        let updated = self.update(name, |state| {
            if !state.status.can_transition_to(next) {
                return Err(NucleusError::InvalidState(format!(
                    "server '{}' cannot move from {} to {}",
                    name, state.status, next
                )));
            }
            tracing::debug!(server = %name, from = %state.status, to = %next, "State transition");
            state.set_status(next);
            Ok(())
        })?;

        updated
            .map(|_| ())
            .ok_or_else(|| NucleusError::NotFound(name.to_string()))
    }

    /// Record a state observed on the hypervisor.
    ///
    /// Live truth wins over the recorded state: an illegal move is logged and
    /// applied anyway. Returns `false` when there is no record for `name`
    /// (containers created outside this orchestrator).
    pub fn observe(&self, name: &str, next: LifecycleState) -> NucleusResult<bool> {
        let updated = self.update(name, |state| {
            if !state.status.can_transition_to(next) {
                tracing::warn!(
                    server = %name,
                    recorded = %state.status,
                    observed = %next,
                    "Recorded state out of date, reconciling"
                );
            }
            state.set_status(next);
            if next != LifecycleState::Failed {
                state.last_error = None;
            }
            Ok(())
        })?;
        Ok(updated.is_some())
    }

    /// Write the identity record.
    pub fn record_ctid(&self, name: &str, ctid: Ctid) -> NucleusResult<()> {
        let updated = self.update(name, |state| {
            state.set_ctid(ctid);
            Ok(())
        })?;
        updated
            .map(|_| ())
            .ok_or_else(|| NucleusError::NotFound(name.to_string()))
    }

    /// Mark a record failed. Missing records are ignored.
    pub fn mark_failed(&self, name: &str, message: &str) -> NucleusResult<()> {
        self.update(name, |state| {
            state.mark_failed(message);
            Ok(())
        })?;
        Ok(())
    }

    /// Remove a record. Returns it if it existed.
    pub fn remove(&self, name: &str) -> NucleusResult<Option<(ServerConfig, ServerState)>> {
        let mut inner = self.write()?;

        inner.store.delete(name)?;

        let removed = inner.servers.remove(name).map(|e| (e.config, e.state));
        if removed.is_some() {
            tracing::debug!(server = %name, "Removed server record");
        }
        Ok(removed)
    }

    /// All records, newest first.
    pub fn list(&self) -> NucleusResult<Vec<ServerInfo>> {
        let inner = self.read()?;
        let mut infos: Vec<ServerInfo> = inner
            .servers
            .values()
            .map(|e| ServerInfo::new(&e.config, &e.state))
            .collect();
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::server::ServerSpec;
    use nucleus_shared::ErrorKind;
    use tempfile::TempDir;

    fn create_manager(dir: &TempDir) -> ServerManager {
        let db = Database::open(&dir.path().join("nucleus.db")).unwrap();
        ServerManager::open(ServerStore::new(db)).unwrap()
    }

    fn create_config(name: &str) -> ServerConfig {
        ServerConfig::new(
            ServerSpec {
                name: name.to_string(),
                os: "debian".into(),
                template: "local:vztmpl/debian-12-standard_12.7-1_amd64.tar.zst".into(),
                cores: 1,
                memory_mb: 512,
                disk_gb: 8,
                packages: Default::default(),
            },
            "10.0.0.5",
        )
    }

    #[test]
    fn test_register_and_get() {
        let dir = TempDir::new().unwrap();
        let manager = create_manager(&dir);
        manager.register(create_config("web"), ServerState::new()).unwrap();

        let (config, state) = manager.get("web").unwrap().unwrap();
        assert_eq!(config.spec.memory_mb, 512);
        assert_eq!(state.status, LifecycleState::Requested);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let dir = TempDir::new().unwrap();
        let manager = create_manager(&dir);
        manager.register(create_config("web"), ServerState::new()).unwrap();

        let err = manager
            .register(create_config("web"), ServerState::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_strict_transition_rejects_illegal_move() {
        let dir = TempDir::new().unwrap();
        let manager = create_manager(&dir);
        manager.register(create_config("web"), ServerState::new()).unwrap();

        let err = manager.transition("web", LifecycleState::Running).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        manager.transition("web", LifecycleState::Provisioning).unwrap();
        manager.transition("web", LifecycleState::Running).unwrap();
        assert_eq!(
            manager.get("web").unwrap().unwrap().1.status,
            LifecycleState::Running
        );
    }

    #[test]
    fn test_observe_reconciles() {
        let dir = TempDir::new().unwrap();
        let manager = create_manager(&dir);
        manager.register(create_config("web"), ServerState::new()).unwrap();

        // Requested -> Stopped is not a legal move but the hypervisor says so.
        assert!(manager.observe("web", LifecycleState::Stopped).unwrap());
        assert_eq!(
            manager.get("web").unwrap().unwrap().1.status,
            LifecycleState::Stopped
        );
        assert!(!manager.observe("ghost", LifecycleState::Running).unwrap());
    }

    #[test]
    fn test_record_ctid_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let manager = create_manager(&dir);
            manager.register(create_config("web"), ServerState::new()).unwrap();
            manager.record_ctid("web", Ctid::new(412)).unwrap();
            manager.mark_failed("web", "boot timed out").unwrap();
        }

        let manager = create_manager(&dir);
        assert_eq!(manager.recorded_ctid("web").unwrap(), Some(Ctid::new(412)));
        let (_, state) = manager.get("web").unwrap().unwrap();
        assert_eq!(state.status, LifecycleState::Failed);
        assert_eq!(state.last_error.as_deref(), Some("boot timed out"));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let manager = create_manager(&dir);
        manager.register(create_config("web"), ServerState::new()).unwrap();

        assert!(manager.remove("web").unwrap().is_some());
        assert!(manager.remove("web").unwrap().is_none());
        assert!(!manager.contains("web").unwrap());
        assert!(manager.list().unwrap().is_empty());
    }
}
