//! Server records and the orchestration that drives them.
//!
//! - `config` / `state`: the immutable and mutable halves of a record
//! - `manager`: cached, database-first record access
//! - `provision`: the create pipeline
//! - `lifecycle`: start, shutdown, delete, console, inspect

mod config;
pub(crate) mod lifecycle;
mod manager;
pub(crate) mod provision;
mod state;

pub use config::{ServerConfig, ServerSpec};
pub use manager::ServerManager;
pub use state::{LifecycleState, ServerState};

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::executor::scripted::ScriptedExecutor;
    use crate::hypervisor::ctid::FixedCtidAllocator;
    use crate::hypervisor::{Ctid, HypervisorTarget, StaticInventory};
    use crate::runtime::RuntimeParts;
    use crate::runtime::options::{NucleusOptions, WaitOptions};
    use crate::runtime::rt_impl::{RuntimeInner, RuntimeInnerImpl};

    /// Fixed CTID handed out by [`TestRuntime`].
    pub const TEST_CTID: u32 = 412;

    /// Runtime over a temp home, a scripted executor, and millisecond waits.
    pub struct TestRuntime {
        pub inner: RuntimeInner,
        pub executor: Arc<ScriptedExecutor>,
        _home: TempDir,
    }

    impl TestRuntime {
        pub fn new(executor: ScriptedExecutor) -> Self {
            let home = TempDir::new().unwrap();
            let executor = Arc::new(executor);
            let options = NucleusOptions {
                home_dir: PathBuf::from(home.path()),
                hypervisors: vec![HypervisorTarget::new("https://10.0.0.5:8006", "root", "pw")],
                boot_wait: WaitOptions {
                    poll_interval_ms: 5,
                    timeout_ms: 50,
                },
                shutdown_wait: WaitOptions {
                    poll_interval_ms: 5,
                    timeout_ms: 50,
                },
                ..Default::default()
            };
            let parts = RuntimeParts {
                executor: executor.clone(),
                inventory: Arc::new(StaticInventory::new(options.hypervisors.clone())),
                allocator: Arc::new(FixedCtidAllocator(TEST_CTID)),
            };
            let inner = RuntimeInnerImpl::new(options, parts).unwrap();
            Self {
                inner,
                executor,
                _home: home,
            }
        }
    }

    /// Insert a `Running` record, optionally with an identity record.
    pub fn register_running(rt: &RuntimeInnerImpl, name: &str, ctid: Option<u32>) {
        let spec = ServerSpec {
            name: name.to_string(),
            os: "ubuntu".into(),
            template: "local:vztmpl/ubuntu-22.04-standard_22.04-1_amd64.tar.zst".into(),
            cores: 1,
            memory_mb: 512,
            disk_gb: 8,
            packages: Default::default(),
        };
        let mut state = ServerState::new();
        state.set_status(LifecycleState::Running);
        if let Some(id) = ctid {
            state.set_ctid(Ctid::new(id));
        }
        rt.server_manager
            .register(ServerConfig::new(spec, "10.0.0.5"), state)
            .unwrap();
    }
}
