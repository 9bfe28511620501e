use std::sync::Arc;

use nucleus_shared::{NucleusError, NucleusResult};
use tokio::time::Instant;

use crate::db::{Database, ServerStore};
use crate::executor::{CommandExecutor, CommandOutput};
use crate::hypervisor::command::{self, RemoteCommand};
use crate::hypervisor::{
    ContainerStatus, Ctid, CtidAllocator, HypervisorInventory, HypervisorTarget, TemplateCatalog,
};
use crate::metrics::RuntimeMetricsStorage;
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::lock::RuntimeLock;
use crate::runtime::locks::NameLocks;
use crate::runtime::options::{NucleusOptions, WaitOptions};
use crate::runtime::RuntimeParts;
use crate::server::ServerManager;

/// Shared runtime state. Cloning the handle is cheap.
pub type RuntimeInner = Arc<RuntimeInnerImpl>;

/// Everything the lifecycle operations need.
///
/// Collaborators and configuration are immutable after construction. The
/// server manager and name locks synchronize internally; metrics are atomic.
pub struct RuntimeInnerImpl {
    pub(crate) server_manager: ServerManager,
    pub(crate) name_locks: NameLocks,

    pub(crate) executor: Arc<dyn CommandExecutor>,
    pub(crate) inventory: Arc<dyn HypervisorInventory>,
    pub(crate) allocator: Arc<dyn CtidAllocator>,
    pub(crate) templates: TemplateCatalog,
    pub(crate) options: NucleusOptions,
    pub(crate) layout: FilesystemLayout,
    pub(crate) runtime_metrics: RuntimeMetricsStorage,

    /// Held for the runtime's lifetime so two processes never share a home.
    _runtime_lock: RuntimeLock,
}

impl RuntimeInnerImpl {
    pub(crate) fn new(options: NucleusOptions, parts: RuntimeParts) -> NucleusResult<RuntimeInner> {
        options.sanitize()?;
        let templates = TemplateCatalog::with_extra(&options.templates)?;

        let layout = FilesystemLayout::new(options.home_dir.clone());
        layout.prepare().map_err(|e| {
            NucleusError::Storage(format!(
                "failed to initialize {}: {}",
                layout.home_dir().display(),
                e
            ))
        })?;

        let runtime_lock = RuntimeLock::acquire(&layout.lock_path())?;

        let db = Database::open(&layout.db_path())?;
        let server_manager = ServerManager::open(ServerStore::new(db))?;

        tracing::debug!(
            home = %layout.home_dir().display(),
            executor = parts.executor.name(),
            "Initialized runtime"
        );

        Ok(Arc::new(Self {
            server_manager,
            name_locks: NameLocks::new(),
            executor: parts.executor,
            inventory: parts.inventory,
            allocator: parts.allocator,
            templates,
            options,
            layout,
            runtime_metrics: RuntimeMetricsStorage::new(),
            _runtime_lock: runtime_lock,
        }))
    }

    /// The hypervisor every operation runs against.
    pub(crate) async fn current_target(&self) -> NucleusResult<HypervisorTarget> {
        self.inventory.current().await
    }

    /// Execute one command, counting it and mapping failures.
    ///
    /// Errors and logs carry the redacted command line only.
    pub(crate) async fn run_remote(
        &self,
        target: &HypervisorTarget,
        command: &RemoteCommand,
    ) -> NucleusResult<CommandOutput> {
        RuntimeMetricsStorage::incr(&self.runtime_metrics.commands_executed);
        tracing::debug!(
            kind = command.kind().as_str(),
            host = %target.ssh_host(),
            command = %command,
            "Executing remote command"
        );

        match self.executor.execute(target, command.line()).await {
            Ok(output) => Ok(output),
            Err(e) => {
                RuntimeMetricsStorage::incr(&self.runtime_metrics.commands_failed);
                tracing::debug!(kind = command.kind().as_str(), error = %e, "Remote command failed");
                Err(NucleusError::remote(command.to_string(), e.to_string()))
            }
        }
    }

    /// Fetch the container listing once.
    pub(crate) async fn listing(&self, target: &HypervisorTarget) -> NucleusResult<String> {
        Ok(self.run_remote(target, &command::list()).await?.stdout)
    }

    pub(crate) async fn live_status(
        &self,
        target: &HypervisorTarget,
        ctid: Ctid,
    ) -> NucleusResult<ContainerStatus> {
        let output = self.run_remote(target, &command::status(ctid)).await?;
        Ok(ContainerStatus::parse(&output.stdout))
    }

    /// Poll `pct status` until `ready` holds or the wait times out.
    ///
    /// Status query failures count as "not yet"; the last one is included in
    /// the timeout message.
    pub(crate) async fn wait_for_status(
        &self,
        target: &HypervisorTarget,
        ctid: Ctid,
        wait: &WaitOptions,
        ready: fn(&ContainerStatus) -> bool,
        what: &str,
    ) -> NucleusResult<()> {
        let deadline = Instant::now() + wait.timeout();
        let mut last = String::from("no status yet");

        loop {
            match self.live_status(target, ctid).await {
                Ok(status) if ready(&status) => {
                    tracing::debug!(ctid = %ctid, ?status, "Container reached {}", what);
                    return Ok(());
                }
                Ok(status) => last = format!("last status {:?}", status),
                Err(e) => last = e.to_string(),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(NucleusError::Timeout(format!(
                    "container {} did not reach {} within {}ms ({})",
                    ctid, what, wait.timeout_ms, last
                )));
            }
            tokio::time::sleep(wait.interval().min(deadline - now)).await;
        }
    }
}
