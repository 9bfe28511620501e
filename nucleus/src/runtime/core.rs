//! Public runtime handle.

use std::path::Path;
use std::sync::Arc;

use nucleus_shared::NucleusResult;
use tracing::Instrument;

use crate::executor::{self, CommandExecutor};
use crate::hypervisor::console::ConsoleAccess;
use crate::hypervisor::{CtidAllocator, HypervisorInventory, RandomCtidAllocator, StaticInventory};
use crate::init_logging_for;
use crate::metrics::RuntimeMetrics;
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::options::{ContainerRequest, NucleusOptions};
use crate::runtime::rt_impl::{RuntimeInner, RuntimeInnerImpl};
use crate::runtime::types::{
    DeleteOutcome, LifecycleOutcome, ProvisionOutcome, ServerInfo, ServerReport,
};
use crate::server::{lifecycle, provision};

/// Collaborators a runtime talks to.
///
/// [`RuntimeParts::from_options`] builds the production set; embedders and
/// tests can substitute their own executor, inventory, or allocator.
pub struct RuntimeParts {
    pub executor: Arc<dyn CommandExecutor>,
    pub inventory: Arc<dyn HypervisorInventory>,
    pub allocator: Arc<dyn CtidAllocator>,
}

impl RuntimeParts {
    pub fn from_options(options: &NucleusOptions) -> NucleusResult<Self> {
        Ok(Self {
            executor: executor::from_options(&options.executor)?,
            inventory: Arc::new(StaticInventory::new(options.hypervisors.clone())),
            allocator: Arc::new(RandomCtidAllocator),
        })
    }
}

/// Entry point for provisioning and managing servers.
///
/// Only one runtime can use a given home directory at a time; the lock is
/// released when the last clone is dropped. Operations on the same server
/// name are serialized, operations on different names run concurrently.
#[derive(Clone)]
pub struct NucleusRuntime {
    inner: RuntimeInner,
}

impl NucleusRuntime {
    /// Create a runtime with production collaborators and file logging.
    pub fn new(options: NucleusOptions) -> NucleusResult<Self> {
        let layout = FilesystemLayout::new(options.home_dir.clone());
        init_logging_for(&layout, options.log_to_stderr)?;

        let parts = RuntimeParts::from_options(&options)?;
        Self::with_parts(options, parts)
    }

    /// Create a runtime over caller-supplied collaborators. Does not touch
    /// the global tracing subscriber.
    pub fn with_parts(options: NucleusOptions, parts: RuntimeParts) -> NucleusResult<Self> {
        let inner = RuntimeInnerImpl::new(options, parts)?;
        Ok(Self { inner })
    }

    /// Provision a new server.
    ///
    /// Returns an outcome even when package installation failed; check
    /// [`ProvisionOutcome::partial_failure`].
    pub async fn provision(&self, request: ContainerRequest) -> NucleusResult<ProvisionOutcome> {
        let spec = provision::prepare(&self.inner, &request)?;
        let span = operation_span("provision", &spec.name);

        async {
            let _guard = self.inner.name_locks.acquire(&spec.name).await;
            provision::provision(&self.inner, spec).await
        }
        .instrument(span)
        .await
    }

    pub async fn start(&self, name: &str) -> NucleusResult<LifecycleOutcome> {
        async {
            let _guard = self.inner.name_locks.acquire(name).await;
            lifecycle::start(&self.inner, name).await
        }
        .instrument(operation_span("start", name))
        .await
    }

    pub async fn shutdown(&self, name: &str) -> NucleusResult<LifecycleOutcome> {
        async {
            let _guard = self.inner.name_locks.acquire(name).await;
            lifecycle::shutdown(&self.inner, name).await
        }
        .instrument(operation_span("shutdown", name))
        .await
    }

    /// Destroy a server's container and remove its record.
    pub async fn delete(&self, name: &str) -> NucleusResult<DeleteOutcome> {
        async {
            let _guard = self.inner.name_locks.acquire(name).await;
            lifecycle::delete(&self.inner, name).await
        }
        .instrument(operation_span("delete", name))
        .await
    }

    pub async fn open_console(&self, name: &str) -> NucleusResult<ConsoleAccess> {
        async {
            let _guard = self.inner.name_locks.acquire(name).await;
            lifecycle::open_console(&self.inner, name).await
        }
        .instrument(operation_span("console", name))
        .await
    }

    /// Recorded state plus the hypervisor's view. Takes no lock.
    pub async fn inspect(&self, name: &str) -> NucleusResult<ServerReport> {
        lifecycle::inspect(&self.inner, name)
            .instrument(operation_span("inspect", name))
            .await
    }

    /// All recorded servers, newest first.
    pub fn list(&self) -> NucleusResult<Vec<ServerInfo>> {
        self.inner.server_manager.list()
    }

    /// OS keys and the templates they resolve to, sorted by key.
    pub fn templates(&self) -> Vec<(String, String)> {
        self.inner
            .templates
            .iter()
            .map(|(os, template)| (os.to_string(), template.to_string()))
            .collect()
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.inner.runtime_metrics.snapshot()
    }

    pub fn home_dir(&self) -> &Path {
        self.inner.layout.home_dir()
    }
}

fn operation_span(operation: &'static str, name: &str) -> tracing::Span {
    tracing::info_span!(
        "operation",
        op = operation,
        op_id = %uuid::Uuid::new_v4(),
        server = %name
    )
}
