//! Provisioning context and failure guard.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::hypervisor::{Ctid, HypervisorTarget};
use crate::metrics::RuntimeMetricsStorage;
use crate::runtime::rt_impl::RuntimeInner;
use crate::runtime::types::PackageInstall;
use crate::server::ServerSpec;

pub(crate) type ProvisionCtx = Arc<Mutex<ProvisionContext>>;

/// Marks the record `Failed` if provisioning does not complete.
///
/// Armed from the moment the record is persisted. Covers both task errors
/// and the provisioning future being dropped. Nothing on the hypervisor is
/// rolled back.
pub(crate) struct FailureGuard {
    runtime: RuntimeInner,
    name: String,
    reason: Option<String>,
    armed: bool,
}

impl FailureGuard {
    pub(crate) fn new(runtime: RuntimeInner, name: String) -> Self {
        Self {
            runtime,
            name,
            reason: None,
            armed: true,
        }
    }

    /// Record why provisioning is about to fail.
    pub(crate) fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FailureGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let reason = self
            .reason
            .take()
            .unwrap_or_else(|| "provisioning aborted".to_string());
        tracing::warn!(server = %self.name, reason = %reason, "Provisioning failed");

        if let Err(e) = self.runtime.server_manager.mark_failed(&self.name, &reason) {
            tracing::warn!(server = %self.name, error = %e, "Failed to record provisioning failure");
        }
        RuntimeMetricsStorage::incr(&self.runtime.runtime_metrics.provisions_failed);
    }
}

/// State shared by the provisioning tasks.
pub(crate) struct ProvisionContext {
    pub runtime: RuntimeInner,
    pub spec: ServerSpec,
    pub target: HypervisorTarget,
    pub guard: FailureGuard,
    /// Set by the allocate task.
    pub ctid: Option<Ctid>,
    /// Set by the allocate task. Never logged.
    pub root_password: Option<String>,
    pub packages: PackageInstall,
}

impl ProvisionContext {
    pub(crate) fn new(runtime: RuntimeInner, spec: ServerSpec, target: HypervisorTarget) -> Self {
        let guard = FailureGuard::new(runtime.clone(), spec.name.clone());
        Self {
            runtime,
            spec,
            target,
            guard,
            ctid: None,
            root_password: None,
            packages: PackageInstall::Skipped,
        }
    }
}
