//! Provisioning tasks.

mod allocate;
mod boot_wait;
mod create;
mod packages;

pub(super) use allocate::AllocateTask;
pub(super) use boot_wait::BootWaitTask;
pub(super) use create::CreateTask;
pub(super) use packages::PackagesTask;

use nucleus_shared::{NucleusError, NucleusResult};

use super::types::ProvisionCtx;
use crate::hypervisor::Ctid;

/// Log task start and return the server name for later error logging.
pub(super) async fn task_start(ctx: &ProvisionCtx, task_name: &str) -> String {
    let ctx = ctx.lock().await;
    let name = ctx.spec.name.clone();
    tracing::debug!(server = %name, task = task_name, "Task started");
    name
}

/// Log a task failure and keep it as the record's failure reason.
pub(super) async fn log_task_error(ctx: &ProvisionCtx, name: &str, task_name: &str, error: &NucleusError) {
    tracing::error!(server = %name, task = task_name, error = %error, "Task failed");
    ctx.lock().await.guard.set_reason(error.to_string());
}

pub(super) fn require_ctid(ctid: Option<Ctid>) -> NucleusResult<Ctid> {
    ctid.ok_or_else(|| NucleusError::Internal("allocate task must run first".into()))
}
