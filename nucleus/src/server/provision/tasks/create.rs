//! Task: create and start the container.
//!
//! One `pct create ... && pct start` invocation. On success the CTID is
//! written to the identity record before anything else runs, so a later
//! delete can find the container even if provisioning fails afterwards.
//! A failed create is not retried with another CTID.

use async_trait::async_trait;
use nucleus_shared::NucleusResult;

use super::{ProvisionCtx, log_task_error, require_ctid, task_start};
use crate::hypervisor::command::{self, CreateSpec};
use crate::pipeline::PipelineTask;
use crate::server::LifecycleState;

pub(in crate::server::provision) struct CreateTask;

#[async_trait]
impl PipelineTask<ProvisionCtx> for CreateTask {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> NucleusResult<()> {
        let task_name = self.name();
        let name = task_start(&ctx, task_name).await;

        let result = run_create(&ctx, &name).await;
        if let Err(e) = &result {
            log_task_error(&ctx, &name, task_name, e).await;
        }
        result
    }

    fn name(&self) -> &str {
        "create_container"
    }
}

async fn run_create(ctx: &ProvisionCtx, name: &str) -> NucleusResult<()> {
    let (runtime, target, ctid, create) = {
        let ctx = ctx.lock().await;
        let ctid = require_ctid(ctx.ctid)?;
        let password = ctx.root_password.as_deref().unwrap_or_default();
        let create = command::create(&CreateSpec {
            ctid,
            template: &ctx.spec.template,
            hostname: &ctx.spec.name,
            cores: ctx.spec.cores,
            memory_mb: ctx.spec.memory_mb,
            disk_gb: ctx.spec.disk_gb,
            storage: &ctx.runtime.options.rootfs_storage,
            root_password: password,
            network: &ctx.runtime.options.network,
        });
        (ctx.runtime.clone(), ctx.target.clone(), ctid, create)
    };

    runtime
        .server_manager
        .transition(name, LifecycleState::Provisioning)?;
    runtime.run_remote(&target, &create).await?;
    runtime.server_manager.record_ctid(name, ctid)?;

    tracing::info!(server = %name, ctid = %ctid, "Container created");
    Ok(())
}
