//! Task: wait until the new container reports `running`.

use async_trait::async_trait;
use nucleus_shared::NucleusResult;

use super::{ProvisionCtx, log_task_error, require_ctid, task_start};
use crate::hypervisor::ContainerStatus;
use crate::pipeline::PipelineTask;

pub(in crate::server::provision) struct BootWaitTask;

#[async_trait]
impl PipelineTask<ProvisionCtx> for BootWaitTask {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> NucleusResult<()> {
        let task_name = self.name();
        let name = task_start(&ctx, task_name).await;

        let (runtime, target, ctid) = {
            let ctx = ctx.lock().await;
            (ctx.runtime.clone(), ctx.target.clone(), require_ctid(ctx.ctid)?)
        };

        let wait = runtime.options.boot_wait;
        if let Err(e) = runtime
            .wait_for_status(&target, ctid, &wait, ContainerStatus::is_running, "running")
            .await
        {
            log_task_error(&ctx, &name, task_name, &e).await;
            return Err(e);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "boot_wait"
    }
}
