//! Task: install the selected packages in one batched command.
//!
//! A failure here does not fail the pipeline. The container is already up,
//! so the failure is recorded in the context and surfaces as a partial
//! provision.

use async_trait::async_trait;
use nucleus_shared::NucleusResult;

use super::{ProvisionCtx, require_ctid, task_start};
use crate::hypervisor::command;
use crate::pipeline::PipelineTask;
use crate::runtime::types::PackageInstall;

pub(in crate::server::provision) struct PackagesTask;

#[async_trait]
impl PipelineTask<ProvisionCtx> for PackagesTask {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> NucleusResult<()> {
        let name = task_start(&ctx, self.name()).await;

        let (runtime, target, ctid, count, install) = {
            let ctx = ctx.lock().await;
            let ctid = require_ctid(ctx.ctid)?;
            (
                ctx.runtime.clone(),
                ctx.target.clone(),
                ctid,
                ctx.spec.packages.len(),
                command::install_packages(ctid, &ctx.spec.packages),
            )
        };
        let Some(install) = install else {
            return Ok(());
        };

        let result = match runtime.run_remote(&target, &install).await {
            Ok(_) => {
                tracing::info!(server = %name, ctid = %ctid, count, "Installed packages");
                PackageInstall::Installed { count }
            }
            Err(e) => {
                tracing::warn!(server = %name, ctid = %ctid, error = %e, "Package installation failed");
                PackageInstall::Failed {
                    message: e.to_string(),
                }
            }
        };

        ctx.lock().await.packages = result;
        Ok(())
    }

    fn name(&self) -> &str {
        "install_packages"
    }
}
