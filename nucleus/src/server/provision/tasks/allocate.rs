//! Task: pick a CTID and generate the root password.

use async_trait::async_trait;
use nucleus_shared::NucleusResult;
use rand::Rng;
use rand::distr::Alphanumeric;

use super::{ProvisionCtx, task_start};
use crate::pipeline::PipelineTask;

const PASSWORD_LEN: usize = 16;

pub(in crate::server::provision) struct AllocateTask;

#[async_trait]
impl PipelineTask<ProvisionCtx> for AllocateTask {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> NucleusResult<()> {
        let name = task_start(&ctx, self.name()).await;

        let mut ctx = ctx.lock().await;
        let ctid = ctx.runtime.allocator.allocate();
        ctx.ctid = Some(ctid);
        ctx.root_password = Some(generate_password());

        tracing::debug!(server = %name, ctid = %ctid, "Allocated container id");
        Ok(())
    }

    fn name(&self) -> &str {
        "allocate_ctid"
    }
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_shape() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), PASSWORD_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
