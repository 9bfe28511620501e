use async_trait::async_trait;
use nucleus_shared::NucleusResult;

/// One unit of work in a pipeline.
#[async_trait]
pub trait PipelineTask<Ctx>: Send + Sync {
    async fn run(self: Box<Self>, ctx: Ctx) -> NucleusResult<()>;

    /// Name used in logs and metrics.
    fn name(&self) -> &str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
