use std::time::Instant;

use nucleus_shared::NucleusResult;

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;

/// Ordered stages to run against a shared context.
pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }

    /// Stage-by-stage task names, in execution order.
    pub fn task_names(&self) -> Vec<Vec<&str>> {
        self.stages
            .iter()
            .map(|stage| stage.tasks.iter().map(|t| t.name()).collect())
            .collect()
    }
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Run every stage of `plan` in order.
    ///
    /// `Ctx` is cloned once per task; use shared handles with interior
    /// mutability for anything tasks write.
    pub async fn execute<Ctx>(plan: ExecutionPlan<Ctx>, ctx: Ctx) -> NucleusResult<PipelineMetrics>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::with_capacity(plan.stages.len());

        for (index, stage) in plan.stages.into_iter().enumerate() {
            if stage.tasks.is_empty() {
                continue;
            }

            let stage_start = Instant::now();
            tracing::trace!(stage = index, tasks = stage.tasks.len(), "Running stage");

            let mut tasks = Vec::with_capacity(stage.tasks.len());
            for task in stage.tasks {
                tasks.push(run_timed(task, ctx.clone()).await?);
            }

            stage_metrics.push(StageMetrics {
                index,
                duration_ms: stage_start.elapsed().as_millis(),
                tasks,
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
        })
    }
}

async fn run_timed<Ctx>(task: BoxedTask<Ctx>, ctx: Ctx) -> NucleusResult<TaskMetrics> {
    let name = task.name().to_string();
    let start = Instant::now();
    task.run(ctx).await?;
    let duration_ms = start.elapsed().as_millis();
    tracing::trace!(task = %name, duration_ms = duration_ms as u64, "Task finished");
    Ok(TaskMetrics { name, duration_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineTask;
    use async_trait::async_trait;
    use nucleus_shared::NucleusError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Record {
        name: &'static str,
        delay_ms: u64,
        fail: bool,
    }

    #[async_trait]
    impl PipelineTask<Log> for Record {
        async fn run(self: Box<Self>, ctx: Log) -> NucleusResult<()> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.fail {
                return Err(NucleusError::Internal(format!("{} failed", self.name)));
            }
            ctx.lock().push(self.name.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn task(name: &'static str, delay_ms: u64) -> BoxedTask<Log> {
        Box::new(Record {
            name,
            delay_ms,
            fail: false,
        })
    }

    #[tokio::test]
    async fn test_sequential_order_and_metrics() {
        let log: Log = Default::default();
        let plan = ExecutionPlan::new(vec![
            Stage::sequential(vec![task("a", 0), task("b", 0)]),
            Stage::sequential(vec![task("c", 0)]),
        ]);
        assert_eq!(plan.task_names(), vec![vec!["a", "b"], vec!["c"]]);

        let metrics = PipelineExecutor::execute(plan, log.clone()).await.unwrap();
        assert_eq!(*log.lock(), ["a", "b", "c"]);
        assert_eq!(metrics.stages.len(), 2);
        assert!(metrics.task_duration_ms("c").is_some());
        assert!(metrics.task_duration_ms("zzz").is_none());
    }

    #[tokio::test]
    async fn test_error_aborts_remaining_stages() {
        let log: Log = Default::default();
        let plan = ExecutionPlan::new(vec![
            Stage::sequential(vec![
                task("first", 0),
                Box::new(Record {
                    name: "broken",
                    delay_ms: 0,
                    fail: true,
                }),
            ]),
            Stage::sequential(vec![task("never", 0)]),
        ]);

        let err = PipelineExecutor::execute(plan, log.clone()).await.unwrap_err();
        assert!(err.to_string().contains("broken failed"));
        assert_eq!(*log.lock(), ["first"]);
    }

    #[tokio::test]
    async fn test_empty_stages_are_skipped() {
        let log: Log = Default::default();
        let plan = ExecutionPlan::new(vec![Stage::sequential(vec![]), Stage::sequential(vec![task("x", 0)])]);
        let metrics = PipelineExecutor::execute(plan, log).await.unwrap();
        assert_eq!(metrics.stages.len(), 1);
        assert_eq!(metrics.stages[0].index, 1);
    }
}
