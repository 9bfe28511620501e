use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageMetrics {
    pub index: usize,
    pub duration_ms: u128,
    pub tasks: Vec<TaskMetrics>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    pub fn task_duration_ms(&self, name: &str) -> Option<u128> {
        self.tasks()
            .find(|task| task.name == name)
            .map(|task| task.duration_ms)
    }

    /// Every task in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskMetrics> {
        self.stages.iter().flat_map(|stage| stage.tasks.iter())
    }
}
