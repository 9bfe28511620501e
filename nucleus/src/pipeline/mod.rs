//! Table-driven task pipeline.
//!
//! ```text
//! ExecutionPlan → Stages → Tasks
//! ```
//!
//! A plan is an ordered list of stages, each an ordered list of tasks. The
//! first task error aborts the plan.
//! Every task is timed and the timings are returned as [`PipelineMetrics`].

mod executor;
mod metrics;
mod stage;
mod task;

pub use executor::{ExecutionPlan, PipelineExecutor};
pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
