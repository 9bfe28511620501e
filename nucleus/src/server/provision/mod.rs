//! Provisioning: request → running container.
//!
//! Table-driven, one task per stage:
//!
//! ```text
//! 1. AllocateTask      (CTID + root password)
//! 2. CreateTask        (pct create ... && pct start, identity record)
//! 3. BootWaitTask      (poll pct status until running)
//! 4. PackagesTask      (apt install; omitted when no packages)
//! ```
//!
//! Validation and template resolution happen before the record is
//! persisted, so those failures leave nothing behind. After that a
//! `FailureGuard` marks the record `Failed` on any error. Package failures
//! do not fail the pipeline; they are reported in the outcome.

mod tasks;
mod types;

use std::sync::Arc;

use nucleus_shared::{NucleusError, NucleusResult};
use tokio::sync::Mutex;

use crate::hypervisor::HypervisorTarget;
use crate::metrics::RuntimeMetricsStorage;
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineExecutor, Stage};
use crate::runtime::options::ContainerRequest;
use crate::runtime::rt_impl::RuntimeInner;
use crate::runtime::types::{PackageInstall, ProvisionOutcome};
use crate::server::{LifecycleState, ServerConfig, ServerSpec, ServerState};

use tasks::{AllocateTask, BootWaitTask, CreateTask, PackagesTask};
use types::{ProvisionContext, ProvisionCtx};

fn execution_plan(spec: &ServerSpec) -> ExecutionPlan<ProvisionCtx> {
    let mut stages: Vec<Stage<BoxedTask<ProvisionCtx>>> = vec![
        Stage::sequential(vec![Box::new(AllocateTask)]),
        Stage::sequential(vec![Box::new(CreateTask)]),
        Stage::sequential(vec![Box::new(BootWaitTask)]),
    ];
    if !spec.packages.is_empty() {
        stages.push(Stage::sequential(vec![Box::new(PackagesTask)]));
    }
    ExecutionPlan::new(stages)
}

/// Validate, persist, and run the provisioning pipeline.
///
/// The caller holds the per-name lock for `spec.name`.
pub(crate) async fn provision(
    runtime: &RuntimeInner,
    spec: ServerSpec,
) -> NucleusResult<ProvisionOutcome> {
    if runtime.server_manager.contains(&spec.name)? {
        return Err(NucleusError::Validation(format!(
            "server '{}' already exists",
            spec.name
        )));
    }
    let target = runtime.current_target().await?;

    RuntimeMetricsStorage::incr(&runtime.runtime_metrics.provisions_started);
    runtime.server_manager.register(
        ServerConfig::new(spec.clone(), target.address.clone()),
        ServerState::new(),
    )?;
    tracing::info!(
        server = %spec.name,
        template = %spec.template,
        cores = spec.cores,
        memory_mb = spec.memory_mb,
        disk_gb = spec.disk_gb,
        packages = spec.packages.len(),
        "Provisioning server"
    );

    ProvisionBuilder::new(Arc::clone(runtime), spec, target)
        .build()
        .await
}

/// Sanitize a request without touching the store.
pub(crate) fn prepare(runtime: &RuntimeInner, request: &ContainerRequest) -> NucleusResult<ServerSpec> {
    request.sanitize(&runtime.templates)
}

struct ProvisionBuilder {
    runtime: RuntimeInner,
    spec: ServerSpec,
    target: HypervisorTarget,
}

impl ProvisionBuilder {
    fn new(runtime: RuntimeInner, spec: ServerSpec, target: HypervisorTarget) -> Self {
        Self {
            runtime,
            spec,
            target,
        }
    }

    async fn build(self) -> NucleusResult<ProvisionOutcome> {
        let ProvisionBuilder {
            runtime,
            spec,
            target,
        } = self;

        let plan = execution_plan(&spec);
        let ctx = Arc::new(Mutex::new(ProvisionContext::new(
            Arc::clone(&runtime),
            spec,
            target,
        )));

        let metrics = match PipelineExecutor::execute(plan, Arc::clone(&ctx)).await {
            Ok(metrics) => metrics,
            Err(e) => {
                ctx.lock().await.guard.set_reason(e.to_string());
                return Err(e);
            }
        };

        let mut ctx = ctx.lock().await;
        let name = ctx.spec.name.clone();
        let ctid = ctx
            .ctid
            .ok_or_else(|| NucleusError::Internal("allocate task must run first".into()))?;
        let root_password = ctx
            .root_password
            .take()
            .ok_or_else(|| NucleusError::Internal("allocate task must run first".into()))?;

        runtime
            .server_manager
            .transition(&name, LifecycleState::Running)?;
        ctx.guard.disarm();

        if let PackageInstall::Failed { message } = &ctx.packages {
            RuntimeMetricsStorage::incr(&runtime.runtime_metrics.provisions_partial);
            tracing::warn!(server = %name, ctid = %ctid, error = %message, "Server running but package installation failed");
        } else {
            tracing::info!(
                server = %name,
                ctid = %ctid,
                duration_ms = metrics.total_duration_ms as u64,
                "Server provisioned"
            );
        }

        Ok(ProvisionOutcome {
            name,
            ctid,
            template: ctx.spec.template.clone(),
            hypervisor: ctx.target.address.clone(),
            root_password,
            packages: ctx.packages.clone(),
            status: LifecycleState::Running,
            metrics,
        })
    }
}
