//! Operations on existing servers: start, shutdown, delete, console, inspect.
//!
//! Each operation fetches the hypervisor listing once, resolves the logical
//! name to a CTID, and then issues the commands for that container. Callers
//! hold the per-name lock for the duration of a mutating operation.

use nucleus_shared::{NucleusError, NucleusResult};

use crate::hypervisor::command;
use crate::hypervisor::console::{ConsoleAccess, console_url};
use crate::hypervisor::locator::{self, LocateSource, Located};
use crate::hypervisor::{ContainerStatus, HypervisorTarget};
use crate::metrics::RuntimeMetricsStorage;
use crate::runtime::rt_impl::RuntimeInnerImpl;
use crate::runtime::types::{DeleteOutcome, LifecycleOutcome, ServerReport};
use crate::server::LifecycleState;

/// Resolve `name` against a fresh listing.
///
/// A name match that disagrees with the identity record rewrites the record
/// so later operations find the container directly.
async fn locate(
    rt: &RuntimeInnerImpl,
    target: &HypervisorTarget,
    name: &str,
) -> NucleusResult<Option<Located>> {
    let listing = rt.listing(target).await?;
    let recorded = rt.server_manager.recorded_ctid(name)?;
    let located = locator::resolve(&listing, name, recorded);

    if let Some(found) = located
        && found.source == LocateSource::NameMatch
        && rt.server_manager.contains(name)?
    {
        tracing::info!(server = %name, ctid = %found.ctid, "Reconciled identity record from listing");
        rt.server_manager.record_ctid(name, found.ctid)?;
    }

    Ok(located)
}

async fn locate_required(
    rt: &RuntimeInnerImpl,
    target: &HypervisorTarget,
    name: &str,
) -> NucleusResult<Located> {
    locate(rt, target, name)
        .await?
        .ok_or_else(|| NucleusError::ContainerNotFound(name.to_string()))
}

/// Start a container. A failed command marks the record `Failed`.
pub(crate) async fn start(rt: &RuntimeInnerImpl, name: &str) -> NucleusResult<LifecycleOutcome> {
    let target = rt.current_target().await?;
    let located = locate_required(rt, &target, name).await?;

    if let Err(e) = rt.run_remote(&target, &command::start(located.ctid)).await {
        rt.server_manager.mark_failed(name, &e.to_string())?;
        return Err(e);
    }

    let recorded = rt.server_manager.observe(name, LifecycleState::Running)?;
    RuntimeMetricsStorage::incr(&rt.runtime_metrics.servers_started);
    tracing::info!(server = %name, ctid = %located.ctid, "Started server");

    Ok(LifecycleOutcome {
        name: name.to_string(),
        ctid: located.ctid,
        status: LifecycleState::Running,
        located_by: located.source,
        recorded,
    })
}

/// Graceful shutdown. A failed command marks the record `Failed`.
pub(crate) async fn shutdown(rt: &RuntimeInnerImpl, name: &str) -> NucleusResult<LifecycleOutcome> {
    let target = rt.current_target().await?;
    let located = locate_required(rt, &target, name).await?;

    let recorded = rt.server_manager.observe(name, LifecycleState::ShuttingDown)?;

    if let Err(e) = rt.run_remote(&target, &command::shutdown(located.ctid)).await {
        rt.server_manager.mark_failed(name, &e.to_string())?;
        return Err(e);
    }

    rt.server_manager.observe(name, LifecycleState::Stopped)?;
    RuntimeMetricsStorage::incr(&rt.runtime_metrics.servers_stopped);
    tracing::info!(server = %name, ctid = %located.ctid, "Stopped server");

    Ok(LifecycleOutcome {
        name: name.to_string(),
        ctid: located.ctid,
        status: LifecycleState::Stopped,
        located_by: located.source,
        recorded,
    })
}

/// Tear a server down.
///
/// A missing container is not an error: the record is removed and nothing is
/// issued. Otherwise a graceful shutdown is attempted (its failure is logged
/// and ignored), then the container is destroyed with force. Destroy failure
/// is fatal and keeps the record, marked `Failed`.
pub(crate) async fn delete(rt: &RuntimeInnerImpl, name: &str) -> NucleusResult<DeleteOutcome> {
    let target = rt.current_target().await?;

    let Some(located) = locate(rt, &target, name).await? else {
        let record_removed = rt.server_manager.remove(name)?.is_some();
        tracing::info!(server = %name, record_removed, "No container found, removed record only");
        return Ok(DeleteOutcome {
            name: name.to_string(),
            ctid: None,
            record_removed,
            shutdown_error: None,
        });
    };
    let ctid = located.ctid;

    rt.server_manager.observe(name, LifecycleState::Destroying)?;

    let shutdown_error = match rt.run_remote(&target, &command::shutdown(ctid)).await {
        Ok(_) => {
            let wait = rt.options.shutdown_wait;
            if let Err(e) = rt
                .wait_for_status(&target, ctid, &wait, ContainerStatus::is_stopped, "stopped")
                .await
            {
                tracing::warn!(server = %name, ctid = %ctid, error = %e, "Container did not stop in time, destroying anyway");
            }
            None
        }
        Err(e) => {
            RuntimeMetricsStorage::incr(&rt.runtime_metrics.shutdowns_swallowed);
            tracing::warn!(server = %name, ctid = %ctid, error = %e, "Graceful shutdown failed, destroying anyway");
            Some(e.to_string())
        }
    };

    if let Err(e) = rt.run_remote(&target, &command::destroy(ctid, true)).await {
        rt.server_manager.mark_failed(name, &e.to_string())?;
        tracing::error!(server = %name, ctid = %ctid, error = %e, "Destroy failed");
        return Err(e);
    }

    let record_removed = rt.server_manager.remove(name)?.is_some();
    RuntimeMetricsStorage::incr(&rt.runtime_metrics.servers_destroyed);
    tracing::info!(server = %name, ctid = %ctid, "Destroyed server");

    Ok(DeleteOutcome {
        name: name.to_string(),
        ctid: Some(ctid),
        record_removed,
        shutdown_error,
    })
}

/// Console URL for a server.
///
/// The node name comes from `hostname` on the hypervisor; when that fails the
/// bare hypervisor address stands in.
pub(crate) async fn open_console(rt: &RuntimeInnerImpl, name: &str) -> NucleusResult<ConsoleAccess> {
    let target = rt.current_target().await?;
    let located = locate_required(rt, &target, name).await?;
    let address = target.ssh_host();

    let node = match rt.run_remote(&target, &command::hostname()).await {
        Ok(output) if !output.stdout.trim().is_empty() => Some(output.stdout.trim().to_string()),
        Ok(_) => {
            tracing::warn!(server = %name, "Empty node hostname, using hypervisor address");
            None
        }
        Err(e) => {
            tracing::warn!(server = %name, error = %e, "Node hostname lookup failed, using hypervisor address");
            None
        }
    };
    let node_resolved = node.is_some();
    let node = node.unwrap_or_else(|| address.clone());

    let port = target.api_port().unwrap_or(rt.options.console_port);
    let url = console_url(&address, port, located.ctid, name, &node)?;

    Ok(ConsoleAccess {
        name: name.to_string(),
        ctid: located.ctid,
        node,
        node_resolved,
        url: url.to_string(),
    })
}

/// Recorded state plus live status. Read-only.
pub(crate) async fn inspect(rt: &RuntimeInnerImpl, name: &str) -> NucleusResult<ServerReport> {
    let target = rt.current_target().await?;
    let record = rt
        .server_manager
        .get(name)?
        .map(|(config, state)| crate::runtime::types::ServerInfo::new(&config, &state));

    let listing = rt.listing(&target).await?;
    let located = locator::resolve(&listing, name, record.as_ref().and_then(|r| r.ctid));

    if record.is_none() && located.is_none() {
        return Err(NucleusError::ContainerNotFound(name.to_string()));
    }

    let live_status = match located {
        Some(found) => Some(rt.live_status(&target, found.ctid).await?),
        None => None,
    };

    Ok(ServerReport {
        name: name.to_string(),
        record,
        ctid: located.map(|l| l.ctid),
        located_by: located.map(|l| l.source),
        live_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::scripted::ScriptedExecutor;
    use crate::hypervisor::Ctid;
    use crate::server::testing::{TestRuntime, register_running};
    use nucleus_shared::ErrorKind;

    const LISTING: &str = "\
VMID       Status     Lock         Name
101        running                 app-server
205        running                 app-server-backup
";

    #[tokio::test]
    async fn test_start_locates_first_match() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));

        let outcome = start(&rt.inner, "app-server").await.unwrap();
        assert_eq!(outcome.ctid, Ctid::new(101));
        assert_eq!(outcome.located_by, LocateSource::NameMatch);
        assert!(!outcome.recorded);
        assert_eq!(rt.executor.calls(), ["pct list", "pct start 101"]);
    }

    #[tokio::test]
    async fn test_start_not_found_issues_nothing() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));

        let err = start(&rt.inner, "cache").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
        assert_eq!(rt.executor.count_prefix("pct start"), 0);
    }

    #[tokio::test]
    async fn test_start_failure_marks_failed() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .fail("pct start", "CT 101 is locked (backup)"),
        );
        register_running(&rt.inner, "app-server", Some(101));
        rt.inner
            .server_manager
            .observe("app-server", LifecycleState::Stopped)
            .unwrap();

        let err = start(&rt.inner, "app-server").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteExecution);
        let (_, state) = rt.inner.server_manager.get("app-server").unwrap().unwrap();
        assert_eq!(state.status, LifecycleState::Failed);
        assert!(state.last_error.unwrap().contains("locked"));
        assert_eq!(rt.inner.runtime_metrics.snapshot().servers_started, 0);
    }

    #[tokio::test]
    async fn test_start_failure_without_record() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .fail("pct start", "CT 101 is locked"),
        );

        let err = start(&rt.inner, "app-server").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteExecution);
        assert!(!rt.inner.server_manager.contains("app-server").unwrap());
    }

    #[tokio::test]
    async fn test_identity_record_beats_substring() {
        let listing = "205 app-server-backup running\n101 app-server running\n";
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", listing));
        register_running(&rt.inner, "app-server", Some(101));

        let outcome = start(&rt.inner, "app-server").await.unwrap();
        assert_eq!(outcome.ctid, Ctid::new(101));
        assert_eq!(outcome.located_by, LocateSource::IdentityRecord);
        assert!(outcome.recorded);
    }

    #[tokio::test]
    async fn test_stale_record_is_reconciled() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        register_running(&rt.inner, "app-server", Some(999));

        start(&rt.inner, "app-server").await.unwrap();
        assert_eq!(
            rt.inner.server_manager.recorded_ctid("app-server").unwrap(),
            Some(Ctid::new(101))
        );
    }

    #[tokio::test]
    async fn test_shutdown_records_stopped() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        register_running(&rt.inner, "app-server", Some(101));

        let outcome = shutdown(&rt.inner, "app-server").await.unwrap();
        assert_eq!(outcome.status, LifecycleState::Stopped);
        assert_eq!(rt.executor.count_prefix("pct shutdown 101"), 1);
        let (_, state) = rt.inner.server_manager.get("app-server").unwrap().unwrap();
        assert_eq!(state.status, LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_failure_marks_failed() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .fail("pct shutdown", "CT is locked"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        let err = shutdown(&rt.inner, "app-server").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteExecution);
        let (_, state) = rt.inner.server_manager.get("app-server").unwrap().unwrap();
        assert_eq!(state.status, LifecycleState::Failed);
    }

    #[tokio::test]
    async fn test_delete_without_container_removes_record_only() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        register_running(&rt.inner, "ghost", Some(300));

        let outcome = delete(&rt.inner, "ghost").await.unwrap();
        assert!(outcome.record_removed);
        assert_eq!(outcome.ctid, None);
        assert_eq!(rt.executor.count_prefix("pct shutdown"), 0);
        assert_eq!(rt.executor.count_prefix("pct destroy"), 0);
        assert!(!rt.inner.server_manager.contains("ghost").unwrap());
    }

    #[tokio::test]
    async fn test_delete_of_unknown_name_succeeds() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        let outcome = delete(&rt.inner, "never-existed").await.unwrap();
        assert!(!outcome.record_removed);
    }

    #[tokio::test]
    async fn test_delete_swallows_shutdown_failure() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .fail("pct shutdown", "shutdown timed out"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        let outcome = delete(&rt.inner, "app-server").await.unwrap();
        assert_eq!(rt.executor.count_prefix("pct destroy 101 --force 1"), 1);
        assert!(outcome.shutdown_error.unwrap().contains("shutdown timed out"));
        assert!(outcome.record_removed);
        assert_eq!(rt.inner.runtime_metrics.snapshot().shutdowns_swallowed, 1);
        // No point polling for "stopped" after a failed shutdown.
        assert_eq!(rt.executor.count_prefix("pct status"), 0);
    }

    #[tokio::test]
    async fn test_delete_waits_for_stop_then_destroys() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .ok("pct status", "status: stopped\n"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        let outcome = delete(&rt.inner, "app-server").await.unwrap();
        assert_eq!(outcome.ctid, Some(Ctid::new(101)));
        assert!(outcome.shutdown_error.is_none());
        assert_eq!(
            rt.executor.calls(),
            [
                "pct list",
                "pct shutdown 101",
                "pct status 101",
                "pct destroy 101 --force 1"
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_stop_timeout_is_not_fatal() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .ok("pct status", "status: running\n"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        delete(&rt.inner, "app-server").await.unwrap();
        assert!(rt.executor.count_prefix("pct status") >= 1);
        assert_eq!(rt.executor.count_prefix("pct destroy"), 1);
    }

    #[tokio::test]
    async fn test_delete_destroy_failure_keeps_record() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .ok("pct status", "status: stopped")
                .fail("pct destroy", "storage busy"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        let err = delete(&rt.inner, "app-server").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteExecution);
        let (_, state) = rt.inner.server_manager.get("app-server").unwrap().unwrap();
        assert_eq!(state.status, LifecycleState::Failed);
        assert!(state.last_error.unwrap().contains("storage busy"));
    }

    #[tokio::test]
    async fn test_console_uses_node_hostname() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .ok("hostname", "pve-node1\n"),
        );

        let access = open_console(&rt.inner, "app-server").await.unwrap();
        assert!(access.node_resolved);
        assert_eq!(
            access.url,
            "https://10.0.0.5:8006/?console=lxc&xtermjs=1&vmid=101&vmname=app-server&node=pve-node1&cmd="
        );
    }

    #[tokio::test]
    async fn test_console_falls_back_to_address() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .fail("hostname", "permission denied"),
        );

        let access = open_console(&rt.inner, "app-server").await.unwrap();
        assert!(!access.node_resolved);
        assert_eq!(access.node, "10.0.0.5");
        assert!(access.url.contains("node=10.0.0.5"));
    }

    #[tokio::test]
    async fn test_console_not_found() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        let err = open_console(&rt.inner, "cache").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
        assert_eq!(rt.executor.count_prefix("hostname"), 0);
    }

    #[tokio::test]
    async fn test_inspect_reports_live_status() {
        let rt = TestRuntime::new(
            ScriptedExecutor::new()
                .ok("pct list", LISTING)
                .ok("pct status 101", "status: stopped\n"),
        );
        register_running(&rt.inner, "app-server", Some(101));

        let report = inspect(&rt.inner, "app-server").await.unwrap();
        assert_eq!(report.ctid, Some(Ctid::new(101)));
        assert_eq!(report.located_by, Some(LocateSource::IdentityRecord));
        assert_eq!(report.live_status, Some(ContainerStatus::Stopped));
        assert_eq!(report.record.unwrap().status, LifecycleState::Running);
    }

    #[tokio::test]
    async fn test_inspect_unknown_name() {
        let rt = TestRuntime::new(ScriptedExecutor::new().ok("pct list", LISTING));
        let err = inspect(&rt.inner, "cache").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
    }
}
