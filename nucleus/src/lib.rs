//! Nucleus - container lifecycle orchestration for Proxmox LXC hypervisors.
//!
//! Turns a declarative server request (OS template, CPU, memory, disk,
//! packages) into `pct` commands executed on a remote hypervisor, and later
//! locates, starts, stops, and destroys the resulting container by name.
//!
//! ```no_run
//! # async fn example() -> Result<(), nucleus::NucleusError> {
//! use nucleus::{ContainerRequest, NucleusOptions, NucleusRuntime};
//!
//! let runtime = NucleusRuntime::new(NucleusOptions::default())?;
//! let outcome = runtime
//!     .provision(ContainerRequest::new("web", "ubuntu").with_resources(2, 2048, 16))
//!     .await?;
//! println!("container {} is up", outcome.ctid);
//! runtime.delete("web").await?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod executor;
pub mod hypervisor;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod server;
pub mod util;

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use executor::{CommandExecutor, CommandOutput, ExecutorError, HttpExecutor, SshExecutor};
pub use hypervisor::{
    ConsoleAccess, Ctid, CtidAllocator, HypervisorInventory, HypervisorTarget, PackageSet,
    StaticInventory, TemplateCatalog,
};
pub use metrics::RuntimeMetrics;
pub use nucleus_shared::{ErrorKind, NucleusError, NucleusResult};
pub use runtime::layout::FilesystemLayout;
pub use runtime::options::{ContainerRequest, ExecutorOptions, NucleusOptions, WaitOptions};
pub use runtime::types::{
    DeleteOutcome, LifecycleOutcome, PackageInstall, ProvisionOutcome, ServerInfo, ServerReport,
};
pub use runtime::{NucleusRuntime, RuntimeParts};
pub use server::{LifecycleState, ServerSpec};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber for a runtime home directory.
///
/// Logs go to a daily rolling file under `<home>/logs`. When `stderr` is set,
/// events are mirrored to standard error as well. `RUST_LOG` controls the
/// filter (default `info`). Safe to call more than once; only the first call
/// installs a subscriber.
pub fn init_logging_for(layout: &FilesystemLayout, stderr: bool) -> NucleusResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(layout.logs_dir())?;
    let appender = tracing_appender::rolling::daily(layout.logs_dir(), "nucleus.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let stderr_layer = stderr.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    match tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
    {
        Ok(()) => {
            let _ = LOG_GUARD.set(guard);
            tracing::debug!(logs_dir = %layout.logs_dir().display(), "Logging initialized");
        }
        Err(_) => {
            // Embedders may have installed their own subscriber already.
        }
    }

    Ok(())
}
