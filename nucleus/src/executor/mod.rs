//! Remote command execution.
//!
//! A [`CommandExecutor`] runs one shell command line on a hypervisor and
//! returns its captured output. Two adapters ship with the crate:
//!
//! - [`HttpExecutor`]: posts the command to a remote-execution service
//! - [`SshExecutor`]: shells out to the local `ssh` client (key auth)

mod http;
#[cfg(test)]
pub(crate) mod scripted;
mod ssh;

pub use http::HttpExecutor;
pub use ssh::SshExecutor;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nucleus_shared::NucleusResult;
use thiserror::Error;

use crate::hypervisor::HypervisorTarget;
use crate::runtime::options::ExecutorOptions;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
        }
    }
}

/// Why a command did not produce output.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The channel to the hypervisor could not be used.
    #[error("transport error: {0}")]
    Transport(String),

    /// The execution service refused or failed the command.
    #[error("{0}")]
    Rejected(String),

    /// The command ran and exited non-zero.
    #[error("exit status {code}: {stderr}")]
    Exit { code: i32, stderr: String },
}

/// Runs shell commands on a hypervisor.
///
/// Implementations must not log the command line at levels above `trace`;
/// callers pass redacted forms to their own log statements.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        target: &HypervisorTarget,
        command: &str,
    ) -> Result<CommandOutput, ExecutorError>;

    /// Short adapter name for logs.
    fn name(&self) -> &str;
}

/// Build the executor selected in configuration.
pub fn from_options(options: &ExecutorOptions) -> NucleusResult<Arc<dyn CommandExecutor>> {
    Ok(match options {
        ExecutorOptions::Http {
            endpoint,
            timeout_secs,
        } => Arc::new(HttpExecutor::new(
            endpoint,
            Duration::from_secs(*timeout_secs),
        )?),
        ExecutorOptions::Ssh {
            binary,
            connect_timeout_secs,
        } => Arc::new(SshExecutor::new(binary.clone(), *connect_timeout_secs)),
    })
}
