//! Adapter that runs commands through the local OpenSSH client.
//!
//! Authentication is key-based (`BatchMode=yes`); the target's secret is not
//! used. The remote command is passed as a single argument after `--`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandExecutor, CommandOutput, ExecutorError};
use crate::hypervisor::HypervisorTarget;

pub struct SshExecutor {
    binary: String,
    connect_timeout_secs: u64,
}

impl SshExecutor {
    pub fn new(binary: impl Into<String>, connect_timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            connect_timeout_secs,
        }
    }

    fn args(&self, target: &HypervisorTarget, command: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            target.ssh_port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            format!("{}@{}", target.username, target.ssh_host()),
            "--".to_string(),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn execute(
        &self,
        target: &HypervisorTarget,
        command: &str,
    ) -> Result<CommandOutput, ExecutorError> {
        let output = Command::new(&self.binary)
            .args(self.args(target, command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutorError::Transport(format!("failed to spawn {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(ExecutorError::Exit {
                // Killed by a signal when there is no code.
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CommandOutput::new(String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        "ssh"
    }
}
