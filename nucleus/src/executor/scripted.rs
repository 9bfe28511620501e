//! In-memory executor for tests: records every command and answers by prefix.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CommandExecutor, CommandOutput, ExecutorError};
use crate::hypervisor::HypervisorTarget;

enum Reply {
    Ok(String),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `stdout` to commands starting with `prefix`. Later rules win.
    pub fn ok(self, prefix: &str, stdout: &str) -> Self {
        self.rules
            .lock()
            .push((prefix.to_string(), Reply::Ok(stdout.to_string())));
        self
    }

    /// Fail commands starting with `prefix`. Later rules win.
    pub fn fail(self, prefix: &str, message: &str) -> Self {
        self.rules
            .lock()
            .push((prefix.to_string(), Reply::Fail(message.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        _target: &HypervisorTarget,
        command: &str,
    ) -> Result<CommandOutput, ExecutorError> {
        self.calls.lock().push(command.to_string());

        let rules = self.rules.lock();
        match rules.iter().rev().find(|(prefix, _)| command.starts_with(prefix)) {
            Some((_, Reply::Ok(stdout))) => Ok(CommandOutput::new(stdout.clone())),
            Some((_, Reply::Fail(message))) => Err(ExecutorError::Rejected(message.clone())),
            // Unscripted commands succeed silently.
            None => Ok(CommandOutput::default()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
