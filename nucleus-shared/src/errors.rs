//! Error taxonomy for container lifecycle operations.
//!
//! Every failure carries a short human-readable message and maps to an
//! [`ErrorKind`] so callers can branch on the category without parsing text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type NucleusResult<T> = Result<T, NucleusError>;

#[derive(Debug, Error)]
pub enum NucleusError {
    /// Missing or malformed input. Raised before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unsupported template: {0}")]
    UnsupportedTemplate(String),

    /// The hypervisor listing has no container for the logical name.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The command executor reported a failure.
    #[error("remote execution failed: {message}")]
    RemoteExecution { command: String, message: String },

    /// The container exists but package installation failed.
    #[error("container {ctid} for '{name}' created but package installation failed: {message}")]
    PartialProvision {
        name: String,
        ctid: u32,
        message: String,
    },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A server record is missing from the store.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Machine-distinguishable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnsupportedTemplate,
    ContainerNotFound,
    RemoteExecution,
    PartialProvision,
    Timeout,
    InvalidState,
    NotFound,
    Config,
    Database,
    Storage,
    Internal,
}

impl NucleusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NucleusError::Validation(_) => ErrorKind::Validation,
            NucleusError::UnsupportedTemplate(_) => ErrorKind::UnsupportedTemplate,
            NucleusError::ContainerNotFound(_) => ErrorKind::ContainerNotFound,
            NucleusError::RemoteExecution { .. } => ErrorKind::RemoteExecution,
            NucleusError::PartialProvision { .. } => ErrorKind::PartialProvision,
            NucleusError::Timeout(_) => ErrorKind::Timeout,
            NucleusError::InvalidState(_) => ErrorKind::InvalidState,
            NucleusError::NotFound(_) => ErrorKind::NotFound,
            NucleusError::Config(_) => ErrorKind::Config,
            NucleusError::Database(_) => ErrorKind::Database,
            NucleusError::Storage(_) | NucleusError::Io(_) => ErrorKind::Storage,
            NucleusError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Build a remote execution error for `command`.
    pub fn remote(command: impl Into<String>, message: impl Into<String>) -> Self {
        NucleusError::RemoteExecution {
            command: command.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            NucleusError::ContainerNotFound("web".into()).kind(),
            ErrorKind::ContainerNotFound
        );
        assert_eq!(
            NucleusError::remote("pct list", "connection refused").kind(),
            ErrorKind::RemoteExecution
        );
        let io = std::io::Error::other("disk full");
        assert_eq!(NucleusError::from(io).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_partial_provision_message() {
        let err = NucleusError::PartialProvision {
            name: "web".into(),
            ctid: 412,
            message: "apt failed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("412"));
        assert!(text.contains("web"));
        assert_eq!(err.kind(), ErrorKind::PartialProvision);
    }
}
