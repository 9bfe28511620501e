//! Adapter for the HTTP remote-execution service.
//!
//! `POST <endpoint>/execute` with `{host, port, username, password, command}`.
//! The service answers `{"output": ".."}` on success and `{"error": ".."}`
//! otherwise.

use std::time::Duration;

use async_trait::async_trait;
use nucleus_shared::{NucleusError, NucleusResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CommandExecutor, CommandOutput, ExecutorError};
use crate::hypervisor::HypervisorTarget;

/// Wire body. The service binds every field as a string, `port` included.
#[derive(Serialize)]
struct ExecuteRequest<'a> {
    host: String,
    port: String,
    username: &'a str,
    password: &'a str,
    command: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpExecutor {
    client: Client,
    execute_url: Url,
}

impl HttpExecutor {
    /// `timeout` bounds each request end to end.
    pub fn new(endpoint: &str, timeout: Duration) -> NucleusResult<Self> {
        let mut base = Url::parse(endpoint).map_err(|e| {
            NucleusError::Config(format!("invalid executor endpoint '{}': {}", endpoint, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let execute_url = base
            .join("execute")
            .map_err(|e| NucleusError::Config(format!("invalid executor endpoint: {}", e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NucleusError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            execute_url,
        })
    }

    pub fn execute_url(&self) -> &Url {
        &self.execute_url
    }
}

#[async_trait]
impl CommandExecutor for HttpExecutor {
    async fn execute(
        &self,
        target: &HypervisorTarget,
        command: &str,
    ) -> Result<CommandOutput, ExecutorError> {
        let request = ExecuteRequest {
            host: target.ssh_host(),
            port: target.ssh_port.to_string(),
            username: &target.username,
            password: &target.secret,
            command,
        };

        let response = self
            .client
            .post(self.execute_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        let status = response.status();
        let body: ExecuteResponse = response.json().await.map_err(|e| {
            ExecutorError::Transport(format!("unreadable response (HTTP {}): {}", status, e))
        })?;

        interpret(status.is_success(), status.as_u16(), body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn interpret(
    success: bool,
    status: u16,
    body: ExecuteResponse,
) -> Result<CommandOutput, ExecutorError> {
    if let Some(error) = body.error.filter(|e| !e.is_empty()) {
        return Err(ExecutorError::Rejected(error));
    }
    if !success {
        return Err(ExecutorError::Rejected(format!("HTTP {}", status)));
    }
    Ok(CommandOutput::new(body.output.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_url_joins_path() {
        let executor = HttpExecutor::new("http://localhost:7789", Duration::from_secs(5)).unwrap();
        assert_eq!(executor.execute_url().as_str(), "http://localhost:7789/execute");

        let executor =
            HttpExecutor::new("http://gateway.lan/ssh-service", Duration::from_secs(5)).unwrap();
        assert_eq!(
            executor.execute_url().as_str(),
            "http://gateway.lan/ssh-service/execute"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(HttpExecutor::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_request_body_uses_stripped_host() {
        let target = HypervisorTarget::new("https://192.168.1.100:8006", "root", "pw");
        let request = ExecuteRequest {
            host: target.ssh_host(),
            port: target.ssh_port.to_string(),
            username: &target.username,
            password: &target.secret,
            command: "pct list",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["host"], "192.168.1.100");
        assert_eq!(json["port"], "22");
        assert_eq!(json["command"], "pct list");
    }

    /// Shape the execution service binds the request body into.
    #[derive(Debug, Deserialize)]
    struct ServiceRequest {
        username: String,
        password: String,
        host: String,
        port: String,
        command: String,
    }

    #[test]
    fn test_request_body_decodes_as_service_request() {
        let target = HypervisorTarget::new("10.0.0.5", "root", "pw").with_ssh_port(2222);
        let request = ExecuteRequest {
            host: target.ssh_host(),
            port: target.ssh_port.to_string(),
            username: &target.username,
            password: &target.secret,
            command: "pct status 101",
        };
        let body = serde_json::to_string(&request).unwrap();
        let decoded: ServiceRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(decoded.port, "2222");
        assert_eq!((decoded.username.as_str(), decoded.password.as_str()), ("root", "pw"));
        assert_eq!(decoded.host, "10.0.0.5");
        assert_eq!(decoded.command, "pct status 101");
    }

    #[test]
    fn test_interpret_responses() {
        let ok: ExecuteResponse = serde_json::from_str(r#"{"output":"101 web"}"#).unwrap();
        assert_eq!(interpret(true, 200, ok).unwrap().stdout, "101 web");

        let err: ExecuteResponse = serde_json::from_str(r#"{"error":"auth failed"}"#).unwrap();
        assert!(matches!(
            interpret(false, 500, err),
            Err(ExecutorError::Rejected(msg)) if msg == "auth failed"
        ));

        let bare: ExecuteResponse = serde_json::from_str("{}").unwrap();
        assert!(interpret(false, 502, bare).is_err());
    }
}
