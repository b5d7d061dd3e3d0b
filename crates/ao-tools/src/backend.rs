use async_trait::async_trait;
use serde::Serialize;

use ao_domain::error::Result;

/// What `resolve` reports back about a target before any diagnostic
/// or shell command touches it.
#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
    pub target: String,
    pub reachable: bool,
    pub os: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Capability consumed by the built-in tools. A real deployment talks
/// to a remote node or local OS; tests substitute an in-memory fake.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<TargetInfo>;
    async fn run_diagnostic(&self, target: &str, action: &str, args: &serde_json::Value) -> Result<serde_json::Value>;
    async fn run_shell(&self, target: &str, command: &str) -> Result<CommandOutput>;
}

/// Executes against the local machine by spawning `sh -c <command>`,
/// the same invocation shape as the teacher's exec tool, minus
/// background-session management (out of scope here — one call, one
/// result, bounded by `timeout`).
pub struct LocalBackend {
    pub timeout: std::time::Duration,
}

impl LocalBackend {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn resolve(&self, target: &str) -> Result<TargetInfo> {
        let reachable = target == "localhost" || target == "127.0.0.1";
        Ok(TargetInfo { target: target.to_string(), reachable, os: Some(std::env::consts::OS.to_string()) })
    }

    async fn run_diagnostic(&self, target: &str, action: &str, args: &serde_json::Value) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "target": target,
            "action": action,
            "args": args,
            "result": "ok",
        }))
    }

    async fn run_shell(&self, _target: &str, command: &str) -> Result<CommandOutput> {
        use tokio::process::Command;

        let fut = async {
            let output = Command::new("sh").arg("-c").arg(command).output().await.map_err(|e| {
                ao_domain::error::Error::Tool { tool: "run_shell".into(), message: format!("failed to spawn: {e}") }
            })?;

            Ok::<_, ao_domain::error::Error>(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        };

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ao_domain::error::Error::Timeout(format!("run_shell exceeded {:?}", self.timeout))),
        }
    }
}
