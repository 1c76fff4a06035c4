//! Upstream collaborators: code execution and AI assist.
//!
//! Both are opaque request/response services behind traits. The room never
//! interprets their payloads; it snapshots the document, spawns a task, and
//! forwards whatever comes back (or a typed timeout/failure) to the one
//! session that asked.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Failure inside a collaborator. Timeouts are handled by the caller via
/// `tokio::time::timeout`, not here.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Execution ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ExecRequest {
    pub language: String,
    pub source: String,
    pub stdin: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Somewhere code can be run. The server treats output as opaque text.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: ExecRequest) -> Result<ExecOutcome, UpstreamError>;
}

/// Runs submissions as local subprocesses via an interpreter table.
///
/// No sandboxing beyond what the interpreters themselves do; deploy behind
/// an isolation layer or swap in a remote backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Interpreter argv prefix for a language tag; source is appended as
    /// the final argument.
    fn argv(language: &str) -> Option<[&'static str; 2]> {
        match language {
            "python" | "python3" => Some(["python3", "-c"]),
            "javascript" | "js" | "node" => Some(["node", "-e"]),
            "sh" | "bash" | "shell" => Some(["sh", "-c"]),
            _ => None,
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessExecutor {
    async fn execute(&self, request: ExecRequest) -> Result<ExecOutcome, UpstreamError> {
        let [program, flag] = Self::argv(&request.language)
            .ok_or_else(|| UpstreamError::UnsupportedLanguage(request.language.clone()))?;

        debug!(language = %request.language, bytes = request.source.len(), "spawning executor");

        let mut child = Command::new(program)
            .arg(flag)
            .arg(&request.source)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.stdin.as_bytes()).await?;
            // Dropping closes the pipe so the child sees EOF.
        }

        let output = child.wait_with_output().await?;
        Ok(ExecOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

// ── AI assist ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AssistRequest {
    /// Document text (or the relevant slice of it) at request time.
    pub context_snippet: String,
    pub instruction: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistOutcome {
    pub suggestion: String,
}

/// An AI suggestion service. Suggestions are plain text; nothing is applied
/// to the document automatically.
#[async_trait]
pub trait AssistGateway: Send + Sync {
    async fn assist(&self, request: AssistRequest) -> Result<AssistOutcome, UpstreamError>;
}

/// Placeholder gateway for deployments without an AI backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledAssist;

#[async_trait]
impl AssistGateway for DisabledAssist {
    async fn assist(&self, _request: AssistRequest) -> Result<AssistOutcome, UpstreamError> {
        Err(UpstreamError::Unavailable(
            "AI assist is not configured on this server".to_string(),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
