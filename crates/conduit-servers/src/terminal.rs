//! Workspace-scoped shell and file tools for the stdio demo server.
//!
//! Every tool operates inside a single workspace directory. Paths are
//! relative to it and may not escape it; commands run with it as their
//! working directory.

use crate::service::{require_str, McpService, ToolError, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Hard cap on command execution time.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

fn resolve(workspace: &Path, path: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(ToolError::invalid("path must be relative to the workspace"));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::invalid("path may not leave the workspace"));
    }
    Ok(workspace.join(candidate))
}

struct RunCommand {
    workspace: PathBuf,
}

#[async_trait]
impl ToolHandler for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the workspace directory"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command to run"},
            },
            "required": ["command"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let command = require_str(&arguments, "command")?;
        info!(command = %command, "running command");

        let started = Instant::now();
        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&self.workspace)
                .output(),
        )
        .await
        .map_err(|_| {
            ToolError::failed(format!(
                "command did not finish within {}s",
                COMMAND_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| ToolError::failed(format!("failed to run command: {e}")))?;

        Ok(json!({
            "command": command,
            "exit_code": output.status.code(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "working_directory": self.workspace.display().to_string(),
            "execution_time": started.elapsed().as_secs_f64(),
        }))
    }
}

struct ReadFile {
    workspace: PathBuf,
}

#[async_trait]
impl ToolHandler for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the workspace directory"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the workspace"},
            },
            "required": ["path"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let path = require_str(&arguments, "path")?;
        let full = resolve(&self.workspace, path)?;
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| ToolError::failed(format!("cannot read '{path}': {e}")))?;
        Ok(json!({"path": path, "content": content}))
    }
}

struct WriteFile {
    workspace: PathBuf,
}

#[async_trait]
impl ToolHandler for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file inside the workspace directory"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the workspace"},
                "content": {"type": "string", "description": "Content to write"},
            },
            "required": ["path", "content"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let path = require_str(&arguments, "path")?;
        let content = require_str(&arguments, "content")?;
        let full = resolve(&self.workspace, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::failed(format!("cannot create '{path}': {e}")))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| ToolError::failed(format!("cannot write '{path}': {e}")))?;
        Ok(json!({"path": path, "bytes_written": content.len()}))
    }
}

/// The terminal service rooted at `workspace`.
pub fn terminal_service(workspace: PathBuf) -> McpService {
    McpService::new("terminal", env!("CARGO_PKG_VERSION"))
        .with_tool(Arc::new(RunCommand {
            workspace: workspace.clone(),
        }))
        .with_tool(Arc::new(ReadFile {
            workspace: workspace.clone(),
        }))
        .with_tool(Arc::new(WriteFile { workspace }))
}
