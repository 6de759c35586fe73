// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Output ceiling so a chatty command cannot flood the conversation.
const MAX_OUTPUT_BYTES: usize = 30_000;

/// Runs a shell command and returns combined stdout/stderr.
///
/// Executes synchronously on the agent's tool worker; the event loop keeps
/// running while the command does.
pub struct ShellTool;

impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command with `sh -c` and return its stdout and stderr. \
         The exit status is appended when non-zero."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command line to execute"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'command'");
        };

        debug!(command, "shell tool");

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output();

        match output {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).to_string();
                let stderr = String::from_utf8_lossy(&out.stderr);
                if !stderr.trim().is_empty() {
                    text.push_str(&stderr);
                }
                if text.len() > MAX_OUTPUT_BYTES {
                    text.truncate(MAX_OUTPUT_BYTES);
                    text.push_str("\n... output truncated");
                }
                if !out.status.success() {
                    let code = out.status.code().unwrap_or(-1);
                    text.push_str(&format!("\n(exit status {code})"));
                    return ToolOutput::err(&call.id, text);
                }
                ToolOutput::ok(&call.id, text)
            }
            Err(e) => ToolOutput::err(&call.id, format!("failed to run command: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "s1".into(), name: "shell".into(), args }
    }

    #[test]
    fn echo_returns_stdout() {
        let out = ShellTool.execute(&call(json!({ "command": "echo hello" })));
        assert!(!out.is_error);
        assert_eq!(out.content.trim(), "hello");
    }

    #[test]
    fn failing_command_reports_exit_status() {
        let out = ShellTool.execute(&call(json!({ "command": "exit 3" })));
        assert!(out.is_error);
        assert!(out.content.contains("exit status 3"));
    }

    #[test]
    fn stderr_is_captured() {
        let out = ShellTool.execute(&call(json!({ "command": "echo oops >&2" })));
        assert!(out.content.contains("oops"));
    }

    #[test]
    fn missing_command_is_error() {
        let out = ShellTool.execute(&call(json!({})));
        assert!(out.is_error);
    }
}
