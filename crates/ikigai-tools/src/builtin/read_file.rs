// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Default number of lines returned when the caller does not specify a
/// limit.  The agent paginates with offset + limit to read more.
const DEFAULT_LINE_LIMIT: usize = 200;

/// Hard byte ceiling applied in addition to the line limit; whichever
/// constraint is hit first determines where the output is cut.
const MAX_BYTES: usize = 20_000;

pub struct ReadFileTool;

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file. Default: 200 lines / 20 KB — whichever comes first. \
         Lines are formatted as L{n}:content (1-indexed). \
         When more lines exist, a pagination notice shows the next offset."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-indexed line number to start reading from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 200)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let offset = call.args.get("offset").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let limit = call
            .args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LINE_LIMIT as u64) as usize;

        debug!(path, offset, limit, "read_file tool");

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot read {path}: {e}")),
        };

        let lines: Vec<&str> = content.lines().collect();
        let start = offset.saturating_sub(1).min(lines.len());
        let mut out = String::new();
        let mut emitted = 0usize;
        for (i, line) in lines.iter().enumerate().skip(start) {
            if emitted >= limit || out.len() + line.len() > MAX_BYTES {
                out.push_str(&format!(
                    "... truncated; {} more lines, continue with offset {}\n",
                    lines.len() - i,
                    i + 1
                ));
                break;
            }
            out.push_str(&format!("L{}:{}\n", i + 1, line));
            emitted += 1;
        }
        if emitted == 0 && out.is_empty() {
            out.push_str("(empty file)\n");
        }
        ToolOutput::ok(&call.id, out.trim_end_matches('\n').to_string())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
