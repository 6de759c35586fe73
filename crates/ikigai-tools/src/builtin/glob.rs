// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Recursive filename search by glob pattern.
pub struct GlobTool;

/// Translate a filename glob into an anchored regex.
///
/// Supports `*` (any run within one name), `?` (one character), and literal
/// everything else.  Path prefixes like `**/` are stripped first; recursion
/// is the walker's job, so only the filename part matters.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let name_part = match pattern.rfind('/') {
        Some(pos) => &pattern[pos + 1..],
        None => pattern,
    };
    let mut re = String::from("^");
    for c in name_part.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Search for files matching a glob pattern recursively under a root directory. \
         Returns matching file paths, one per line, sorted. \
         Pattern examples: '*.json', 'config.*', 'Makefile'. \
         Path prefixes like '**/' are stripped automatically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Filename glob pattern (e.g. '*.json', 'config.*')"
                },
                "root": {
                    "type": "string",
                    "description": "Root directory to search from (default: current directory)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 200)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(pattern) = call.args.get("pattern").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'pattern'");
        };
        let root = call.args.get("root").and_then(|v| v.as_str()).unwrap_or(".");
        let max = call
            .args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(200) as usize;

        let re = match glob_to_regex(pattern) {
            Ok(re) => re,
            Err(e) => return ToolOutput::err(&call.id, format!("bad pattern: {e}")),
        };

        debug!(pattern, root, "glob tool");

        let mut matches: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(name == ".git" || name == "node_modules" || name == "target")
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| re.is_match(&e.file_name().to_string_lossy()))
            .map(|e| e.path().display().to_string())
            .collect();
        matches.sort();
        matches.truncate(max);

        if matches.is_empty() {
            ToolOutput::ok(&call.id, "(no matches)")
        } else {
            ToolOutput::ok(&call.id, matches.join("\n"))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
