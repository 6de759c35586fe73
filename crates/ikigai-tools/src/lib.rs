// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
mod builtin;
mod registry;
mod tool;

pub use builtin::{GlobTool, ReadFileTool, ShellTool};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolCall, ToolOutput};

/// Registry preloaded with every builtin tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GlobTool);
    registry.register(ReadFileTool);
    registry.register(ShellTool);
    registry
}
