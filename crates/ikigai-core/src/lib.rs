// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
mod agent;
mod commands;
mod db;
mod repl;


pub use agent::{Agent, AgentStatus, PendingToolCall, RequestState};
pub use db::{AgentRow, Database, DbError, MemoryDb, NullDb};
pub use repl::Repl;
