// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Persistence boundary.
//!
//! The REPL only ever talks to this trait.  Inserts inside a transaction
//! are atomic; `rollback` reverts them; failures are returned, never
//! panicked.  [`NullDb`] is used when no database is configured, and
//! [`MemoryDb`] backs tests that assert transactional behaviour.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, thiserror::Error)]
#[error("database error: {0}")]
pub struct DbError(pub String);

/// Registry row for one agent.
#[derive(Debug, Clone)]
pub struct AgentRow {
    pub uuid: Uuid,
    pub parent_uuid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
}

pub trait Database: Send {
    fn begin(&mut self) -> Result<(), DbError>;
    fn commit(&mut self) -> Result<(), DbError>;
    fn rollback(&mut self) -> Result<(), DbError>;

    fn agent_insert(&mut self, row: &AgentRow) -> Result<(), DbError>;
    fn agent_mark_dead(&mut self, uuid: &Uuid) -> Result<(), DbError>;
    /// Id of the newest message attributed to `uuid`; `None` when the agent
    /// has no messages yet.
    fn agent_get_last_message_id(&mut self, uuid: &Uuid) -> Result<Option<i64>, DbError>;

    fn message_insert(
        &mut self,
        session_id: i64,
        agent_uuid: Option<&Uuid>,
        kind: &str,
        content: &str,
        data_json: &str,
    ) -> Result<i64, DbError>;
}

// ─── Null implementation ──────────────────────────────────────────────────────

/// Used when no database connection string is configured: every operation
/// succeeds and nothing is stored.
#[derive(Debug, Default)]
pub struct NullDb;

impl Database for NullDb {
    fn begin(&mut self) -> Result<(), DbError> {
        Ok(())
    }
    fn commit(&mut self) -> Result<(), DbError> {
        Ok(())
    }
    fn rollback(&mut self) -> Result<(), DbError> {
        Ok(())
    }
    fn agent_insert(&mut self, _row: &AgentRow) -> Result<(), DbError> {
        Ok(())
    }
    fn agent_mark_dead(&mut self, _uuid: &Uuid) -> Result<(), DbError> {
        Ok(())
    }
    fn agent_get_last_message_id(&mut self, _uuid: &Uuid) -> Result<Option<i64>, DbError> {
        Ok(None)
    }
    fn message_insert(
        &mut self,
        _session_id: i64,
        _agent_uuid: Option<&Uuid>,
        _kind: &str,
        _content: &str,
        _data_json: &str,
    ) -> Result<i64, DbError> {
        Ok(0)
    }
}

// ─── In-memory implementation ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: i64,
    pub agent_uuid: Option<Uuid>,
    pub kind: String,
    pub content: String,
    pub data_json: String,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    agents: Vec<AgentRow>,
    dead: Vec<Uuid>,
    messages: Vec<StoredMessage>,
    next_message_id: i64,
}

/// In-memory database with real transaction semantics.
///
/// `fail_next` makes the next mutating call fail, which is how the command
/// tests exercise rollback paths.
#[derive(Debug, Default)]
pub struct MemoryDb {
    committed: Tables,
    staged: Option<Tables>,
    pub fail_next: bool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_count(&self) -> usize {
        self.committed.agents.len()
    }

    pub fn is_dead(&self, uuid: &Uuid) -> bool {
        self.committed.dead.contains(uuid)
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.committed.messages
    }

    fn tables_mut(&mut self) -> &mut Tables {
        self.staged.as_mut().unwrap_or(&mut self.committed)
    }

    fn check_failure(&mut self) -> Result<(), DbError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(DbError("injected failure".into()));
        }
        Ok(())
    }
}

impl Database for MemoryDb {
    fn begin(&mut self) -> Result<(), DbError> {
        if self.staged.is_some() {
            return Err(DbError("transaction already open".into()));
        }
        self.staged = Some(self.committed.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        match self.staged.take() {
            Some(t) => {
                self.committed = t;
                Ok(())
            }
            None => Err(DbError("no open transaction".into())),
        }
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        match self.staged.take() {
            Some(_) => Ok(()),
            None => Err(DbError("no open transaction".into())),
        }
    }

    fn agent_insert(&mut self, row: &AgentRow) -> Result<(), DbError> {
        self.check_failure()?;
        self.tables_mut().agents.push(row.clone());
        Ok(())
    }

    fn agent_mark_dead(&mut self, uuid: &Uuid) -> Result<(), DbError> {
        self.check_failure()?;
        let tables = self.tables_mut();
        if !tables.dead.contains(uuid) {
            tables.dead.push(*uuid);
        }
        Ok(())
    }

    fn agent_get_last_message_id(&mut self, uuid: &Uuid) -> Result<Option<i64>, DbError> {
        let tables = self.staged.as_ref().unwrap_or(&self.committed);
        Ok(tables
            .messages
            .iter()
            .rev()
            .find(|m| m.agent_uuid.as_ref() == Some(uuid))
            .map(|m| m.id))
    }

    fn message_insert(
        &mut self,
        session_id: i64,
        agent_uuid: Option<&Uuid>,
        kind: &str,
        content: &str,
        data_json: &str,
    ) -> Result<i64, DbError> {
        self.check_failure()?;
        let tables = self.tables_mut();
        tables.next_message_id += 1;
        let id = tables.next_message_id;
        tables.messages.push(StoredMessage {
            id,
            session_id,
            agent_uuid: agent_uuid.copied(),
            kind: kind.to_string(),
            content: content.to_string(),
            data_json: data_json.to_string(),
        });
        Ok(id)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
