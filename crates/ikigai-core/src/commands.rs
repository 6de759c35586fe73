// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Slash-command dispatch: `/fork`, `/kill`, `/switch`, `/mail`, `/pp`.
//!
//! Database work around fork and kill is transactional; in-memory state is
//! mutated only after the commit succeeds, so a failed command leaves the
//! agent tree exactly as it was.

use std::sync::atomic::Ordering;

use ikigai_model::Message;
use tracing::info;
use uuid::Uuid;

use crate::agent::AgentStatus;
use crate::db::AgentRow;
use crate::repl::Repl;

/// Minimum characters accepted for a UUID prefix.
const MIN_PREFIX_LEN: usize = 4;

impl Repl {
    pub(crate) fn dispatch_command(&mut self, line: &str) {
        let trimmed = line.trim();
        let (command, args) = match trimmed.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (trimmed, ""),
        };
        match command {
            "/fork" => self.cmd_fork(args),
            "/kill" => self.cmd_kill(args),
            "/switch" => self.cmd_switch(args),
            "/mail" => self.cmd_mail(args),
            "/pp" => self.cmd_pp(),
            other => {
                let msg = format!("Unknown command: {other}");
                self.error_line(&msg);
            }
        }
    }

    fn error_line(&mut self, message: &str) {
        if let Some(a) = self.current_agent_mut() {
            a.push_error_line(message);
        }
    }

    fn note_line(&mut self, message: &str) {
        if let Some(a) = self.current_agent_mut() {
            a.scrollback.append_line(message);
        }
    }

    // ── UUID resolution ───────────────────────────────────────────────────────

    /// Resolve a UUID prefix to exactly one live agent.
    ///
    /// At least four characters are required; an exact id beats prefix
    /// matches; several prefix hits are reported, never guessed at.
    pub(crate) fn resolve_agent_prefix(&self, prefix: &str) -> Result<Uuid, String> {
        if prefix.len() < MIN_PREFIX_LEN {
            return Err(format!(
                "agent id prefix must be at least {MIN_PREFIX_LEN} characters"
            ));
        }
        let normalized = prefix.to_ascii_lowercase().replace('-', "");
        if let Some(a) = self
            .agents
            .iter()
            .find(|a| a.id.simple().to_string() == normalized)
        {
            return Ok(a.id);
        }
        let matches: Vec<Uuid> = self
            .agents
            .iter()
            .filter(|a| a.id.simple().to_string().starts_with(&normalized))
            .map(|a| a.id)
            .collect();
        match matches.len() {
            0 => Err(format!("no agent matches '{prefix}'")),
            1 => Ok(matches[0]),
            n => Err(format!("ambiguous prefix '{prefix}' matches {n} agents")),
        }
    }

    // ── /fork ─────────────────────────────────────────────────────────────────

    /// `/fork ["prompt"]` — create a child inheriting the current
    /// transcript; optionally submit a prompt on it.
    fn cmd_fork(&mut self, args: &str) {
        // Single-flight: a second fork while one is pending is refused.
        if self.fork_pending.swap(true, Ordering::SeqCst) {
            self.error_line("A fork is already in progress");
            return;
        }

        let prompt = match parse_quoted_prompt(args) {
            Ok(p) => p,
            Err(e) => {
                self.fork_pending.store(false, Ordering::SeqCst);
                self.error_line(&e);
                return;
            }
        };

        let Some(parent_id) = self.current else {
            self.fork_pending.store(false, Ordering::SeqCst);
            return;
        };

        let result = self.fork_transaction(parent_id);
        self.fork_pending.store(false, Ordering::SeqCst);

        match result {
            Ok(child_id) => {
                let short = child_id.simple().to_string()[..8].to_string();
                self.switch_to(child_id);
                self.note_line(&format!("Forked agent {short}"));
                info!(child = %short, "fork complete");
                if let Some(prompt) = prompt {
                    self.submit_user_message(prompt);
                }
            }
            Err(e) => self.error_line(&e),
        }
    }

    /// The transactional part of fork: read the fork point, insert the
    /// registry row, commit, and only then mutate the agent set.
    fn fork_transaction(&mut self, parent_id: Uuid) -> Result<Uuid, String> {
        let Some(parent_idx) = self.agent_index(parent_id) else {
            return Err("current agent disappeared".into());
        };

        self.db.begin().map_err(|e| e.to_string())?;

        let fork_point = match self.db.agent_get_last_message_id(&parent_id) {
            Ok(id) => id,
            Err(e) => {
                let _ = self.db.rollback();
                return Err(e.to_string());
            }
        };

        let child = self.agents[parent_idx].fork(fork_point);
        let row = AgentRow {
            uuid: child.id,
            parent_uuid: Some(parent_id),
            created_at: child.created_at,
            provider: child.provider_name.clone(),
            model: child.model.clone(),
        };
        if let Err(e) = self.db.agent_insert(&row) {
            let _ = self.db.rollback();
            return Err(e.to_string());
        }
        self.db.commit().map_err(|e| e.to_string())?;

        let child_id = child.id;
        self.agents.push(child);
        Ok(child_id)
    }

    // ── /kill ─────────────────────────────────────────────────────────────────

    /// `/kill [uuid-prefix] [--cascade]` — mark agents dead in one
    /// transaction, then reconcile the in-memory tree.
    fn cmd_kill(&mut self, args: &str) {
        let mut cascade = false;
        let mut target_arg = String::new();
        for token in args.split_whitespace() {
            if token == "--cascade" {
                cascade = true;
            } else {
                target_arg = token.to_string();
            }
        }

        let target = if target_arg.is_empty() {
            match self.current {
                Some(id) => id,
                None => return,
            }
        } else {
            match self.resolve_agent_prefix(&target_arg) {
                Ok(id) => id,
                Err(e) => {
                    self.error_line(&e);
                    return;
                }
            }
        };

        let Some(target_idx) = self.agent_index(target) else {
            self.error_line("agent not found");
            return;
        };
        if self.agents[target_idx].is_root() {
            self.error_line("Cannot kill the root agent");
            return;
        }

        let victims = if cascade {
            self.subtree_depth_first(target)
        } else {
            vec![target]
        };

        if let Err(e) = self.kill_transaction(&victims) {
            self.error_line(&e);
            return;
        }

        // Commit succeeded: reconcile memory.
        let parent = self.agents[target_idx].parent;
        for id in &victims {
            if let Some(idx) = self.agent_index(*id) {
                self.agents[idx].status = AgentStatus::Dead;
                self.agents[idx].force_idle();
            }
        }
        self.agents.retain(|a| a.status != AgentStatus::Dead);

        if self.current.map(|c| victims.contains(&c)).unwrap_or(false) {
            self.current = parent;
        }
        let count = victims.len();
        self.note_line(&format!("Killed {count} agent(s)"));
        info!(count, cascade, "kill complete");
    }

    /// Depth-first subtree rooted at `root`, children before parents so
    /// the tree is dismantled bottom-up.
    fn subtree_depth_first(&self, root: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let children: Vec<Uuid> = self
            .agents
            .iter()
            .filter(|a| a.parent == Some(root))
            .map(|a| a.id)
            .collect();
        for child in children {
            out.extend(self.subtree_depth_first(child));
        }
        out.push(root);
        out
    }

    fn kill_transaction(&mut self, victims: &[Uuid]) -> Result<(), String> {
        self.db.begin().map_err(|e| e.to_string())?;
        for id in victims {
            if let Err(e) = self.db.agent_mark_dead(id) {
                let _ = self.db.rollback();
                return Err(e.to_string());
            }
        }
        self.db.commit().map_err(|e| e.to_string())
    }

    // ── /switch ───────────────────────────────────────────────────────────────

    fn cmd_switch(&mut self, args: &str) {
        if args.is_empty() {
            self.error_line("usage: /switch <uuid-prefix>");
            return;
        }
        match self.resolve_agent_prefix(args) {
            Ok(id) => {
                self.switch_to(id);
                let short = id.simple().to_string()[..8].to_string();
                self.note_line(&format!("Switched to agent {short}"));
            }
            Err(e) => self.error_line(&e),
        }
    }

    // ── /mail ─────────────────────────────────────────────────────────────────

    /// `/mail <uuid-prefix> <text>` — deliver a message into another
    /// agent's conversation and scrollback.
    fn cmd_mail(&mut self, args: &str) {
        let Some((prefix, body)) = args.split_once(char::is_whitespace) else {
            self.error_line("usage: /mail <uuid-prefix> <message>");
            return;
        };
        let body = body.trim();
        if body.is_empty() {
            self.error_line("usage: /mail <uuid-prefix> <message>");
            return;
        }
        let target = match self.resolve_agent_prefix(prefix) {
            Ok(id) => id,
            Err(e) => {
                self.error_line(&e);
                return;
            }
        };
        let sender_short = self
            .current_agent()
            .map(|a| a.short_id())
            .unwrap_or_default();

        let Some(target_idx) = self.agent_index(target) else {
            self.error_line("agent not found");
            return;
        };
        let mail_text = format!("[mail from {sender_short}] {body}");
        let t = &mut self.agents[target_idx];
        t.conversation.push(Message::user(&mail_text));
        let target_short = t.short_id();
        t.scrollback
            .append_line(format!("Mail from {sender_short}: {body}"));

        self.note_line(&format!("Mail sent to {target_short}"));
    }

    // ── /pp ───────────────────────────────────────────────────────────────────

    /// Debug pretty-printer for the current agent.
    fn cmd_pp(&mut self) {
        let Some(a) = self.current_agent() else { return };
        let lines = vec![
            format!("agent {}", a.id),
            format!("  parent:     {}", a.parent.map(|p| p.to_string()).unwrap_or_else(|| "(root)".into())),
            format!("  state:      {:?}", a.state()),
            format!("  provider:   {}/{}", a.provider_name, a.model),
            format!("  messages:   {}", a.conversation.len()),
            format!("  tool turns: {}", a.tool_iteration_count),
            format!("  fork point: {:?}", a.fork_message_id),
            format!("  created:    {}", a.created_at.to_rfc3339()),
        ];
        for line in lines {
            self.note_line(&line);
        }
    }
}

/// Parse the optional quoted prompt of `/fork`.
///
/// `None` when absent; an unquoted or unterminated argument is an error.
fn parse_quoted_prompt(args: &str) -> Result<Option<String>, String> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    let Some(rest) = args.strip_prefix('"') else {
        return Err("Prompt must be quoted (usage: /fork \"prompt\")".into());
    };
    let Some(end) = rest.find('"') else {
        return Err("Unterminated quoted string".into());
    };
    Ok(Some(rest[..end].to_string()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
