// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! One conversation and everything that belongs to it: transcript, input
//! buffer, scrollback, request state, and the tool worker.
//!
//! The request state machine has three states; the only legal transitions
//! are the edges checked in [`Agent::transition`].  A tool worker runs off
//! the event-loop thread; the loop and the worker share nothing but the
//! mutex-guarded flags in [`ToolSlot`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use ikigai_http::TransferId;
use ikigai_model::{Message, StreamEvent, StreamParser, Thinking};
use ikigai_tools::{ToolCall, ToolOutput, ToolRegistry};
use ikigai_tui::{InputBuffer, Scrollback};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Live,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    WaitingForLlm,
    ExecutingTool,
}

/// The single tool call pinned from the most recent `tool_calls` response.
#[derive(Debug, Clone)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Shared between the event loop and the tool worker; all access goes
/// through the mutex.
#[derive(Debug, Default)]
struct ToolSlot {
    running: bool,
    complete: bool,
    output: Option<ToolOutput>,
}

pub struct Agent {
    pub id: Uuid,
    pub parent: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub status: AgentStatus,
    pub provider_name: String,
    pub model: String,
    pub thinking: Thinking,
    /// Created lazily on the first request.
    pub(crate) provider: Option<Box<dyn ikigai_model::Provider>>,
    /// Append-only canonical conversation.
    pub conversation: Vec<Message>,
    pub input: InputBuffer,
    pub scrollback: Scrollback,
    /// Physical rows above the bottom of the composed document.
    pub viewport_offset: usize,
    pub spinner_visible: bool,
    pub spinner_frame: usize,
    state: RequestState,
    pub curl_still_running: u32,
    pub tool_iteration_count: u32,
    /// Set once the iteration ceiling forced a `tool_choice = none` request.
    pub tool_choice_none_sent: bool,
    /// Parent's last message id at fork time.
    pub fork_message_id: Option<i64>,
    pub pending_tool_call: Option<PendingToolCall>,
    tool_slot: Arc<Mutex<ToolSlot>>,
    tool_join: Option<tokio::task::JoinHandle<()>>,
    /// Parser for the in-flight response, if any.
    pub(crate) parser: Option<Box<dyn StreamParser>>,
    pub(crate) inflight: Option<TransferId>,
    /// Error event seen mid-stream, surfaced at completion time.
    pub(crate) last_stream_error: Option<(ikigai_model::ErrorCategory, String)>,
    /// Full assistant text accumulated while streaming.
    pub assistant_response: String,
    /// Bytes since the last newline; flushed to the scrollback per line.
    partial_line: String,
}

impl Agent {
    pub fn new(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        thinking: Thinking,
        parent: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent,
            created_at: Utc::now(),
            status: AgentStatus::Live,
            provider_name: provider_name.into(),
            model: model.into(),
            thinking,
            provider: None,
            conversation: Vec::new(),
            input: InputBuffer::new(),
            scrollback: Scrollback::new(),
            viewport_offset: 0,
            spinner_visible: false,
            spinner_frame: 0,
            state: RequestState::Idle,
            curl_still_running: 0,
            tool_iteration_count: 0,
            tool_choice_none_sent: false,
            fork_message_id: None,
            pending_tool_call: None,
            tool_slot: Arc::new(Mutex::new(ToolSlot::default())),
            tool_join: None,
            parser: None,
            inflight: None,
            last_stream_error: None,
            assistant_response: String::new(),
            partial_line: String::new(),
        }
    }

    /// Child agent inheriting this agent's transcript up to the fork point.
    pub fn fork(&self, fork_message_id: Option<i64>) -> Self {
        let mut child = Self::new(
            self.provider_name.clone(),
            self.model.clone(),
            self.thinking,
            Some(self.id),
        );
        child.conversation = self.conversation.clone();
        child.fork_message_id = fork_message_id;
        child
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Short display form of the agent id.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    // ── State machine ─────────────────────────────────────────────────────────

    /// Move along one edge of the request state machine.
    ///
    /// Illegal edges are refused (and logged); callers treat that as a
    /// programming error surfaced to the scrollback rather than a panic.
    pub fn transition(&mut self, to: RequestState) -> Result<(), String> {
        use RequestState::*;
        let legal = matches!(
            (self.state, to),
            (Idle, WaitingForLlm)
                | (WaitingForLlm, ExecutingTool)
                | (WaitingForLlm, Idle)
                | (ExecutingTool, WaitingForLlm)
                | (ExecutingTool, Idle)
        );
        if !legal {
            warn!(from = ?self.state, to = ?to, agent = %self.short_id(), "illegal state transition");
            return Err(format!("illegal transition {:?} -> {:?}", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    /// Unconditional return to idle (`/kill`, teardown, error recovery).
    pub fn force_idle(&mut self) {
        self.state = RequestState::Idle;
        self.spinner_visible = false;
        self.curl_still_running = 0;
        self.pending_tool_call = None;
        self.parser = None;
        self.inflight = None;
        self.last_stream_error = None;
    }

    // ── Streaming ─────────────────────────────────────────────────────────────

    /// Reset per-response accumulators before a new request.
    pub fn reset_response_accumulators(&mut self) {
        self.assistant_response.clear();
        self.partial_line.clear();
    }

    /// Apply one stream event to the visible state.
    ///
    /// Text deltas accumulate into the response buffer and flush to the
    /// scrollback one complete line at a time; everything else is already
    /// collected by the parser.
    pub fn apply_stream_event(&mut self, ev: &StreamEvent) {
        if let StreamEvent::TextDelta { text } = ev {
            self.assistant_response.push_str(text);
            self.partial_line.push_str(text);
            while let Some(pos) = self.partial_line.find('\n') {
                let line: String = self.partial_line.drain(..=pos).collect();
                self.scrollback.append_line(line.trim_end_matches('\n'));
            }
        }
    }

    /// Flush a trailing partial line into the scrollback.
    pub fn flush_partial_line(&mut self) {
        if !self.partial_line.is_empty() {
            let line = std::mem::take(&mut self.partial_line);
            self.scrollback.append_line(line);
        }
    }

    /// Clear any partially streamed output (error recovery).
    pub fn discard_partial_response(&mut self) {
        self.assistant_response.clear();
        self.partial_line.clear();
    }

    pub fn push_error_line(&mut self, message: &str) {
        self.scrollback.append_line(format!("Error: {message}"));
    }

    // ── Tool worker ───────────────────────────────────────────────────────────

    /// Launch the tool worker for `call`.  Exactly one worker per agent can
    /// run at a time.
    pub fn start_tool(&mut self, registry: Arc<ToolRegistry>, call: ToolCall) -> Result<(), String> {
        {
            let mut slot = self.tool_slot.lock().unwrap();
            if slot.running {
                return Err("tool worker already running".into());
            }
            slot.running = true;
            slot.complete = false;
            slot.output = None;
        }
        let slot = Arc::clone(&self.tool_slot);
        self.tool_join = Some(tokio::task::spawn_blocking(move || {
            let output = registry.execute(&call);
            let mut slot = slot.lock().unwrap();
            slot.output = Some(output);
            slot.complete = true;
        }));
        Ok(())
    }

    pub fn tool_running(&self) -> bool {
        self.tool_slot.lock().unwrap().running
    }

    /// Harvest a finished tool result, clearing the worker flags.
    pub fn poll_tool(&mut self) -> Option<ToolOutput> {
        let mut slot = self.tool_slot.lock().unwrap();
        if !slot.complete {
            return None;
        }
        slot.running = false;
        slot.complete = false;
        let output = slot.output.take();
        drop(slot);
        self.tool_join = None;
        output
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
