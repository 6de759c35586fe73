// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! The multi-agent REPL event loop.
//!
//! A single cooperative task fuses terminal input, HTTP transfer events,
//! tool-worker completion, and timers.  Every iteration: wait for the next
//! wake-up (bounded by the spinner frame, the tool poll interval, the
//! scroll detector's flush deadline, or a one-second fallback), apply what
//! arrived, harvest background work for *every* agent, then render one
//! frame for the current agent.  Background agents keep streaming into
//! their own scrollbacks; switching never loses in-flight data.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ikigai_config::Config;
use ikigai_http::{Completion, MultiEngine, TransferEvent, TransferId};
use ikigai_model::{
    error::user_message, ContentBlock, ErrorCategory, FinishReason, Message, Request, Response,
    Role, StreamEvent, StreamParser, Thinking, ThinkingLevel, ToolChoice,
};
use ikigai_tools::{ToolCall, ToolRegistry};
use ikigai_tui::{
    clamp_offset, compose_frame, ArrowDirection, InputAction, InputDecoder, LineHistory, Renderer,
    ScrollDetector, ScrollResult, Terminal, SPINNER_FRAMES,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, PendingToolCall, RequestState};
use crate::db::Database;

/// Spinner frame period.
const SPINNER_TICK_MS: u64 = 80;
/// Poll interval while any agent is executing a tool.
const TOOL_POLL_MS: u64 = 50;
/// Fallback wake-up when nothing else is pending.
const IDLE_TICK_MS: u64 = 1000;

/// Fallback terminal geometry for headless operation (tests).
const HEADLESS_SIZE: (usize, usize) = (80, 24);

enum Wake {
    Byte(Option<u8>),
    Engine(TransferEvent),
    Tick,
}

pub struct Repl {
    pub(crate) config: Config,
    pub(crate) db: Box<dyn Database>,
    pub(crate) session_id: i64,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) agents: Vec<Agent>,
    pub(crate) current: Option<Uuid>,
    decoder: InputDecoder,
    scroll: ScrollDetector,
    pub(crate) history: LineHistory,
    renderer: Renderer,
    term: Option<Terminal>,
    pub(crate) engine: MultiEngine,
    /// Transfer → owning agent.
    transfers: HashMap<TransferId, Uuid>,
    pub(crate) fork_pending: AtomicBool,
    pub(crate) quit: bool,
    started: Instant,
    api_key: Option<String>,
}

impl Repl {
    /// Build a REPL with one root agent from configuration.  The terminal
    /// is attached separately so tests can drive the loop headless.
    pub fn new(config: Config, db: Box<dyn Database>) -> anyhow::Result<Self> {
        let thinking = Thinking {
            level: match config.model.thinking_level {
                ikigai_config::ThinkingLevelConfig::None => ThinkingLevel::None,
                ikigai_config::ThinkingLevelConfig::Low => ThinkingLevel::Low,
                ikigai_config::ThinkingLevelConfig::Medium => ThinkingLevel::Medium,
                ikigai_config::ThinkingLevelConfig::High => ThinkingLevel::High,
            },
            include_summary: config.model.include_thinking,
        };
        let root = Agent::new(
            config.model.provider.clone(),
            config.model.name.clone(),
            thinking,
            None,
        );

        let api_key = resolve_credentials(&config);
        let history_size = config.repl.history_size.max(1);
        let current = root.id;

        let mut repl = Self {
            config,
            db,
            session_id: 0,
            registry: Arc::new(ikigai_tools::builtin_registry()),
            agents: vec![root],
            current: Some(current),
            decoder: InputDecoder::new(),
            scroll: ScrollDetector::new(),
            history: LineHistory::new(history_size),
            renderer: Renderer::new(),
            term: None,
            engine: MultiEngine::new(),
            transfers: HashMap::new(),
            fork_pending: AtomicBool::new(false),
            quit: false,
            started: Instant::now(),
            api_key,
        };
        repl.insert_root_row()?;
        Ok(repl)
    }

    fn insert_root_row(&mut self) -> anyhow::Result<()> {
        let root = &self.agents[0];
        let row = crate::db::AgentRow {
            uuid: root.id,
            parent_uuid: None,
            created_at: root.created_at,
            provider: root.provider_name.clone(),
            model: root.model.clone(),
        };
        self.db.begin().map_err(anyhow::Error::from)?;
        if let Err(e) = self.db.agent_insert(&row) {
            let _ = self.db.rollback();
            return Err(e.into());
        }
        self.db.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }

    /// Open `/dev/tty` and take over the screen.
    pub fn attach_terminal(&mut self) -> anyhow::Result<()> {
        self.term = Some(Terminal::open()?);
        self.renderer.invalidate();
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn current_agent(&self) -> Option<&Agent> {
        let id = self.current?;
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn current_agent_mut(&mut self) -> Option<&mut Agent> {
        let id = self.current?;
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub(crate) fn agent_index(&self, id: Uuid) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn size(&self) -> (usize, usize) {
        self.term.as_ref().map(|t| t.size()).unwrap_or(HEADLESS_SIZE)
    }

    // ── Main loop ─────────────────────────────────────────────────────────────

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut byte_rx = self.spawn_reader();
        info!(agent = %self.agents[0].short_id(), "repl started");
        self.render();

        while !self.quit {
            let timeout = self.select_timeout();
            let wake = {
                let engine = &mut self.engine;
                tokio::select! {
                    b = byte_rx.recv() => Wake::Byte(b),
                    ev = engine.next_event() => Wake::Engine(ev),
                    _ = tokio::time::sleep(timeout) => Wake::Tick,
                }
            };
            match wake {
                Wake::Byte(None) => self.quit = true,
                Wake::Byte(Some(b)) => self.handle_byte(b),
                Wake::Engine(ev) => self.handle_engine_event(ev),
                Wake::Tick => {}
            }
            self.on_tick();
            self.render();
        }

        info!("repl shutting down");
        if let Some(mut term) = self.term.take() {
            term.restore();
        }
        Ok(())
    }

    /// Dedicated blocking reader feeding terminal bytes into the loop.
    ///
    /// A second `/dev/tty` handle is opened for reading so the write side
    /// stays owned by the renderer; raw mode applies to the device, not the
    /// descriptor.
    fn spawn_reader(&self) -> mpsc::UnboundedReceiver<u8> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.term.is_some() {
            let tty = std::fs::OpenOptions::new().read(true).open("/dev/tty");
            std::thread::spawn(move || {
                use std::io::Read;
                let Ok(mut tty) = tty else { return };
                let mut buf = [0u8; 1];
                while let Ok(n) = tty.read(&mut buf) {
                    if n == 0 || tx.send(buf[0]).is_err() {
                        break;
                    }
                }
            });
        }
        rx
    }

    fn select_timeout(&self) -> Duration {
        let mut ms = IDLE_TICK_MS;
        if self.agents.iter().any(|a| a.spinner_visible) {
            ms = ms.min(SPINNER_TICK_MS);
        }
        if self
            .agents
            .iter()
            .any(|a| a.state() == RequestState::ExecutingTool)
        {
            ms = ms.min(TOOL_POLL_MS);
        }
        if let Some(remaining) = self.scroll.timeout_ms(self.now_ms()) {
            ms = ms.min(remaining.max(0) as u64);
        }
        Duration::from_millis(ms.max(1))
    }

    /// Timer work: flush the scroll detector, advance spinners, harvest
    /// finished tool workers.  Runs every loop iteration.
    fn on_tick(&mut self) {
        match self.scroll.check_timeout(self.now_ms()) {
            ScrollResult::ArrowUp => self.arrow_key(ArrowDirection::Up),
            ScrollResult::ArrowDown => self.arrow_key(ArrowDirection::Down),
            _ => {}
        }
        for a in &mut self.agents {
            if a.spinner_visible {
                a.spinner_frame = (a.spinner_frame + 1) % SPINNER_FRAMES.len();
            }
        }
        self.harvest_tools();
    }

    // ── Input handling ────────────────────────────────────────────────────────

    fn handle_byte(&mut self, byte: u8) {
        if let Some(action) = self.decoder.feed(byte) {
            self.handle_action(action);
        }
    }

    /// Apply one semantic action to the current agent.
    pub(crate) fn handle_action(&mut self, action: InputAction) {
        use InputAction::*;
        match action {
            // Vertical arrows go through the wheel-burst detector.
            ArrowUp => self.detect_arrow(ArrowDirection::Up),
            ArrowDown => self.detect_arrow(ArrowDirection::Down),
            ScrollUp => self.scroll_viewport(1),
            ScrollDown => self.scroll_viewport(-1),
            PageUp => {
                let (_, rows) = self.size();
                self.scroll_viewport(rows as i64);
            }
            PageDown => {
                let (_, rows) = self.size();
                self.scroll_viewport(-(rows as i64));
            }
            Char(c) => self.edit(|a| a.input.insert_char(c)),
            InsertNewline => self.edit(|a| a.input.insert_newline()),
            Backspace => self.edit(|a| a.input.backspace()),
            Delete => self.edit(|a| a.input.delete()),
            KillToEnd => self.edit(|a| a.input.kill_to_line_end()),
            KillLine => self.edit(|a| a.input.kill_line()),
            DeleteWordBack => self.edit(|a| a.input.delete_word_backward()),
            ArrowLeft => self.motion(|a| a.input.cursor_left()),
            ArrowRight => self.motion(|a| a.input.cursor_right()),
            LineStart => self.motion(|a| a.input.cursor_to_line_start()),
            LineEnd => self.motion(|a| a.input.cursor_to_line_end()),
            Newline => self.submit_line(),
            Escape => {
                self.history.stop_browsing();
                if let Some(a) = self.current_agent_mut() {
                    a.input.clear();
                    a.viewport_offset = 0;
                }
            }
            NavParent => self.nav_parent(),
            NavChild => self.nav_child(),
            NavPrevSibling => self.nav_sibling(-1),
            NavNextSibling => self.nav_sibling(1),
            Interrupt => self.quit = true,
            Eof => {
                if self.current_agent().map(|a| a.input.is_empty()).unwrap_or(true) {
                    self.quit = true;
                }
            }
            Tab | Unknown => {}
        }
    }

    /// Editing mutation: leaves history browsing, auto-scrolls to bottom.
    fn edit(&mut self, f: impl FnOnce(&mut Agent)) {
        self.history.stop_browsing();
        if let Some(a) = self.current_agent_mut() {
            f(a);
            a.viewport_offset = 0;
        }
    }

    /// Horizontal cursor motion: no history involvement, no auto-scroll
    /// change beyond keeping the input visible.
    fn motion(&mut self, f: impl FnOnce(&mut Agent)) {
        if let Some(a) = self.current_agent_mut() {
            f(a);
        }
    }

    fn detect_arrow(&mut self, dir: ArrowDirection) {
        let now = self.now_ms();
        match self.scroll.process_arrow(dir, now) {
            ScrollResult::WheelUp => self.scroll_viewport(1),
            ScrollResult::WheelDown => self.scroll_viewport(-1),
            ScrollResult::ArrowUp => self.arrow_key(ArrowDirection::Up),
            ScrollResult::ArrowDown => self.arrow_key(ArrowDirection::Down),
            ScrollResult::None | ScrollResult::Absorbed => {}
        }
    }

    /// A keyboard arrow (as classified by the detector): buffer-local
    /// movement first, history recall at the buffer edge.
    pub(crate) fn arrow_key(&mut self, dir: ArrowDirection) {
        let Some(idx) = self.current.and_then(|id| self.agent_index(id)) else {
            return;
        };
        match dir {
            ArrowDirection::Up => {
                if self.history.is_browsing() {
                    if let Some(text) = self.history.prev() {
                        let text = text.to_string();
                        self.agents[idx].input.set_text(&text);
                    }
                    return;
                }
                if self.agents[idx].input.cursor_up() {
                    return;
                }
                let pending = self.agents[idx].input.text().to_string();
                self.history.start_browsing(&pending);
                if let Some(text) = self.history.current() {
                    let text = text.to_string();
                    self.agents[idx].input.set_text(&text);
                }
            }
            ArrowDirection::Down => {
                if self.history.is_browsing() {
                    if let Some(text) = self.history.next() {
                        let text = text.to_string();
                        self.agents[idx].input.set_text(&text);
                    } else if let Some(text) = self.history.current() {
                        // Stepped back onto the pending draft.
                        let text = text.to_string();
                        self.agents[idx].input.set_text(&text);
                    }
                    return;
                }
                self.agents[idx].input.cursor_down();
            }
        }
    }

    fn scroll_viewport(&mut self, delta: i64) {
        let (width, height) = self.size();
        let Some(idx) = self.current.and_then(|id| self.agent_index(id)) else {
            return;
        };
        let doc_rows = self.document_rows(idx, width);
        let a = &mut self.agents[idx];
        let next = (a.viewport_offset as i64 + delta).max(0) as usize;
        a.viewport_offset = clamp_offset(doc_rows, height, next);
    }

    fn document_rows(&mut self, idx: usize, width: usize) -> usize {
        let a = &mut self.agents[idx];
        let input_rows = a.input.physical_lines(width).max(1);
        a.scrollback.total_rows(width) + 1 + input_rows + 1
    }

    // ── Agent-tree navigation ─────────────────────────────────────────────────

    fn nav_parent(&mut self) {
        if let Some(parent) = self.current_agent().and_then(|a| a.parent) {
            self.switch_to(parent);
        }
    }

    fn nav_child(&mut self) {
        let Some(id) = self.current else { return };
        if let Some(child) = self.agents.iter().find(|a| a.parent == Some(id)) {
            let child = child.id;
            self.switch_to(child);
        }
    }

    fn nav_sibling(&mut self, step: i64) {
        let Some(current) = self.current_agent() else { return };
        let parent = current.parent;
        let id = current.id;
        let siblings: Vec<Uuid> = self
            .agents
            .iter()
            .filter(|a| a.parent == parent)
            .map(|a| a.id)
            .collect();
        let Some(pos) = siblings.iter().position(|&s| s == id) else {
            return;
        };
        let next = pos as i64 + step;
        if next < 0 || next as usize >= siblings.len() {
            return;
        }
        self.switch_to(siblings[next as usize]);
    }

    pub(crate) fn switch_to(&mut self, id: Uuid) {
        if self.agent_index(id).is_some() {
            self.current = Some(id);
            self.renderer.invalidate();
        }
    }

    // ── Submission ────────────────────────────────────────────────────────────

    /// Enter: submit the input buffer as a command or a user message.
    pub(crate) fn submit_line(&mut self) {
        self.history.stop_browsing();
        let Some(a) = self.current_agent_mut() else { return };
        let text = a.input.take();
        a.viewport_offset = 0;
        if text.trim().is_empty() {
            return;
        }
        if text.starts_with('/') {
            self.history.add(&text);
            self.dispatch_command(&text);
        } else {
            self.submit_user_message(text);
        }
    }

    /// Append a user message to the current conversation and start an LLM
    /// turn.
    pub(crate) fn submit_user_message(&mut self, text: String) {
        let Some(id) = self.current else { return };
        let Some(idx) = self.agent_index(id) else { return };

        self.history.add(&text);

        let a = &mut self.agents[idx];
        for line in text.lines() {
            a.scrollback.append_line(format!("> {line}"));
        }
        a.conversation.push(Message::user(&text));
        a.tool_iteration_count = 0;
        a.tool_choice_none_sent = false;

        self.persist_message(id, "user", &text);
        self.start_request(id, ToolChoice::Auto);
    }

    fn persist_message(&mut self, agent: Uuid, kind: &str, content: &str) {
        if self.config.database_url.is_none() {
            return;
        }
        let data_json = format!(
            "{{\"model\":\"{}\"}}",
            self.config.model.name.replace('"', "")
        );
        if let Err(e) =
            self.db
                .message_insert(self.session_id, Some(&agent), kind, content, &data_json)
        {
            warn!(error = %e, "failed to persist message");
        }
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    fn ensure_provider(&mut self, idx: usize) -> Result<(), String> {
        if self.agents[idx].provider.is_some() {
            return Ok(());
        }
        let a = &self.agents[idx];
        let model_cfg = ikigai_config::ModelConfig {
            provider: a.provider_name.clone(),
            name: a.model.clone(),
            base_url: self.config.model.base_url.clone(),
            ..self.config.model.clone()
        };
        match ikigai_model::from_config(&model_cfg, self.api_key.clone()) {
            Ok(p) => {
                self.agents[idx].provider = Some(p);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn build_request(&self, idx: usize, tool_choice: ToolChoice) -> Request {
        let a = &self.agents[idx];
        let supports_temperature = a
            .provider
            .as_ref()
            .map(|p| p.supports_temperature())
            .unwrap_or(true);
        Request {
            model: a.model.clone(),
            system: self.config.model.system_message.clone(),
            messages: a.conversation.clone(),
            tools: self.registry.definitions(),
            tool_choice,
            max_output_tokens: self.config.model.max_completion_tokens,
            thinking: a.thinking,
            temperature: self
                .config
                .model
                .temperature
                .filter(|_| supports_temperature),
        }
    }

    /// Submit an LLM request for `agent`.  Legal from idle (user turn) and
    /// from executing-tool (follow-up).
    pub(crate) fn start_request(&mut self, agent: Uuid, tool_choice: ToolChoice) {
        let Some(idx) = self.agent_index(agent) else { return };

        if let Err(e) = self.ensure_provider(idx) {
            self.agents[idx].push_error_line(&e);
            self.agents[idx].force_idle();
            return;
        }

        let request = self.build_request(idx, tool_choice);
        let a = &mut self.agents[idx];
        let (wire, parser) = {
            let provider = a.provider.as_ref().expect("provider ensured above");
            match provider.prepare(&request) {
                Ok(w) => (w, provider.stream_parser()),
                Err(e) => {
                    let msg = user_message(&a.provider_name, e.category, Some(&e.message));
                    a.push_error_line(&msg);
                    a.force_idle();
                    return;
                }
            }
        };

        if let Err(e) = a.transition(RequestState::WaitingForLlm) {
            a.push_error_line(&e);
            return;
        }
        a.parser = Some(parser);
        a.reset_response_accumulators();
        a.last_stream_error = None;
        a.spinner_visible = true;
        a.curl_still_running = 1;
        a.pending_tool_call = None;

        let transfer = self.engine.add(wire);
        self.transfers.insert(transfer, agent);
        self.agents[idx].inflight = Some(transfer);
        debug!(agent = %self.agents[idx].short_id(), transfer = transfer.0, "request submitted");
    }

    // ── Transfer events ───────────────────────────────────────────────────────

    pub(crate) fn handle_engine_event(&mut self, ev: TransferEvent) {
        match ev {
            TransferEvent::Chunk { id, bytes } => {
                let Some(&agent) = self.transfers.get(&id) else { return };
                let Some(idx) = self.agent_index(agent) else { return };
                let a = &mut self.agents[idx];
                let Some(parser) = a.parser.as_mut() else { return };
                let events = parser.feed(&bytes);
                for ev in events {
                    if let StreamEvent::Error { category, message } = &ev {
                        a.last_stream_error = Some((*category, message.clone()));
                    }
                    a.apply_stream_event(&ev);
                }
            }
            TransferEvent::Completed { id, outcome } => {
                let Some(agent) = self.transfers.remove(&id) else { return };
                let Some(idx) = self.agent_index(agent) else { return };
                self.agents[idx].inflight = None;
                self.agents[idx].curl_still_running = 0;
                match outcome {
                    Completion::Success { .. } => self.finish_response(agent),
                    Completion::ClientError { status, body }
                    | Completion::ServerError { status, body } => {
                        let a = &self.agents[idx];
                        let category = a
                            .provider
                            .as_ref()
                            .map(|p| p.classify_error(status, &body))
                            .unwrap_or(ErrorCategory::Unknown);
                        let detail = extract_error_detail(&body);
                        self.fail_request(agent, category, detail.as_deref());
                    }
                    Completion::NetworkError { message } => {
                        self.fail_request(agent, ErrorCategory::Network, Some(&message));
                    }
                }
            }
        }
    }

    /// The transfer finished cleanly: assemble the canonical response and
    /// run the state machine.
    fn finish_response(&mut self, agent: Uuid) {
        let Some(idx) = self.agent_index(agent) else { return };

        let (response, stream_error) = {
            let a = &mut self.agents[idx];
            let response = match a.parser.take() {
                Some(mut p) => p.finish(),
                None => Response::default(),
            };
            (response, a.last_stream_error.take())
        };

        if let Some((category, message)) = stream_error {
            self.fail_request(agent, category, Some(&message));
            return;
        }
        if response.finish_reason == FinishReason::Error {
            self.fail_request(agent, ErrorCategory::Unknown, None);
            return;
        }

        let a = &mut self.agents[idx];
        a.flush_partial_line();

        // A tool_calls finish on the final (tool_choice = none) request is a
        // provider violation; treat it as a normal stop.
        let wants_tool = response.finish_reason == FinishReason::ToolCalls
            && !a.tool_choice_none_sent
            && response.tool_calls().first().is_some();

        // The assistant turn enters the conversation either way.
        if !response.blocks.is_empty() {
            a.conversation.push(Message {
                role: Role::Assistant,
                blocks: response.blocks.clone(),
                provider_metadata: response.provider_metadata.clone(),
            });
        }

        if wants_tool {
            let (call_id, name, arguments) = {
                let Some(ContentBlock::ToolCall { id, name, arguments, .. }) =
                    response.tool_calls().first().copied()
                else {
                    unreachable!("wants_tool checked above");
                };
                (id.clone(), name.clone(), arguments.clone())
            };
            a.pending_tool_call = Some(PendingToolCall {
                id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            });
            if a.transition(RequestState::ExecutingTool).is_err() {
                a.force_idle();
                return;
            }
            a.scrollback.append_line(format!("⚙ {name}"));

            let args = serde_json::from_str(&arguments).unwrap_or(serde_json::json!({}));
            let call = ToolCall { id: call_id, name, args };
            let registry = Arc::clone(&self.registry);
            let a = &mut self.agents[idx];
            if let Err(e) = a.start_tool(registry, call) {
                a.push_error_line(&e);
                a.force_idle();
            }
            let text = self.agents[idx].assistant_response.clone();
            if !text.is_empty() {
                self.persist_message(agent, "assistant", &text);
            }
            return;
        }

        let text = a.assistant_response.clone();
        a.spinner_visible = false;
        let _ = a.transition(RequestState::Idle);
        a.pending_tool_call = None;
        if !text.is_empty() {
            self.persist_message(agent, "assistant", &text);
        }
    }

    /// Error propagation: one visible scrollback line, partial output
    /// dropped, agent back to idle, REPL keeps running.
    fn fail_request(&mut self, agent: Uuid, category: ErrorCategory, detail: Option<&str>) {
        let Some(idx) = self.agent_index(agent) else { return };
        let a = &mut self.agents[idx];
        a.discard_partial_response();
        a.parser = None;
        let msg = user_message(&a.provider_name, category, detail);
        a.push_error_line(&msg);
        a.force_idle();
        debug!(agent = %a.short_id(), category = category.name(), "request failed");
    }

    // ── Tool loop ─────────────────────────────────────────────────────────────

    /// Harvest finished tool workers for every agent and continue their
    /// tool loops.
    fn harvest_tools(&mut self) {
        let ids: Vec<Uuid> = self.agents.iter().map(|a| a.id).collect();
        for id in ids {
            let Some(idx) = self.agent_index(id) else { continue };
            if self.agents[idx].state() != RequestState::ExecutingTool {
                continue;
            }
            let Some(output) = self.agents[idx].poll_tool() else {
                continue;
            };

            let a = &mut self.agents[idx];
            let call_id = a
                .pending_tool_call
                .take()
                .map(|p| p.id)
                .unwrap_or_default();
            a.conversation
                .push(Message::tool_result(&call_id, &output.content, output.is_error));
            a.tool_iteration_count += 1;

            let reached_ceiling = a.tool_iteration_count >= self.config.repl.max_tool_turns;
            let choice = if reached_ceiling {
                a.tool_choice_none_sent = true;
                ToolChoice::None
            } else {
                ToolChoice::Auto
            };

            self.persist_message(id, "tool_result", &output.content);
            self.start_request(id, choice);
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn render(&mut self) {
        let Some(idx) = self.current.and_then(|id| self.agent_index(id)) else {
            return;
        };
        let Some(term) = self.term.as_mut() else { return };
        let (width, height) = term.size();
        let a = &mut self.agents[idx];
        let spinner = a
            .spinner_visible
            .then(|| SPINNER_FRAMES[a.spinner_frame % SPINNER_FRAMES.len()]);
        let frame = compose_frame(
            &mut a.scrollback,
            &a.input,
            width,
            height,
            a.viewport_offset,
            spinner,
        );
        if let Err(e) = self.renderer.render(&frame, term) {
            warn!(error = %e, "render failed");
        }
    }

    // ── Test support ──────────────────────────────────────────────────────────

    /// Drive engine events and tool workers until every agent is idle.
    /// Headless equivalent of the select loop, used by the scenario tests.
    #[cfg(test)]
    pub(crate) async fn run_until_idle(&mut self) {
        for _ in 0..2000 {
            let busy = self
                .agents
                .iter()
                .any(|a| a.state() != RequestState::Idle);
            if !busy {
                return;
            }
            let deadline = tokio::time::sleep(Duration::from_millis(5));
            tokio::pin!(deadline);
            let ev = {
                let engine = &mut self.engine;
                tokio::select! {
                    ev = engine.next_event() => Some(ev),
                    _ = &mut deadline => None,
                }
            };
            if let Some(ev) = ev {
                self.handle_engine_event(ev);
            }
            self.harvest_tools();
        }
        panic!("agents did not reach idle");
    }
}

/// Resolve the configured provider's API key (explicit config value, env
/// var, then the credentials file).
fn resolve_credentials(config: &Config) -> Option<String> {
    let credentials = ikigai_config::Paths::resolve()
        .ok()
        .and_then(|paths| ikigai_config::Credentials::load(&paths.credentials_file()).ok())
        .unwrap_or_default();
    ikigai_config::resolve_api_key(&config.model, &credentials)
}

/// Pull a human-readable message out of a provider error body.
fn extract_error_detail(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v["error"]["message"]
        .as_str()
        .or_else(|| v["error"].as_str())
        .map(str::to_string)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
