// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Scripted provider for tests and offline development.
//!
//! The mock speaks the OpenAI SSE dialect over a `mock://` loopback URL: the
//! transfer engine recognizes the scheme and echoes the request body back as
//! the response stream, so the whole pipeline — engine, parser, agent state
//! machine — runs exactly as it does against a live provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::provider::{Provider, StreamParser, WireRequest};
use crate::{Request, ThinkingLevel};

/// One scripted assistant turn.
#[derive(Debug, Clone)]
pub enum MockTurn {
    /// Plain text reply, finish reason `stop`.
    Text(String),
    /// A single tool call, finish reason `tool_calls`.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<MockTurn>>,
}

impl MockProvider {
    pub fn new(model: String) -> Self {
        Self { model, script: Mutex::new(VecDeque::new()) }
    }

    pub fn with_script(model: impl Into<String>, turns: Vec<MockTurn>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(turns.into()),
        }
    }

    /// Append a turn to the pending script.
    pub fn push_turn(&self, turn: MockTurn) {
        self.script.lock().unwrap().push_back(turn);
    }

    /// Build the OpenAI-dialect SSE transcript for one turn.
    fn render_sse(&self, turn: &MockTurn) -> String {
        match turn {
            MockTurn::Text(text) => format!(
                "data: {}\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
                serde_json::json!({
                    "model": self.model,
                    "choices": [{ "delta": { "content": text } }],
                }),
                serde_json::json!({
                    "choices": [{ "delta": {}, "finish_reason": "stop" }],
                }),
                serde_json::json!({
                    "choices": [],
                    "usage": { "prompt_tokens": 7, "completion_tokens": 5, "total_tokens": 12 },
                }),
            ),
            MockTurn::ToolCall { id, name, arguments } => format!(
                "data: {}\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
                serde_json::json!({
                    "model": self.model,
                    "choices": [{ "delta": { "tool_calls": [{
                        "index": 0,
                        "id": id,
                        "function": { "name": name, "arguments": arguments },
                    }] } }],
                }),
                serde_json::json!({
                    "choices": [{ "delta": {}, "finish_reason": "tool_calls" }],
                }),
                serde_json::json!({
                    "choices": [],
                    "usage": { "prompt_tokens": 7, "completion_tokens": 9, "total_tokens": 16 },
                }),
            ),
        }
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn validate_thinking(&self, _level: ThinkingLevel) -> Result<(), ProviderError> {
        Ok(())
    }

    fn prepare(&self, req: &Request) -> Result<WireRequest, ProviderError> {
        let turn = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            // Unscripted: echo the last user message.
            let last_user = req
                .messages
                .iter()
                .rev()
                .find(|m| m.role == crate::Role::User)
                .map(|m| m.text())
                .unwrap_or_default();
            MockTurn::Text(format!("Mock response to: {last_user}"))
        });
        Ok(WireRequest {
            url: "mock://completions".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: self.render_sse(&turn),
        })
    }

    fn stream_parser(&self) -> Box<dyn StreamParser> {
        // The transcript is OpenAI-dialect SSE.
        crate::OpenAiProvider::new(self.model.clone(), Some(String::new()), None).stream_parser()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
