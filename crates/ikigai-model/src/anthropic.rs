// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{status_to_category, ErrorCategory, ProviderError};
use crate::provider::{Accumulator, Provider, StreamParser, WireRequest};
use crate::sse::SseLineBuffer;
use crate::{
    ContentBlock, FinishReason, Message, Request, Response, Role, StreamEvent, ThinkingLevel,
    ToolChoice,
};

pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
        }
    }
}

/// Output-token ceiling sent when the request does not specify one.
/// Anthropic requires `max_tokens` on every request.
const DEFAULT_MAX_TOKENS: u32 = 4096;

// ─── Thinking budgets ─────────────────────────────────────────────────────────

/// Budget limits (min, max) for known Claude models; all powers of 2.
/// 4.6-generation models use adaptive thinking, not budgets.
const BUDGET_TABLE: &[(&str, i64, i64)] = &[
    ("claude-sonnet-4-5", 1024, 65536),
    ("claude-haiku-4-5", 1024, 32768),
    ("claude-opus-4-5", 1024, 65536),
];

const DEFAULT_MIN_BUDGET: i64 = 1024;
const DEFAULT_MAX_BUDGET: i64 = 32768;

const ADAPTIVE_MODELS: &[&str] = &["claude-opus-4-6", "claude-sonnet-4-6"];

fn floor_power_of_2(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    1i64 << (63 - n.leading_zeros() as i64)
}

pub(crate) fn supports_thinking(model: &str) -> bool {
    model.starts_with("claude-")
}

pub(crate) fn is_adaptive_model(model: &str) -> bool {
    ADAPTIVE_MODELS.iter().any(|m| model.starts_with(m))
}

/// Effort string for adaptive models; `None` when the model is budget-based
/// or the level disables thinking.
pub(crate) fn thinking_effort(model: &str, level: ThinkingLevel) -> Option<&'static str> {
    if !is_adaptive_model(model) {
        return None;
    }
    match level {
        ThinkingLevel::None => None,
        ThinkingLevel::Low => Some("low"),
        ThinkingLevel::Medium => Some("medium"),
        ThinkingLevel::High => Some("high"),
    }
}

/// Token budget for budget-based Claude models at the given level.
pub(crate) fn thinking_budget(model: &str, level: ThinkingLevel) -> Option<i64> {
    if !supports_thinking(model) {
        return None;
    }
    let (min, max) = BUDGET_TABLE
        .iter()
        .find(|(m, _, _)| model.starts_with(m))
        .map(|(_, min, max)| (*min, *max))
        .unwrap_or((DEFAULT_MIN_BUDGET, DEFAULT_MAX_BUDGET));
    let range = max - min;
    Some(match level {
        ThinkingLevel::None => min,
        ThinkingLevel::Low => floor_power_of_2(min + range / 3),
        ThinkingLevel::Medium => floor_power_of_2(min + 2 * range / 3),
        ThinkingLevel::High => max,
    })
}

// ─── Request serialization ────────────────────────────────────────────────────

fn tool_choice_value(choice: ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({ "type": "auto" }),
        ToolChoice::None => json!({ "type": "none" }),
        ToolChoice::Required => json!({ "type": "any" }),
    }
}

/// Convert canonical messages into the Anthropic wire format.
///
/// Tool results travel as `user` messages carrying `tool_result` blocks;
/// thinking and redacted-thinking blocks are replayed so multi-turn tool
/// conversations keep their signatures intact.
pub(crate) fn build_anthropic_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for m in messages {
        let role = match m.role {
            Role::Assistant => "assistant",
            // System text travels top-level; a stray system message in the
            // transcript is demoted to user rather than dropped.
            Role::User | Role::Tool | Role::System => "user",
        };
        let mut content: Vec<Value> = Vec::new();
        for b in &m.blocks {
            match b {
                ContentBlock::Text { text } => {
                    content.push(json!({ "type": "text", "text": text }));
                }
                ContentBlock::Thinking { text } => {
                    content.push(json!({ "type": "thinking", "thinking": text }));
                }
                ContentBlock::RedactedThinking { data } => {
                    content.push(json!({ "type": "redacted_thinking", "data": data }));
                }
                ContentBlock::ToolCall { id, name, arguments, .. } => {
                    content.push(json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": serde_json::from_str::<Value>(arguments).unwrap_or(json!({})),
                    }));
                }
                ContentBlock::ToolResult { tool_call_id, content: text, is_error } => {
                    content.push(json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": text,
                        "is_error": is_error,
                    }));
                }
            }
        }
        if content.is_empty() {
            continue;
        }
        out.push(json!({ "role": role, "content": content }));
    }
    out
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn validate_thinking(&self, level: ThinkingLevel) -> Result<(), ProviderError> {
        if level == ThinkingLevel::None || supports_thinking(&self.model) {
            Ok(())
        } else {
            Err(ProviderError::new(
                ErrorCategory::InvalidArgument,
                format!("model '{}' does not support thinking", self.model),
            ))
        }
    }

    fn prepare(&self, req: &Request) -> Result<WireRequest, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(ErrorCategory::MissingCredentials, "ANTHROPIC_API_KEY not set")
        })?;

        let mut body = json!({
            "model": req.model,
            "messages": build_anthropic_messages(&req.messages),
            "max_tokens": req.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(sys) = req.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(sys);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = tool_choice_value(req.tool_choice);
        }
        if req.thinking.level != ThinkingLevel::None {
            if let Some(effort) = thinking_effort(&req.model, req.thinking.level) {
                body["thinking"] = json!({ "type": "enabled", "effort": effort });
            } else if let Some(budget) = thinking_budget(&req.model, req.thinking.level) {
                body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
            }
        }

        debug!(model = %req.model, message_count = req.messages.len(), "prepared anthropic request");

        Ok(WireRequest {
            url: format!("{}/v1/messages", self.base_url.trim_end_matches('/')),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Accept".into(), "text/event-stream".into()),
                ("x-api-key".into(), key.to_string()),
                ("anthropic-version".into(), "2023-06-01".into()),
            ],
            body: body.to_string(),
        })
    }

    fn stream_parser(&self) -> Box<dyn StreamParser> {
        Box::new(AnthropicStreamParser::new())
    }

    fn classify_error(&self, status: u16, body: &str) -> ErrorCategory {
        if let Ok(v) = serde_json::from_str::<Value>(body) {
            match v["error"]["type"].as_str().unwrap_or("") {
                "authentication_error" | "permission_error" => return ErrorCategory::Auth,
                "rate_limit_error" => return ErrorCategory::RateLimit,
                "invalid_request_error" => return ErrorCategory::InvalidArgument,
                "not_found_error" => return ErrorCategory::NotFound,
                "overloaded_error" | "api_error" => return ErrorCategory::Server,
                _ => {}
            }
        }
        status_to_category(status)
    }
}

// ─── Stream parsing ───────────────────────────────────────────────────────────

/// Kind of the content block currently open at each index.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OpenBlock {
    Text,
    Thinking,
    ToolUse,
    Redacted,
}

struct AnthropicStreamParser {
    lines: SseLineBuffer,
    acc: Accumulator,
    /// Block kind per stream index, so deltas route correctly.
    open_blocks: std::collections::HashMap<u32, OpenBlock>,
    done_emitted: bool,
}

impl AnthropicStreamParser {
    fn new() -> Self {
        Self {
            lines: SseLineBuffer::new(),
            acc: Accumulator::new(),
            open_blocks: std::collections::HashMap::new(),
            done_emitted: false,
        }
    }

    fn map_stop_reason(reason: &str) -> FinishReason {
        match reason {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolCalls,
            "refusal" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }

    fn parse_event(&mut self, v: &Value, events: &mut Vec<StreamEvent>) {
        match v["type"].as_str().unwrap_or("") {
            "message_start" => {
                let model = v["message"]["model"].as_str().unwrap_or("").to_string();
                self.acc.set_model(&model);
                if let Some(usage) = v["message"].get("usage") {
                    let u = self.acc.usage_mut();
                    u.input_tokens = usage["input_tokens"].as_u64().unwrap_or(0) as u32;
                }
                events.push(StreamEvent::Start { model });
            }
            "content_block_start" => {
                let index = v["index"].as_u64().unwrap_or(0) as u32;
                let block = &v["content_block"];
                match block["type"].as_str().unwrap_or("") {
                    "tool_use" => {
                        let id = block["id"].as_str().unwrap_or("");
                        let name = block["name"].as_str().unwrap_or("");
                        if let Some(done) = self.acc.start_tool_call(index, id, name) {
                            events.push(done);
                        }
                        events.push(StreamEvent::ToolCallStart {
                            index,
                            id: id.to_string(),
                            name: name.to_string(),
                        });
                        self.open_blocks.insert(index, OpenBlock::ToolUse);
                    }
                    "thinking" => {
                        self.open_blocks.insert(index, OpenBlock::Thinking);
                    }
                    "redacted_thinking" => {
                        let data = block["data"].as_str().unwrap_or("");
                        self.acc.push_redacted_thinking(data);
                        self.open_blocks.insert(index, OpenBlock::Redacted);
                    }
                    _ => {
                        self.open_blocks.insert(index, OpenBlock::Text);
                    }
                }
            }
            "content_block_delta" => {
                let index = v["index"].as_u64().unwrap_or(0) as u32;
                let delta = &v["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        let text = delta["text"].as_str().unwrap_or("");
                        if !text.is_empty() {
                            self.acc.push_text(text);
                            events.push(StreamEvent::TextDelta { text: text.to_string() });
                        }
                    }
                    "thinking_delta" => {
                        let text = delta["thinking"].as_str().unwrap_or("");
                        if !text.is_empty() {
                            self.acc.push_thinking(text);
                            events.push(StreamEvent::ThinkingDelta { text: text.to_string() });
                        }
                    }
                    "input_json_delta" => {
                        let partial = delta["partial_json"].as_str().unwrap_or("");
                        if !partial.is_empty() {
                            self.acc.push_tool_arguments(index, partial);
                            events.push(StreamEvent::ToolCallDelta {
                                index,
                                arguments: partial.to_string(),
                            });
                        }
                    }
                    // The signature blob is integrity data for thinking
                    // blocks; it is never rendered or logged.
                    "signature_delta" => {}
                    _ => {}
                }
            }
            "content_block_stop" => {
                let index = v["index"].as_u64().unwrap_or(0) as u32;
                if self.open_blocks.remove(&index) == Some(OpenBlock::ToolUse) {
                    if let Some(done) = self.acc.close_open_tool() {
                        events.push(done);
                    }
                }
            }
            "message_delta" => {
                if let Some(reason) = v["delta"]["stop_reason"].as_str() {
                    self.acc.set_finish_reason(Self::map_stop_reason(reason));
                }
                if let Some(usage) = v.get("usage") {
                    let u = self.acc.usage_mut();
                    u.output_tokens = usage["output_tokens"].as_u64().unwrap_or(0) as u32;
                    u.total_tokens = u.input_tokens + u.output_tokens;
                }
            }
            "message_stop" => {
                if let Some(done) = self.acc.close_open_tool() {
                    events.push(done);
                }
                self.done_emitted = true;
                events.push(StreamEvent::Done {
                    finish_reason: self.acc.finish_reason(),
                    usage: self.acc.usage(),
                });
            }
            "error" => {
                let etype = v["error"]["type"].as_str().unwrap_or("");
                let message = v["error"]["message"].as_str().unwrap_or("stream error");
                let category = match etype {
                    "overloaded_error" | "api_error" => ErrorCategory::Server,
                    "rate_limit_error" => ErrorCategory::RateLimit,
                    _ => ErrorCategory::Unknown,
                };
                self.done_emitted = true;
                self.acc.set_finish_reason(FinishReason::Error);
                events.push(StreamEvent::Error { category, message: message.to_string() });
            }
            // ping and unrecognized event types carry no payload we need
            _ => {}
        }
    }
}

impl StreamParser for AnthropicStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            let Some(data) = SseLineBuffer::data_payload(&line) else {
                continue;
            };
            if self.done_emitted {
                continue;
            }
            if let Ok(v) = serde_json::from_str::<Value>(data) {
                self.parse_event(&v, &mut events);
            }
        }
        events
    }

    fn finish(&mut self) -> Response {
        self.acc.into_response()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
