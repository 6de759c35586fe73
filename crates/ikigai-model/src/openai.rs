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

pub struct OpenAiProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".into()),
        }
    }
}

// ─── Reasoning effort ─────────────────────────────────────────────────────────

/// Effort strings per model for the four canonical levels, in the order
/// (none, low, medium, high).  Models absent from this table do not accept
/// reasoning parameters at all.
const EFFORT_MAP: &[(&str, [&str; 4])] = &[
    // Old o-series: cannot disable reasoning, max "high"
    ("o1", ["low", "low", "medium", "high"]),
    ("o3-mini", ["low", "low", "medium", "high"]),
    // New o-series: can disable, max "high"
    ("o3", ["none", "low", "medium", "high"]),
    ("o3-pro", ["none", "low", "medium", "high"]),
    ("o4-mini", ["none", "low", "medium", "high"]),
    // gpt-5 base: min "minimal" (API rejects "none"), max "high"
    ("gpt-5", ["minimal", "low", "medium", "high"]),
    ("gpt-5-mini", ["minimal", "low", "medium", "high"]),
    ("gpt-5-nano", ["minimal", "low", "medium", "high"]),
    // gpt-5-pro: always high effort regardless of level
    ("gpt-5-pro", ["high", "high", "high", "high"]),
    // gpt-5.1: min "none", max "high" (no minimal, no xhigh)
    ("gpt-5.1", ["none", "low", "medium", "high"]),
    // chat-latest variants: fixed "medium" — adaptive reasoning, the API
    // rejects every other value
    ("gpt-5.1-chat-latest", ["medium", "medium", "medium", "medium"]),
    ("gpt-5.1-codex", ["none", "low", "medium", "high"]),
    ("gpt-5.1-codex-mini", ["none", "low", "medium", "high"]),
    // gpt-5.2: min "none", max "xhigh"
    ("gpt-5.2", ["none", "low", "medium", "xhigh"]),
    ("gpt-5.2-chat-latest", ["medium", "medium", "medium", "medium"]),
    ("gpt-5.2-codex", ["none", "low", "medium", "xhigh"]),
    ("gpt-5.2-pro", ["medium", "medium", "high", "xhigh"]),
];

pub(crate) fn is_reasoning_model(model: &str) -> bool {
    EFFORT_MAP.iter().any(|(m, _)| *m == model)
}

/// Effort string for `model` at `level`; `None` when the model has no
/// reasoning table entry.
pub(crate) fn reasoning_effort(model: &str, level: ThinkingLevel) -> Option<&'static str> {
    let (_, efforts) = EFFORT_MAP.iter().find(|(m, _)| *m == model)?;
    let idx = match level {
        ThinkingLevel::None => 0,
        ThinkingLevel::Low => 1,
        ThinkingLevel::Medium => 2,
        ThinkingLevel::High => 3,
    };
    Some(efforts[idx])
}

// ─── Request serialization ────────────────────────────────────────────────────

fn tool_choice_value(choice: ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
    }
}

/// Convert canonical messages into the OpenAI wire-format `messages` array.
///
/// All tool calls from one assistant turn must appear inside a single
/// assistant message as a `tool_calls` array, so the block list is coalesced
/// per message.  Thinking blocks are never sent back to the API.
pub(crate) fn build_openai_messages(system: Option<&str>, messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();
    if let Some(sys) = system {
        out.push(json!({ "role": "system", "content": sys }));
    }
    for m in messages {
        match m.role {
            Role::System => {
                out.push(json!({ "role": "system", "content": m.text() }));
            }
            Role::User => {
                out.push(json!({ "role": "user", "content": m.text() }));
            }
            Role::Assistant => {
                let text = m.text();
                let tool_calls: Vec<Value> = m
                    .blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolCall { id, name, arguments, .. } => Some(json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": arguments },
                        })),
                        _ => None,
                    })
                    .collect();
                let mut msg = json!({ "role": "assistant" });
                if !text.is_empty() || tool_calls.is_empty() {
                    msg["content"] = json!(text);
                }
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = json!(tool_calls);
                }
                out.push(msg);
            }
            Role::Tool => {
                for b in &m.blocks {
                    if let ContentBlock::ToolResult { tool_call_id, content, .. } = b {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_call_id,
                            "content": content,
                        }));
                    }
                }
            }
        }
    }
    out
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_temperature(&self) -> bool {
        !is_reasoning_model(&self.model)
    }

    fn validate_thinking(&self, level: ThinkingLevel) -> Result<(), ProviderError> {
        if is_reasoning_model(&self.model) || level == ThinkingLevel::None {
            Ok(())
        } else {
            Err(ProviderError::new(
                ErrorCategory::InvalidArgument,
                format!("model '{}' does not support thinking level {level:?}", self.model),
            ))
        }
    }

    fn prepare(&self, req: &Request) -> Result<WireRequest, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(ErrorCategory::MissingCredentials, "OPENAI_API_KEY not set")
        })?;

        let mut body = json!({
            "model": req.model,
            "messages": build_openai_messages(req.system.as_deref(), &req.messages),
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if let Some(max) = req.max_output_tokens {
            body["max_completion_tokens"] = json!(max);
        }
        if self.supports_temperature() {
            if let Some(t) = req.temperature {
                body["temperature"] = json!(t);
            }
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                            "strict": t.strict,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = tool_choice_value(req.tool_choice);
        }
        if let Some(effort) = reasoning_effort(&req.model, req.thinking.level) {
            body["reasoning_effort"] = json!(effort);
        }

        debug!(model = %req.model, message_count = req.messages.len(), "prepared openai request");

        Ok(WireRequest {
            url: format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Accept".into(), "text/event-stream".into()),
                ("Authorization".into(), format!("Bearer {key}")),
            ],
            body: body.to_string(),
        })
    }

    fn stream_parser(&self) -> Box<dyn StreamParser> {
        Box::new(OpenAiStreamParser::new())
    }

    fn classify_error(&self, status: u16, body: &str) -> ErrorCategory {
        let mut category = status_to_category(status);
        if let Ok(v) = serde_json::from_str::<Value>(body) {
            let error = &v["error"];
            let code = error["code"].as_str().unwrap_or("");
            let etype = error["type"].as_str().unwrap_or("");
            if code.contains("content_filter") || etype.contains("content_filter") {
                return ErrorCategory::ContentFilter;
            }
            category = match code {
                "invalid_api_key" | "invalid_org" => ErrorCategory::Auth,
                "rate_limit_exceeded" | "quota_exceeded" => ErrorCategory::RateLimit,
                "model_not_found" => ErrorCategory::NotFound,
                _ => category,
            };
        }
        category
    }
}

// ─── Stream parsing ───────────────────────────────────────────────────────────

struct OpenAiStreamParser {
    lines: SseLineBuffer,
    acc: Accumulator,
    started: bool,
}

impl OpenAiStreamParser {
    fn new() -> Self {
        Self {
            lines: SseLineBuffer::new(),
            acc: Accumulator::new(),
            started: false,
        }
    }

    fn parse_chunk(&mut self, v: &Value, events: &mut Vec<StreamEvent>) {
        if !self.started {
            if let Some(model) = v["model"].as_str() {
                self.started = true;
                self.acc.set_model(model);
                events.push(StreamEvent::Start { model: model.to_string() });
            }
        }

        // Usage-only chunk (stream_options.include_usage)
        if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
            let u = self.acc.usage_mut();
            u.input_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0) as u32;
            u.output_tokens = usage["completion_tokens"].as_u64().unwrap_or(0) as u32;
            u.total_tokens = usage["total_tokens"].as_u64().unwrap_or(0) as u32;
            u.thinking_tokens = usage["completion_tokens_details"]["reasoning_tokens"]
                .as_u64()
                .unwrap_or(0) as u32;
            return;
        }

        let choice = &v["choices"][0];

        if let Some(reason) = choice["finish_reason"].as_str() {
            self.acc.set_finish_reason(match reason {
                "stop" => FinishReason::Stop,
                "length" => FinishReason::Length,
                "tool_calls" => FinishReason::ToolCalls,
                "content_filter" => FinishReason::ContentFilter,
                _ => FinishReason::Unknown,
            });
        }

        let delta = &choice["delta"];

        if let Some(tc) = delta.get("tool_calls").and_then(|t| t.get(0)) {
            let index = tc["index"].as_u64().unwrap_or(0) as u32;
            let id = tc["id"].as_str().unwrap_or("");
            let name = tc["function"]["name"].as_str().unwrap_or("");
            let args = tc["function"]["arguments"].as_str().unwrap_or("");
            if !id.is_empty() || !name.is_empty() {
                if let Some(done) = self.acc.start_tool_call(index, id, name) {
                    events.push(done);
                }
                events.push(StreamEvent::ToolCallStart {
                    index,
                    id: id.to_string(),
                    name: name.to_string(),
                });
            }
            if !args.is_empty() {
                self.acc.push_tool_arguments(index, args);
                events.push(StreamEvent::ToolCallDelta {
                    index,
                    arguments: args.to_string(),
                });
            }
            return;
        }

        // Chain-of-thought text ("reasoning_content" or "reasoning" key)
        let thinking = delta
            .get("reasoning_content")
            .and_then(|c| c.as_str())
            .or_else(|| delta.get("reasoning").and_then(|c| c.as_str()));
        if let Some(text) = thinking {
            if !text.is_empty() {
                self.acc.push_thinking(text);
                events.push(StreamEvent::ThinkingDelta { text: text.to_string() });
                return;
            }
        }

        if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
            if !text.is_empty() {
                self.acc.push_text(text);
                events.push(StreamEvent::TextDelta { text: text.to_string() });
            }
        }
    }
}

impl StreamParser for OpenAiStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            let Some(data) = SseLineBuffer::data_payload(&line) else {
                continue;
            };
            if data == "[DONE]" {
                if let Some(done) = self.acc.close_open_tool() {
                    events.push(done);
                }
                events.push(StreamEvent::Done {
                    finish_reason: self.acc.finish_reason(),
                    usage: self.acc.usage(),
                });
                continue;
            }
            if let Ok(v) = serde_json::from_str::<Value>(data) {
                self.parse_chunk(&v, &mut events);
            }
        }
        events
    }

    fn finish(&mut self) -> Response {
        self.acc.into_response()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut dyn StreamParser, sse: &str) -> Vec<StreamEvent> {
        parser.feed(sse.as_bytes())
    }

    fn simple_request() -> Request {
        Request {
            model: "gpt-4o".into(),
            messages: vec![Message::user("hi")],
            ..Request::default()
        }
    }

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new("gpt-4o".into(), Some("sk-test".into()), None)
    }

    // ── Reasoning table ───────────────────────────────────────────────────────

    #[test]
    fn gpt4o_is_not_a_reasoning_model() {
        assert!(!is_reasoning_model("gpt-4o"));
        assert_eq!(reasoning_effort("gpt-4o", ThinkingLevel::High), None);
    }

    #[test]
    fn o1_cannot_disable_reasoning() {
        assert_eq!(reasoning_effort("o1", ThinkingLevel::None), Some("low"));
    }

    #[test]
    fn gpt5_none_maps_to_minimal() {
        assert_eq!(reasoning_effort("gpt-5", ThinkingLevel::None), Some("minimal"));
    }

    #[test]
    fn gpt52_high_maps_to_xhigh() {
        assert_eq!(reasoning_effort("gpt-5.2", ThinkingLevel::High), Some("xhigh"));
    }

    #[test]
    fn chat_latest_is_pinned_to_medium() {
        for level in [
            ThinkingLevel::None,
            ThinkingLevel::Low,
            ThinkingLevel::Medium,
            ThinkingLevel::High,
        ] {
            assert_eq!(reasoning_effort("gpt-5.1-chat-latest", level), Some("medium"));
        }
    }

    #[test]
    fn validate_thinking_rejects_level_on_plain_model() {
        let p = provider();
        assert!(p.validate_thinking(ThinkingLevel::None).is_ok());
        assert!(p.validate_thinking(ThinkingLevel::Medium).is_err());
    }

    // ── Request serialization ─────────────────────────────────────────────────

    #[test]
    fn prepare_without_key_is_missing_credentials() {
        let p = OpenAiProvider::new("gpt-4o".into(), None, None);
        let err = p.prepare(&simple_request()).unwrap_err();
        assert_eq!(err.category, ErrorCategory::MissingCredentials);
    }

    #[test]
    fn prepare_sets_url_and_auth_header() {
        let wire = provider().prepare(&simple_request()).unwrap();
        assert_eq!(wire.url, "https://api.openai.com/v1/chat/completions");
        assert!(wire
            .headers
            .iter()
            .any(|(n, v)| n == "Authorization" && v == "Bearer sk-test"));
        assert!(wire
            .headers
            .iter()
            .any(|(n, v)| n == "Accept" && v == "text/event-stream"));
    }

    #[test]
    fn system_prompt_becomes_first_message() {
        let req = Request {
            system: Some("be terse".into()),
            ..simple_request()
        };
        let wire = provider().prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][0]["content"], "be terse");
    }

    #[test]
    fn tool_choice_serialized_as_string() {
        let req = Request {
            tools: vec![crate::ToolDefinition {
                name: "glob".into(),
                description: "find files".into(),
                parameters: json!({"type": "object"}),
                strict: false,
            }],
            tool_choice: ToolChoice::Required,
            ..simple_request()
        };
        let wire = provider().prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(v["tool_choice"], "required");
        assert_eq!(v["tools"][0]["function"]["name"], "glob");
        assert_eq!(v["tools"][0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn reasoning_model_omits_temperature_and_adds_effort() {
        let p = OpenAiProvider::new("gpt-5".into(), Some("k".into()), None);
        let req = Request {
            model: "gpt-5".into(),
            temperature: Some(0.7),
            thinking: crate::Thinking { level: ThinkingLevel::High, include_summary: false },
            messages: vec![Message::user("hi")],
            ..Request::default()
        };
        let wire = p.prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert!(v.get("temperature").is_none());
        assert_eq!(v["reasoning_effort"], "high");
    }

    #[test]
    fn tool_calls_coalesced_into_one_assistant_message() {
        let msgs = vec![Message {
            role: Role::Assistant,
            blocks: vec![
                ContentBlock::ToolCall {
                    id: "a".into(),
                    name: "f".into(),
                    arguments: "{}".into(),
                    thought_signature: None,
                },
                ContentBlock::ToolCall {
                    id: "b".into(),
                    name: "g".into(),
                    arguments: "{}".into(),
                    thought_signature: None,
                },
            ],
            provider_metadata: None,
        }];
        let wire = build_openai_messages(None, &msgs);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["tool_calls"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn tool_result_message_uses_tool_role() {
        let msgs = vec![Message::tool_result("tc1", "output", false)];
        let wire = build_openai_messages(None, &msgs);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "tc1");
        assert_eq!(wire[0]["content"], "output");
    }

    #[test]
    fn thinking_blocks_are_not_sent_back() {
        let msgs = vec![Message {
            role: Role::Assistant,
            blocks: vec![
                ContentBlock::Thinking { text: "secret".into() },
                ContentBlock::Text { text: "answer".into() },
            ],
            provider_metadata: None,
        }];
        let wire = build_openai_messages(None, &msgs);
        assert_eq!(wire[0]["content"], "answer");
        assert!(!wire[0].to_string().contains("secret"));
    }

    // ── Stream parsing ────────────────────────────────────────────────────────

    #[test]
    fn text_delta_stream_produces_text_events_and_response() {
        let mut p = OpenAiStreamParser::new();
        let events = feed_all(
            &mut p,
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
             data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\
             data: [DONE]\n",
        );
        assert!(matches!(events[0], StreamEvent::Start { .. }));
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Done { finish_reason: FinishReason::Stop, .. }
        ));
        let resp = p.finish();
        assert_eq!(resp.text(), "hello");
        assert_eq!(resp.model, "gpt-4o");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn tool_call_stream_accumulates_arguments() {
        let mut p = OpenAiStreamParser::new();
        let events = feed_all(
            &mut p,
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"tc1\",\"function\":{\"name\":\"glob\",\"arguments\":\"\"}}]}}]}\n\
             data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"pattern\\\":\"}}]}}]}\n\
             data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"*.json\\\"}\"}}]}}]}\n\
             data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\
             data: [DONE]\n",
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::ToolCallStart { id, name, .. } if id == "tc1" && name == "glob")));
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::ToolCallDone { index: 0 })));
        let resp = p.finish();
        assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
        match &resp.blocks[0] {
            ContentBlock::ToolCall { arguments, .. } => {
                assert_eq!(arguments, "{\"pattern\":\"*.json\"}");
            }
            other => panic!("wrong block: {other:?}"),
        }
    }

    #[test]
    fn usage_chunk_is_captured() {
        let mut p = OpenAiStreamParser::new();
        feed_all(
            &mut p,
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":\"stop\"}]}\n\
             data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n\
             data: [DONE]\n",
        );
        let resp = p.finish();
        assert_eq!(resp.usage.input_tokens, 10);
        assert_eq!(resp.usage.output_tokens, 5);
        assert_eq!(resp.usage.total_tokens, 15);
    }

    #[test]
    fn event_split_across_chunks_is_parsed() {
        let mut p = OpenAiStreamParser::new();
        let mut events = p.feed(b"data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"con");
        assert!(events.is_empty());
        events = p.feed(b"tent\":\"ok\"}}]}\n");
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::TextDelta { text } if text == "ok")));
    }

    #[test]
    fn length_finish_reason_maps_to_length() {
        let mut p = OpenAiStreamParser::new();
        feed_all(
            &mut p,
            "data: {\"model\":\"m\",\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}]}\n\
             data: [DONE]\n",
        );
        assert_eq!(p.finish().finish_reason, FinishReason::Length);
    }

    // ── Error classification ──────────────────────────────────────────────────

    #[test]
    fn content_filter_in_body_takes_precedence() {
        let p = provider();
        let body = r#"{"error":{"code":"content_filter","message":"blocked"}}"#;
        assert_eq!(p.classify_error(400, body), ErrorCategory::ContentFilter);
    }

    #[test]
    fn invalid_api_key_code_refines_to_auth() {
        let p = provider();
        let body = r#"{"error":{"code":"invalid_api_key"}}"#;
        assert_eq!(p.classify_error(400, body), ErrorCategory::Auth);
    }

    #[test]
    fn unparseable_body_falls_back_to_status() {
        let p = provider();
        assert_eq!(p.classify_error(429, "<html>"), ErrorCategory::RateLimit);
        assert_eq!(p.classify_error(500, ""), ErrorCategory::Server);
    }
}
