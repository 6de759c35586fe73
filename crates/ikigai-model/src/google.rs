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

pub struct GoogleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
        }
    }
}

// ─── Model series & thinking ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GeminiSeries {
    Gemini3,
    Gemini25,
    Other,
}

pub(crate) fn model_series(model: &str) -> GeminiSeries {
    if model.contains("gemini-3") {
        GeminiSeries::Gemini3
    } else if model.contains("gemini-2.5") {
        GeminiSeries::Gemini25
    } else {
        GeminiSeries::Other
    }
}

/// Budget limits (min, max) for Gemini 2.5 models; exact model-id match.
const BUDGET_TABLE: &[(&str, i64, i64)] = &[
    ("gemini-2.5-pro", 128, 32768),
    ("gemini-2.5-flash-lite", 512, 24576),
    ("gemini-2.5-flash", 0, 24576),
];

fn floor_power_of_2(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    1i64 << (63 - n.leading_zeros() as i64)
}

pub(crate) fn supports_thinking(model: &str) -> bool {
    matches!(model_series(model), GeminiSeries::Gemini25 | GeminiSeries::Gemini3)
}

/// Gemini 3 uses level strings; budget models cannot "disable" via level.
pub(crate) fn can_disable_thinking(model: &str) -> bool {
    if model_series(model) != GeminiSeries::Gemini25 {
        return false;
    }
    BUDGET_TABLE
        .iter()
        .find(|(m, _, _)| *m == model)
        .map(|(_, min, _)| *min == 0)
        .unwrap_or(false)
}

/// Token budget for Gemini 2.5 models; `None` for other series and unknown
/// 2.5 models.
pub(crate) fn thinking_budget(model: &str, level: ThinkingLevel) -> Option<i64> {
    if model_series(model) != GeminiSeries::Gemini25 {
        return None;
    }
    let (min, max) = BUDGET_TABLE
        .iter()
        .find(|(m, _, _)| *m == model)
        .map(|(_, min, max)| (*min, *max))?;
    let range = max - min;
    Some(match level {
        ThinkingLevel::None => min,
        ThinkingLevel::Low => floor_power_of_2(min + range / 3),
        ThinkingLevel::Medium => floor_power_of_2(min + 2 * range / 3),
        ThinkingLevel::High => max,
    })
}

/// Level string for Gemini 3 models.
pub(crate) fn thinking_level_str(level: ThinkingLevel) -> &'static str {
    match level {
        ThinkingLevel::None => "minimal",
        ThinkingLevel::Low => "low",
        ThinkingLevel::Medium => "medium",
        ThinkingLevel::High => "high",
    }
}

// ─── Request serialization ────────────────────────────────────────────────────

fn function_calling_mode(choice: ToolChoice) -> &'static str {
    match choice {
        ToolChoice::Auto => "AUTO",
        ToolChoice::None => "NONE",
        ToolChoice::Required => "ANY",
    }
}

/// Recursively remove `additionalProperties`, which the Gemini schema
/// validator rejects.
fn strip_additional_properties(v: &mut Value) {
    match v {
        Value::Object(map) => {
            map.remove("additionalProperties");
            for (_, child) in map.iter_mut() {
                strip_additional_properties(child);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                strip_additional_properties(child);
            }
        }
        _ => {}
    }
}

/// Build the `contents` array.
///
/// `tool_result_role` differs per series ("function" on 2.x, "user" on 3).
/// For Gemini 3 the most recent assistant message's thought signature is
/// re-attached as the first part of the first assistant message so the
/// server can verify thought continuity.
fn build_contents(messages: &[Message], series: GeminiSeries) -> Vec<Value> {
    let tool_result_role = match series {
        GeminiSeries::Gemini3 => "user",
        _ => "function",
    };

    // tool_call_id → function name; Gemini matches functionResponse to
    // functionCall by name, not by an opaque id.
    let mut call_names: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
    for m in messages {
        for b in &m.blocks {
            if let ContentBlock::ToolCall { id, name, .. } = b {
                call_names.insert(id.as_str(), name.as_str());
            }
        }
    }

    let carried_signature: Option<&str> = if series == GeminiSeries::Gemini3 {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.provider_metadata.as_ref())
            .and_then(|meta| meta["thought_signature"].as_str())
    } else {
        None
    };

    let mut out: Vec<Value> = Vec::new();
    let mut signature_attached = false;

    for m in messages {
        let (role, is_assistant) = match m.role {
            Role::Assistant => ("model", true),
            Role::Tool => (tool_result_role, false),
            Role::User | Role::System => ("user", false),
        };
        let mut parts: Vec<Value> = Vec::new();
        if is_assistant && !signature_attached {
            if let Some(sig) = carried_signature {
                parts.push(json!({ "text": "", "thoughtSignature": sig }));
                signature_attached = true;
            }
        }
        for b in &m.blocks {
            match b {
                ContentBlock::Text { text } => parts.push(json!({ "text": text })),
                // Thinking is never replayed; Gemini reconstructs it from the
                // thought signature.
                ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {}
                ContentBlock::ToolCall { name, arguments, thought_signature, .. } => {
                    let args: Value = serde_json::from_str(arguments).unwrap_or(json!({}));
                    let mut part = json!({ "functionCall": { "name": name, "args": args } });
                    if let Some(sig) = thought_signature {
                        part["thoughtSignature"] = json!(sig);
                    }
                    parts.push(part);
                }
                ContentBlock::ToolResult { tool_call_id, content, .. } => {
                    let fn_name = call_names
                        .get(tool_call_id.as_str())
                        .copied()
                        .unwrap_or(tool_call_id.as_str());
                    parts.push(json!({
                        "functionResponse": {
                            "name": fn_name,
                            "response": { "content": content },
                        }
                    }));
                }
            }
        }
        if parts.is_empty() {
            continue;
        }
        out.push(json!({ "role": role, "parts": parts }));
    }
    out
}

impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn validate_thinking(&self, level: ThinkingLevel) -> Result<(), ProviderError> {
        let series = model_series(&self.model);
        if level == ThinkingLevel::None {
            if series == GeminiSeries::Gemini25 && !can_disable_thinking(&self.model) {
                return Err(ProviderError::new(
                    ErrorCategory::InvalidArgument,
                    format!(
                        "model '{}' cannot disable thinking (minimum budget > 0); use low, medium, or high",
                        self.model
                    ),
                ));
            }
            return Ok(());
        }
        if !supports_thinking(&self.model) {
            return Err(ProviderError::new(
                ErrorCategory::InvalidArgument,
                format!(
                    "model '{}' does not support thinking (only Gemini 2.5 and 3.x models do)",
                    self.model
                ),
            ));
        }
        Ok(())
    }

    fn prepare(&self, req: &Request) -> Result<WireRequest, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(ErrorCategory::MissingCredentials, "GOOGLE_API_KEY not set")
        })?;

        let series = model_series(&req.model);
        let contents = build_contents(&req.messages, series);

        let mut generation_config = json!({});
        if let Some(max) = req.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max);
        }
        if let Some(t) = req.temperature {
            generation_config["temperature"] = json!(t);
        }
        match series {
            GeminiSeries::Gemini3 => {
                generation_config["thinkingConfig"] = json!({
                    "thinkingLevel": thinking_level_str(req.thinking.level),
                    "includeThoughts": req.thinking.include_summary,
                });
            }
            GeminiSeries::Gemini25 => {
                if let Some(budget) = thinking_budget(&req.model, req.thinking.level) {
                    generation_config["thinkingConfig"] = json!({
                        "thinkingBudget": budget,
                        "includeThoughts": req.thinking.include_summary,
                    });
                }
            }
            GeminiSeries::Other => {}
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = req.system.as_deref().filter(|s| !s.is_empty()) {
            body["systemInstruction"] = json!({ "parts": [{ "text": sys }] });
        }
        if !req.tools.is_empty() {
            let declarations: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    let mut params = t.parameters.clone();
                    strip_additional_properties(&mut params);
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": params,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
            body["toolConfig"] = json!({
                "functionCallingConfig": { "mode": function_calling_mode(req.tool_choice) }
            });
        }

        debug!(model = %req.model, message_count = req.messages.len(), "prepared google request");

        Ok(WireRequest {
            url: format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
                self.base_url.trim_end_matches('/'),
                req.model,
                key
            ),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Accept".into(), "text/event-stream".into()),
            ],
            body: body.to_string(),
        })
    }

    fn stream_parser(&self) -> Box<dyn StreamParser> {
        Box::new(GoogleStreamParser::new(self.model.clone()))
    }

    fn classify_error(&self, status: u16, body: &str) -> ErrorCategory {
        if let Ok(v) = serde_json::from_str::<Value>(body) {
            let error_status = v["error"]["status"].as_str().unwrap_or("");
            match error_status {
                "UNAUTHENTICATED" | "PERMISSION_DENIED" => return ErrorCategory::Auth,
                "RESOURCE_EXHAUSTED" => return ErrorCategory::RateLimit,
                "INVALID_ARGUMENT" => return ErrorCategory::InvalidArgument,
                "NOT_FOUND" => return ErrorCategory::NotFound,
                "UNAVAILABLE" | "INTERNAL" => return ErrorCategory::Server,
                "DEADLINE_EXCEEDED" => return ErrorCategory::Timeout,
                _ => {}
            }
        }
        status_to_category(status)
    }
}

// ─── Stream parsing ───────────────────────────────────────────────────────────

struct GoogleStreamParser {
    lines: SseLineBuffer,
    acc: Accumulator,
    default_model: String,
    started: bool,
    /// Synthesized tool-call ids: Gemini has none on the wire.
    next_tool_index: u32,
    last_signature: Option<String>,
}

impl GoogleStreamParser {
    fn new(default_model: String) -> Self {
        Self {
            lines: SseLineBuffer::new(),
            acc: Accumulator::new(),
            default_model,
            started: false,
            next_tool_index: 0,
            last_signature: None,
        }
    }

    fn map_finish_reason(reason: &str) -> FinishReason {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Unknown,
        }
    }

    fn parse_chunk(&mut self, v: &Value, events: &mut Vec<StreamEvent>) {
        if !self.started {
            let model = v["modelVersion"]
                .as_str()
                .unwrap_or(&self.default_model)
                .to_string();
            self.acc.set_model(&model);
            self.started = true;
            events.push(StreamEvent::Start { model });
        }

        if let Some(meta) = v.get("usageMetadata") {
            let u = self.acc.usage_mut();
            u.input_tokens = meta["promptTokenCount"].as_u64().unwrap_or(0) as u32;
            u.output_tokens = meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32;
            u.total_tokens = meta["totalTokenCount"].as_u64().unwrap_or(0) as u32;
            u.thinking_tokens = meta["thoughtsTokenCount"].as_u64().unwrap_or(0) as u32;
        }

        let candidate = &v["candidates"][0];

        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(sig) = part["thoughtSignature"].as_str() {
                    self.last_signature = Some(sig.to_string());
                }
                if let Some(fc) = part.get("functionCall") {
                    let name = fc["name"].as_str().unwrap_or("");
                    let args = fc["args"].to_string();
                    let index = self.next_tool_index;
                    self.next_tool_index += 1;
                    // Gemini carries no call id; synthesize a stable one.
                    let id = format!("{name}-{index}");
                    if let Some(done) = self.acc.start_tool_call(index, &id, name) {
                        events.push(done);
                    }
                    events.push(StreamEvent::ToolCallStart {
                        index,
                        id,
                        name: name.to_string(),
                    });
                    self.acc.push_tool_arguments(index, &args);
                    if let Some(sig) = part["thoughtSignature"].as_str() {
                        self.acc.set_tool_signature(sig);
                    }
                    events.push(StreamEvent::ToolCallDelta { index, arguments: args });
                    if let Some(done) = self.acc.close_open_tool() {
                        events.push(done);
                    }
                } else if let Some(text) = part["text"].as_str() {
                    if text.is_empty() {
                        continue;
                    }
                    if part["thought"].as_bool().unwrap_or(false) {
                        self.acc.push_thinking(text);
                        events.push(StreamEvent::ThinkingDelta { text: text.to_string() });
                    } else {
                        self.acc.push_text(text);
                        events.push(StreamEvent::TextDelta { text: text.to_string() });
                    }
                }
            }
        }

        if let Some(reason) = candidate["finishReason"].as_str() {
            let mapped = Self::map_finish_reason(reason);
            // A candidate that stopped to call tools reports STOP; the
            // canonical reason must be tool_calls when any were parsed.
            let mapped = if mapped == FinishReason::Stop && self.next_tool_index > 0 {
                FinishReason::ToolCalls
            } else {
                mapped
            };
            self.acc.set_finish_reason(mapped);
        }
    }
}

impl StreamParser for GoogleStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            let Some(data) = SseLineBuffer::data_payload(&line) else {
                continue;
            };
            if data == "[DONE]" {
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
        if let Some(sig) = self.last_signature.take() {
            self.acc
                .set_provider_metadata(json!({ "thought_signature": sig }));
        }
        self.acc.into_response()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new("gemini-2.5-flash".into(), Some("g-key".into()), None)
    }

    fn simple_request(model: &str) -> Request {
        Request {
            model: model.into(),
            messages: vec![Message::user("hi")],
            ..Request::default()
        }
    }

    // ── Series & thinking ─────────────────────────────────────────────────────

    #[test]
    fn series_detection() {
        assert_eq!(model_series("gemini-3-pro-preview"), GeminiSeries::Gemini3);
        assert_eq!(model_series("gemini-2.5-flash"), GeminiSeries::Gemini25);
        assert_eq!(model_series("gemini-1.5-pro"), GeminiSeries::Other);
    }

    #[test]
    fn flash_can_disable_thinking_lite_cannot() {
        assert!(can_disable_thinking("gemini-2.5-flash"));
        assert!(!can_disable_thinking("gemini-2.5-flash-lite"));
        assert!(!can_disable_thinking("gemini-2.5-pro"));
    }

    #[test]
    fn budget_high_is_table_max() {
        assert_eq!(thinking_budget("gemini-2.5-pro", ThinkingLevel::High), Some(32768));
        assert_eq!(thinking_budget("gemini-2.5-flash", ThinkingLevel::High), Some(24576));
    }

    #[test]
    fn budget_none_is_table_min() {
        assert_eq!(thinking_budget("gemini-2.5-flash", ThinkingLevel::None), Some(0));
        assert_eq!(thinking_budget("gemini-2.5-pro", ThinkingLevel::None), Some(128));
    }

    #[test]
    fn budget_unknown_model_is_none() {
        assert_eq!(thinking_budget("gemini-2.5-ultra", ThinkingLevel::Low), None);
        assert_eq!(thinking_budget("gemini-3-pro", ThinkingLevel::Low), None);
    }

    #[test]
    fn level_strings_for_gemini_3() {
        assert_eq!(thinking_level_str(ThinkingLevel::None), "minimal");
        assert_eq!(thinking_level_str(ThinkingLevel::High), "high");
    }

    #[test]
    fn validate_rejects_disable_on_pro() {
        let p = GoogleProvider::new("gemini-2.5-pro".into(), Some("k".into()), None);
        assert!(p.validate_thinking(ThinkingLevel::None).is_err());
        assert!(p.validate_thinking(ThinkingLevel::Low).is_ok());
    }

    #[test]
    fn validate_rejects_thinking_on_old_series() {
        let p = GoogleProvider::new("gemini-1.5-pro".into(), Some("k".into()), None);
        assert!(p.validate_thinking(ThinkingLevel::None).is_ok());
        assert!(p.validate_thinking(ThinkingLevel::Medium).is_err());
    }

    // ── Request serialization ─────────────────────────────────────────────────

    #[test]
    fn url_embeds_model_and_key() {
        let wire = provider().prepare(&simple_request("gemini-2.5-flash")).unwrap();
        assert!(wire.url.contains("/v1beta/models/gemini-2.5-flash:streamGenerateContent"));
        assert!(wire.url.contains("alt=sse"));
        assert!(wire.url.contains("key=g-key"));
    }

    #[test]
    fn system_instruction_is_separate() {
        let req = Request {
            system: Some("be terse".into()),
            ..simple_request("gemini-2.5-flash")
        };
        let wire = provider().prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be terse");
    }

    #[test]
    fn tool_schema_strips_additional_properties() {
        let req = Request {
            tools: vec![crate::ToolDefinition {
                name: "glob".into(),
                description: "find".into(),
                parameters: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "pattern": { "type": "string", "additionalProperties": false }
                    }
                }),
                strict: false,
            }],
            ..simple_request("gemini-2.5-flash")
        };
        let wire = provider().prepare(&req).unwrap();
        assert!(!wire.body.contains("additionalProperties"));
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(v["tools"][0]["functionDeclarations"][0]["name"], "glob");
    }

    #[test]
    fn tool_choice_maps_to_function_calling_mode() {
        let mut req = simple_request("gemini-2.5-flash");
        req.tools = vec![crate::ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: json!({}),
            strict: false,
        }];
        req.tool_choice = ToolChoice::Required;
        let wire = provider().prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(v["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
    }

    #[test]
    fn gemini_3_sends_thinking_level() {
        let p = GoogleProvider::new("gemini-3-pro".into(), Some("k".into()), None);
        let mut req = simple_request("gemini-3-pro");
        req.thinking.level = ThinkingLevel::Medium;
        let wire = p.prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(
            v["generationConfig"]["thinkingConfig"]["thinkingLevel"],
            "medium"
        );
    }

    #[test]
    fn gemini_25_sends_thinking_budget() {
        let mut req = simple_request("gemini-2.5-flash");
        req.thinking.level = ThinkingLevel::High;
        let wire = provider().prepare(&req).unwrap();
        let v: Value = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(
            v["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            24576
        );
    }

    #[test]
    fn tool_result_role_is_function_on_25() {
        let messages = vec![
            Message {
                role: Role::Assistant,
                blocks: vec![ContentBlock::ToolCall {
                    id: "glob-0".into(),
                    name: "glob".into(),
                    arguments: "{}".into(),
                    thought_signature: None,
                }],
                provider_metadata: None,
            },
            Message::tool_result("glob-0", "config.json", false),
        ];
        let contents = build_contents(&messages, GeminiSeries::Gemini25);
        assert_eq!(contents[1]["role"], "function");
        assert_eq!(
            contents[1]["parts"][0]["functionResponse"]["name"],
            "glob"
        );
        assert_eq!(
            contents[1]["parts"][0]["functionResponse"]["response"]["content"],
            "config.json"
        );
    }

    #[test]
    fn tool_result_role_is_user_on_gemini_3() {
        let messages = vec![Message::tool_result("x-0", "out", false)];
        let contents = build_contents(&messages, GeminiSeries::Gemini3);
        assert_eq!(contents[0]["role"], "user");
    }

    #[test]
    fn thought_signature_reattached_on_first_assistant_message() {
        let messages = vec![
            Message::user("question"),
            Message {
                role: Role::Assistant,
                blocks: vec![ContentBlock::Text { text: "first".into() }],
                provider_metadata: None,
            },
            Message::user("follow-up"),
            Message {
                role: Role::Assistant,
                blocks: vec![ContentBlock::Text { text: "second".into() }],
                provider_metadata: Some(json!({ "thought_signature": "sig-abc" })),
            },
            Message::user("again"),
        ];
        let contents = build_contents(&messages, GeminiSeries::Gemini3);
        // First assistant ("model") message carries the signature part first.
        let first_model = contents.iter().find(|c| c["role"] == "model").unwrap();
        assert_eq!(first_model["parts"][0]["thoughtSignature"], "sig-abc");
        assert_eq!(first_model["parts"][1]["text"], "first");
    }

    #[test]
    fn no_signature_reattachment_on_25() {
        let messages = vec![Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::Text { text: "a".into() }],
            provider_metadata: Some(json!({ "thought_signature": "sig" })),
        }];
        let contents = build_contents(&messages, GeminiSeries::Gemini25);
        assert!(!contents[0].to_string().contains("thoughtSignature"));
    }

    // ── Stream parsing ────────────────────────────────────────────────────────

    fn feed(p: &mut GoogleStreamParser, sse: &str) -> Vec<StreamEvent> {
        StreamParser::feed(p, sse.as_bytes())
    }

    #[test]
    fn text_stream_round_trip() {
        let mut p = GoogleStreamParser::new("gemini-2.5-flash".into());
        let events = feed(
            &mut p,
            "data: {\"modelVersion\":\"gemini-2.5-flash\",\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hel\"}]}}]}\n\
             data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":3,\"candidatesTokenCount\":2,\"totalTokenCount\":5}}\n",
        );
        assert!(matches!(events[0], StreamEvent::Start { .. }));
        let resp = p.finish();
        assert_eq!(resp.text(), "hello");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.usage.total_tokens, 5);
    }

    #[test]
    fn function_call_parses_with_synthesized_id() {
        let mut p = GoogleStreamParser::new("m".into());
        let events = feed(
            &mut p,
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"functionCall\":{\"name\":\"glob\",\"args\":{\"pattern\":\"*.json\"}}}]},\"finishReason\":\"STOP\"}]}\n",
        );
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::ToolCallStart { id, name, .. } if id == "glob-0" && name == "glob"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::ToolCallDone { index: 0 })));
        let resp = p.finish();
        // STOP with parsed tool calls is canonicalized to tool_calls.
        assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
        match &resp.blocks[0] {
            ContentBlock::ToolCall { arguments, .. } => {
                let v: Value = serde_json::from_str(arguments).unwrap();
                assert_eq!(v["pattern"], "*.json");
            }
            other => panic!("wrong block: {other:?}"),
        }
    }

    #[test]
    fn thought_parts_route_to_thinking() {
        let mut p = GoogleStreamParser::new("m".into());
        let events = feed(
            &mut p,
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"pondering\",\"thought\":true}]}}]}\n",
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::ThinkingDelta { text } if text == "pondering")));
    }

    #[test]
    fn thought_signature_lands_in_response_metadata() {
        let mut p = GoogleStreamParser::new("m".into());
        feed(
            &mut p,
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"x\",\"thoughtSignature\":\"sig-1\"}]},\"finishReason\":\"STOP\"}]}\n",
        );
        let resp = p.finish();
        assert_eq!(
            resp.provider_metadata.unwrap()["thought_signature"],
            "sig-1"
        );
    }

    #[test]
    fn safety_finish_maps_to_content_filter() {
        let mut p = GoogleStreamParser::new("m".into());
        feed(
            &mut p,
            "data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\n",
        );
        assert_eq!(p.finish().finish_reason, FinishReason::ContentFilter);
    }

    // ── Error classification ──────────────────────────────────────────────────

    #[test]
    fn grpc_status_refines_category() {
        let p = provider();
        assert_eq!(
            p.classify_error(429, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            p.classify_error(400, r#"{"error":{"status":"UNAUTHENTICATED"}}"#),
            ErrorCategory::Auth
        );
    }
}
