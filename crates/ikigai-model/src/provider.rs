// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
use crate::error::{status_to_category, ErrorCategory, ProviderError};
use crate::{ContentBlock, FinishReason, Request, Response, StreamEvent, ThinkingLevel, TokenUsage};

/// A fully serialized HTTP request ready for the transfer engine.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    /// Header name/value pairs; always includes `Content-Type` and `Accept`.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: String,
}

/// Stateful parser turning SSE byte chunks into ordered [`StreamEvent`]s.
///
/// One parser instance lives for the duration of one streamed response.
/// After the transport completes, [`StreamParser::finish`] assembles the
/// canonical response from everything seen.
pub trait StreamParser: Send {
    /// Feed one chunk of response-body bytes; returns the events completed
    /// by this chunk, in order.
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent>;

    /// Assemble the canonical response.  Called exactly once, after the
    /// transfer ends (normally or not).
    fn finish(&mut self) -> Response;
}

/// A provider adapter: canonical request in, wire request out, SSE in,
/// stream events and canonical response out.
pub trait Provider: Send + Sync {
    /// Provider identifier ("openai", "anthropic", "google", "mock").
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Serialize a canonical request into URL, headers, and JSON body.
    fn prepare(&self, req: &Request) -> Result<WireRequest, ProviderError>;

    /// Fresh parser for one streamed response.
    fn stream_parser(&self) -> Box<dyn StreamParser>;

    /// Map an HTTP error status and body to an error category.
    ///
    /// The default maps from status alone; adapters override to let the
    /// body's error code/type refine the category (content-filter wins).
    fn classify_error(&self, status: u16, _body: &str) -> ErrorCategory {
        status_to_category(status)
    }

    /// Check that this model can honor the given thinking level.
    fn validate_thinking(&self, level: ThinkingLevel) -> Result<(), ProviderError>;

    /// Whether the model accepts a sampling temperature.
    fn supports_temperature(&self) -> bool {
        true
    }

    /// Cancellation hook.  The core has no mid-request cancellation; the
    /// default is a no-op and the in-flight transfer runs to completion.
    fn cancel(&self) {}
}

// ─── Response accumulation ────────────────────────────────────────────────────

/// Collects stream events into an ordered canonical block list.
///
/// Shared by all adapters so that block ordering, tool-call argument
/// accumulation, and `ToolCallDone` emission behave identically regardless
/// of provider.
#[derive(Debug, Default)]
pub struct Accumulator {
    model: String,
    finish_reason: FinishReason,
    usage: TokenUsage,
    blocks: Vec<ContentBlock>,
    provider_metadata: Option<serde_json::Value>,
    /// Index of the tool call currently receiving argument deltas, and its
    /// position in `blocks`.
    open_tool: Option<(u32, usize)>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    pub fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = reason;
    }

    pub fn set_provider_metadata(&mut self, metadata: serde_json::Value) {
        self.provider_metadata = Some(metadata);
    }

    pub fn finish_reason(&self) -> FinishReason {
        self.finish_reason
    }

    pub fn usage_mut(&mut self) -> &mut TokenUsage {
        &mut self.usage
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Append text, merging into a trailing text block.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(ContentBlock::Text { text: t }) = self.blocks.last_mut() {
            t.push_str(text);
        } else {
            self.blocks.push(ContentBlock::Text { text: text.to_string() });
        }
    }

    /// Append thinking text, merging into a trailing thinking block.
    pub fn push_thinking(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(ContentBlock::Thinking { text: t }) = self.blocks.last_mut() {
            t.push_str(text);
        } else {
            self.blocks.push(ContentBlock::Thinking { text: text.to_string() });
        }
    }

    /// Open a tool-call block.  Returns the `ToolCallDone` for a previously
    /// open call when the index changes, so deltas never interleave.
    pub fn start_tool_call(&mut self, index: u32, id: &str, name: &str) -> Option<StreamEvent> {
        let done = self.close_open_tool_if(|open_index| open_index != index);
        self.blocks.push(ContentBlock::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: String::new(),
            thought_signature: None,
        });
        self.open_tool = Some((index, self.blocks.len() - 1));
        done
    }

    /// Append an arguments fragment to the open tool call with this index.
    pub fn push_tool_arguments(&mut self, index: u32, fragment: &str) {
        if let Some((open_index, pos)) = self.open_tool {
            if open_index == index {
                if let ContentBlock::ToolCall { arguments, .. } = &mut self.blocks[pos] {
                    arguments.push_str(fragment);
                }
            }
        }
    }

    /// Append an opaque redacted-thinking blob as its own block.
    pub fn push_redacted_thinking(&mut self, data: &str) {
        if data.is_empty() {
            return;
        }
        if let Some(ContentBlock::RedactedThinking { data: d }) = self.blocks.last_mut() {
            d.push_str(data);
        } else {
            self.blocks.push(ContentBlock::RedactedThinking { data: data.to_string() });
        }
    }

    /// Attach an opaque thought signature to the open tool call.
    pub fn set_tool_signature(&mut self, signature: &str) {
        if let Some((_, pos)) = self.open_tool {
            if let ContentBlock::ToolCall { thought_signature, .. } = &mut self.blocks[pos] {
                *thought_signature = Some(signature.to_string());
            }
        }
    }

    /// Close the open tool call unconditionally.
    pub fn close_open_tool(&mut self) -> Option<StreamEvent> {
        self.close_open_tool_if(|_| true)
    }

    fn close_open_tool_if(&mut self, pred: impl Fn(u32) -> bool) -> Option<StreamEvent> {
        match self.open_tool {
            Some((index, _)) if pred(index) => {
                self.open_tool = None;
                Some(StreamEvent::ToolCallDone { index })
            }
            _ => None,
        }
    }

    /// Final canonical response.  An empty arguments string is normalized to
    /// `{}` so downstream JSON parsing always succeeds.
    pub fn into_response(&mut self) -> Response {
        self.open_tool = None;
        let mut blocks = std::mem::take(&mut self.blocks);
        for b in &mut blocks {
            if let ContentBlock::ToolCall { arguments, .. } = b {
                if arguments.is_empty() {
                    arguments.push_str("{}");
                }
            }
        }
        Response {
            model: std::mem::take(&mut self.model),
            finish_reason: self.finish_reason,
            usage: self.usage,
            blocks,
            provider_metadata: self.provider_metadata.take(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
