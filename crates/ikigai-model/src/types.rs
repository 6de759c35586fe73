use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCategory;

// ─── Roles and content blocks ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One element of a message's content.
///
/// Always a tagged variant — the variant is never inferred from field
/// presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolCall {
        /// Opaque identifier produced by the provider (forwarded verbatim)
        id: String,
        name: String,
        /// JSON-encoded argument object
        arguments: String,
        /// Opaque thought signature (Gemini 3); never interpreted, only
        /// re-attached on the next request.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    RedactedThinking {
        /// Encrypted blob returned by the provider; round-tripped untouched.
        data: String,
    },
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
    /// Adapter-owned opaque metadata.  The core never reads it except to
    /// hand it back to the adapter that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::Text { text: text.into() }],
            provider_metadata: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            blocks: vec![ContentBlock::Text { text: text.into() }],
            provider_metadata: None,
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            blocks: vec![ContentBlock::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
                is_error,
            }],
            provider_metadata: None,
        }
    }

    /// Plain text of this message when it consists of exactly one text block.
    pub fn as_text(&self) -> Option<&str> {
        match self.blocks.as_slice() {
            [ContentBlock::Text { text }] => Some(text),
            _ => None,
        }
    }

    /// Concatenation of all text blocks (thinking excluded).
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// First tool-call block, if any.
    pub fn tool_call(&self) -> Option<(&str, &str, &str)> {
        self.blocks.iter().find_map(|b| match b {
            ContentBlock::ToolCall { id, name, arguments, .. } => {
                Some((id.as_str(), name.as_str(), arguments.as_str()))
            }
            _ => None,
        })
    }
}

// ─── Tooling ──────────────────────────────────────────────────────────────────

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: Value,
    /// Provider strict-mode flag (honored where the wire supports it)
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

// ─── Thinking ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// Canonical thinking setting carried on every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thinking {
    pub level: ThinkingLevel,
    /// Ask the provider to stream thinking summaries when it can.
    pub include_summary: bool,
}

// ─── Request / response ───────────────────────────────────────────────────────

/// Provider-agnostic completion request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_output_tokens: Option<u32>,
    pub thinking: Thinking,
    /// Applied only when the model supports sampling temperature.
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub thinking_tokens: u32,
}

/// Provider-agnostic completion response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
    pub blocks: Vec<ContentBlock>,
    /// Adapter-owned opaque metadata, copied onto the assistant message this
    /// response becomes (e.g. Gemini thought signatures).
    pub provider_metadata: Option<Value>,
}

impl Response {
    /// Concatenation of all text blocks.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool-call blocks in order.
    pub fn tool_calls(&self) -> Vec<&ContentBlock> {
        self.blocks
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolCall { .. }))
            .collect()
    }
}

// ─── Stream events ────────────────────────────────────────────────────────────

/// Ordered notification emitted by an adapter while a response streams.
///
/// Deltas for one tool-call index never interleave with deltas for another;
/// exactly one `Done` or `Error` ends the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start {
        model: String,
    },
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        text: String,
    },
    ToolCallStart {
        index: u32,
        id: String,
        name: String,
    },
    ToolCallDelta {
        index: u32,
        arguments: String,
    },
    ToolCallDone {
        index: u32,
    },
    Done {
        finish_reason: FinishReason,
        usage: TokenUsage,
    },
    Error {
        category: ErrorCategory,
        message: String,
    },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
