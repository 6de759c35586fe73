// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_history_size() -> usize {
    100
}

fn default_max_tool_turns() -> u32 {
    10
}

fn default_max_output_size() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub repl: ReplConfig,
    /// Database connection string.  When absent, persistence is disabled and
    /// the REPL runs purely in memory.
    pub database_url: Option<String>,
    /// Listen address for the (reserved) control socket.
    pub listen_address: Option<String>,
    /// Listen port for the (reserved) control socket.
    pub listen_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" | "anthropic" | "google" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Sampling temperature, applied only when the model supports it
    pub temperature: Option<f32>,
    /// Maximum completion tokens to request
    pub max_completion_tokens: Option<u32>,
    /// System message prepended to every conversation
    pub system_message: Option<String>,
    /// Thinking level: "none" | "low" | "medium" | "high"
    #[serde(default)]
    pub thinking_level: ThinkingLevelConfig,
    /// Include thinking summaries in streamed output when the provider
    /// supports it.
    #[serde(default)]
    pub include_thinking: bool,
    /// Base URL override.  Useful for local proxies.  For the hosted
    /// providers the correct default is auto-selected.
    pub base_url: Option<String>,
    /// Explicit API key; prefer the provider env var or the credentials file
    /// to keep secrets out of version-controlled config.
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            temperature: None,
            max_completion_tokens: None,
            system_message: None,
            thinking_level: ThinkingLevelConfig::None,
            include_thinking: false,
            base_url: None,
            api_key: None,
        }
    }
}

/// Thinking level as written in config files.
///
/// Mirrors the canonical level in ikigai-model; kept separate so the config
/// crate stays independent from the model crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevelConfig {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Number of submitted input lines kept for up/down-arrow recall.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Maximum number of tool-call rounds before the model is forced to
    /// produce a terminating text reply.
    #[serde(default = "default_max_tool_turns")]
    pub max_tool_turns: u32,
    /// Informational ceiling on accumulated response size in bytes.
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            max_tool_turns: default_max_tool_turns(),
            max_output_size: default_max_output_size(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
