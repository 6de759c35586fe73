// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
pub mod compare;
pub mod error;
pub(crate) mod sse;
mod types;
mod provider;
mod openai;
mod anthropic;
mod google;
mod mock;

pub use types::*;
pub use provider::{Provider, StreamParser, WireRequest, Accumulator};
pub use openai::OpenAiProvider;
pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use mock::{MockProvider, MockTurn};
pub use error::{ErrorCategory, ProviderError};

use anyhow::bail;
use ikigai_config::{ModelConfig, ThinkingLevelConfig};

/// Construct a boxed [`Provider`] from configuration.
///
/// The API key is resolved by the caller (config crate) so this function
/// stays free of environment access.
pub fn from_config(cfg: &ModelConfig, api_key: Option<String>) -> anyhow::Result<Box<dyn Provider>> {
    let thinking = Thinking {
        level: match cfg.thinking_level {
            ThinkingLevelConfig::None => ThinkingLevel::None,
            ThinkingLevelConfig::Low => ThinkingLevel::Low,
            ThinkingLevelConfig::Medium => ThinkingLevel::Medium,
            ThinkingLevelConfig::High => ThinkingLevel::High,
        },
        include_summary: cfg.include_thinking,
    };

    let provider: Box<dyn Provider> = match cfg.provider.as_str() {
        "openai" => Box::new(OpenAiProvider::new(
            cfg.name.clone(),
            api_key,
            cfg.base_url.clone(),
        )),
        "anthropic" => Box::new(AnthropicProvider::new(
            cfg.name.clone(),
            api_key,
            cfg.base_url.clone(),
        )),
        "google" => Box::new(GoogleProvider::new(
            cfg.name.clone(),
            api_key,
            cfg.base_url.clone(),
        )),
        "mock" => Box::new(MockProvider::new(cfg.name.clone())),
        other => bail!("unknown model provider: {other:?} (expected openai, anthropic, google, or mock)"),
    };

    // A model that cannot express the configured thinking level is a config
    // error, surfaced at startup rather than on the first request.
    provider.validate_thinking(thinking.level)?;
    Ok(provider)
}
