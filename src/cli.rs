// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-agent LLM conversations in the terminal.
#[derive(Parser, Debug)]
#[command(name = "ikigai", version, about)]
pub struct Cli {
    /// Explicit config file (merged over the standard search paths).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Model override: "provider/model" (e.g. "anthropic/claude-sonnet-4-5")
    /// or a bare model name for the configured provider.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Log to stderr instead of IKIGAI_LOG_FILE (only useful with
    /// subcommands; the TUI owns the terminal).
    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the merged configuration and exit.
    ShowConfig,
}

/// Apply a `--model` override onto the loaded config.
///
/// `"provider/model"` sets both; a bare name keeps the provider.
pub fn apply_model_override(config: &mut ikigai_config::Config, override_str: &str) {
    if let Some((provider, model)) = override_str.split_once('/') {
        config.model.provider = provider.to_string();
        config.model.name = model.to_string();
        // Credentials belong to the old provider.
        config.model.api_key = None;
    } else {
        config.model.name = override_str.to_string();
    }
}
