// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
mod cli;

use clap::Parser;
use cli::{apply_model_override, Cli, Commands};
use ikigai_core::{MemoryDb, NullDb, Repl};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal, so tracing output goes to a file
    // (IKIGAI_LOG_FILE) or nowhere; --verbose writes to stderr and is only
    // useful with subcommands.
    let is_tui = cli.command.is_none();
    init_logging(cli.verbose, is_tui);

    // Install the process-wide TLS crypto provider before any HTTP client
    // is built.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut config = ikigai_config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        apply_model_override(&mut config, model);
    }

    if let Some(Commands::ShowConfig) = &cli.command {
        println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
        return Ok(());
    }

    // The SQL backend is an external collaborator; without a configured
    // database the REPL runs fully in memory.
    let db: Box<dyn ikigai_core::Database> = match &config.database_url {
        Some(url) => {
            tracing::info!(url = %url, "using in-process database");
            Box::new(MemoryDb::new())
        }
        None => Box::new(NullDb),
    };

    let mut repl = Repl::new(config, db)?;
    repl.attach_terminal()?;
    repl.run().await
}

fn init_logging(verbose: bool, is_tui: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(path) = std::env::var("IKIGAI_LOG_FILE") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::sync::Arc::new(file)).with_ansi(false))
                .init();
            return;
        }
    }

    if verbose && !is_tui {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    // TUI without a log file: tracing stays unsubscribed so nothing
    // corrupts the display.
}
