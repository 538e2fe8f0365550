//! SYNTH_HIVE CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments (unknown or unavailable agent)
//! - 3: Configuration error (no API key)

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hive_chat::ChatError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so replies on stdout stay clean
    let level = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("hive_chat={level},hive_cli={level},warn"))
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Agents(args) => commands::agents::execute(&cli.global, args).await,
        Commands::Chat(args) => commands::chat::execute(&cli.global, args).await,
        Commands::Ask(args) => commands::ask::execute(&cli.global, args).await,
        Commands::History(args) => commands::history::execute(&cli.global, args).await,
        Commands::Clear(args) => commands::clear::execute(&cli.global, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<ChatError>() {
        Some(ChatError::AgentNotFound(_)) | Some(ChatError::AgentUnavailable { .. }) => {
            ExitCodes::INVALID_ARGS
        }
        Some(ChatError::NotConfigured) => ExitCodes::CONFIG_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
