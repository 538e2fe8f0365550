//! CLI command definitions.
//!
//! This module defines the command structure for the SYNTH_HIVE CLI and
//! the wiring shared by every subcommand: settings, transcript store and
//! response service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use hive_chat::{
    AgentRoster, ChatManager, FileTranscriptStore, GeminiAdapter, HiveSettings,
    MemoryTranscriptStore, ResponseService, TranscriptStore, UnconfiguredService,
};

pub mod agents;
pub mod ask;
pub mod chat;
pub mod clear;
pub mod history;

/// SYNTH_HIVE - chat with the agents of the hive
#[derive(Parser)]
#[command(name = "hive")]
#[command(version, about = "SYNTH_HIVE - chat with the agents of the hive")]
#[command(long_about = r#"
SYNTH_HIVE is a roster of AI agents you can talk to from the terminal.
Replies stream in as they are generated; every conversation is saved per
agent and picked up again next time.

COMMANDS:
  agents   → List the roster
  chat     → Open an interactive chat with an agent
  ask      → Send one message and print the reply
  history  → Print an agent's saved transcript
  clear    → Reset an agent's conversation

CONFIGURATION:
  GEMINI_API_KEY (or API_KEY)  Response service key
  SYNTH_HIVE_MODEL             Model id (default gemini-2.5-flash)
  SYNTH_HIVE_DATA_DIR          Data directory (default ./.synth_hive)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by all subcommands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data directory for settings and transcripts
    #[arg(long, global = true, env = "SYNTH_HIVE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Model id for the response service
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Keep transcripts in memory only
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the agents of the hive
    Agents(agents::AgentsArgs),

    /// Open an interactive chat with an agent
    Chat(chat::ChatArgs),

    /// Send a single message and print the reply
    Ask(ask::AskArgs),

    /// Print an agent's saved transcript
    History(history::HistoryArgs),

    /// Reset an agent's conversation to a fresh greeting
    Clear(clear::ClearArgs),
}

impl GlobalArgs {
    pub fn settings(&self) -> HiveSettings {
        HiveSettings::load(self.data_dir.clone()).with_model(self.model.clone())
    }

    pub fn store(&self, settings: &HiveSettings) -> Arc<dyn TranscriptStore> {
        if self.ephemeral {
            Arc::new(MemoryTranscriptStore::new())
        } else {
            Arc::new(FileTranscriptStore::new(&settings.data_dir))
        }
    }

    /// Manager backed by the configured response service
    pub fn chat_manager(&self) -> Result<ChatManager> {
        let settings = self.settings();
        let adapter = GeminiAdapter::from_settings(&settings)
            .context("Response service is not available")?;
        debug!(model = adapter.model(), data_dir = %settings.data_dir.display(), "Configured");
        Ok(self.manager_with(&settings, Arc::new(adapter)))
    }

    /// Manager for commands that never call the response service
    pub fn offline_manager(&self) -> ChatManager {
        let settings = self.settings();
        self.manager_with(&settings, Arc::new(UnconfiguredService))
    }

    fn manager_with(&self, settings: &HiveSettings, service: Arc<dyn ResponseService>) -> ChatManager {
        ChatManager::new(AgentRoster::seed(), service, self.store(settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_with_global_flags() {
        let cli = Cli::try_parse_from(["hive", "chat", "NEON_WRITER", "--model", "gemini-pro", "-v"]).unwrap();
        assert!(cli.global.verbose);
        assert_eq!(cli.global.model.as_deref(), Some("gemini-pro"));
        assert!(matches!(cli.command, Commands::Chat(_)));
    }
}
