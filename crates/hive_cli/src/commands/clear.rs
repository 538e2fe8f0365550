//! Clear command - Reset an agent's conversation.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::GlobalArgs;

#[derive(Args)]
pub struct ClearArgs {
    /// Agent id or name
    agent: String,
}

pub async fn execute(global: &GlobalArgs, args: ClearArgs) -> Result<()> {
    let manager = global.offline_manager();
    let session = manager.open(&args.agent)?;
    session.clear();
    info!(agent = %session.agent_id(), "Conversation cleared");

    if !global.quiet {
        println!("✅ Memory reset for {}", manager.roster().find(&args.agent)?.name);
    }
    manager.close(&args.agent)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_chat::{FileTranscriptStore, Message, MessageRole, TranscriptStore};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_clear_overwrites_stored_transcript() {
        let temp = tempdir().unwrap();
        let store = FileTranscriptStore::new(temp.path());
        store
            .save("2", &[Message::agent("hello"), Message::user("a"), Message::agent("b")])
            .unwrap();

        let global = GlobalArgs {
            verbose: false,
            quiet: true,
            data_dir: Some(temp.path().to_path_buf()),
            model: None,
            ephemeral: false,
        };
        execute(&global, ClearArgs { agent: "DATA_WRAITH".to_string() }).await.unwrap();

        let messages = store.load("2").unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Agent);
        assert!(messages[0].content.contains("Memory reset for **DATA_WRAITH**"));
    }

    #[tokio::test]
    async fn test_clear_unknown_agent_fails() {
        let temp = tempdir().unwrap();
        let global = GlobalArgs {
            verbose: false,
            quiet: true,
            data_dir: Some(temp.path().to_path_buf()),
            model: None,
            ephemeral: false,
        };
        assert!(execute(&global, ClearArgs { agent: "GHOST".to_string() }).await.is_err());
    }
}
