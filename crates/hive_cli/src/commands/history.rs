//! History command - Print an agent's saved transcript.

use anyhow::Result;
use clap::Args;

use super::chat::Renderer;
use super::GlobalArgs;

#[derive(Args)]
pub struct HistoryArgs {
    /// Agent id or name
    agent: String,

    /// Print the transcript as JSON
    #[arg(long)]
    json: bool,

    /// Only show the last N messages
    #[arg(short, long)]
    limit: Option<usize>,
}

pub async fn execute(global: &GlobalArgs, args: HistoryArgs) -> Result<()> {
    let manager = global.offline_manager();
    let agent = manager.roster().find(&args.agent)?.clone();
    let messages = manager.history(&agent.id)?;

    let start = args
        .limit
        .map(|n| messages.len().saturating_sub(n))
        .unwrap_or(0);
    let shown = &messages[start..];

    if args.json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        if !global.quiet {
            println!("No conversation with {} yet.", agent.name);
        }
        return Ok(());
    }

    let renderer = Renderer::new(&agent.name);
    for message in shown {
        renderer.print_message(message);
    }
    Ok(())
}
