//! Ask command - Send one message and print the reply.

use anyhow::{bail, Result};
use clap::Args;

use hive_chat::SendOutcome;

use super::chat::{exchange, Renderer};
use super::GlobalArgs;

#[derive(Args)]
pub struct AskArgs {
    /// Agent id or name
    agent: String,

    /// Message to send
    message: String,
}

pub async fn execute(global: &GlobalArgs, args: AskArgs) -> Result<()> {
    let manager = global.chat_manager()?;
    let session = manager.open(&args.agent)?;
    let agent_name = manager.roster().find(&args.agent)?.name.clone();

    let mut renderer = Renderer::new(agent_name);
    session.set_draft(args.message);
    let outcome = exchange(&session, &mut renderer).await;

    match outcome {
        SendOutcome::Completed => Ok(()),
        SendOutcome::Rejected => bail!("Nothing to send: the message is empty"),
        SendOutcome::Failed => bail!("The agent could not be reached"),
        SendOutcome::Abandoned => bail!("The reply was abandoned"),
    }
}
