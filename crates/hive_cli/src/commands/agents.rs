//! Agents command - List the roster.

use anyhow::Result;
use clap::Args;

use hive_chat::{Agent, AgentStatus};

use super::GlobalArgs;

#[derive(Args)]
pub struct AgentsArgs {
    /// Print the roster as JSON
    #[arg(long)]
    json: bool,

    /// Only list agents that accept chats
    #[arg(long)]
    available: bool,
}

pub async fn execute(global: &GlobalArgs, args: AgentsArgs) -> Result<()> {
    let manager = global.offline_manager();
    let agents: Vec<&Agent> = manager
        .roster()
        .agents()
        .iter()
        .filter(|a| !args.available || a.status.accepts_chat())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    for agent in agents {
        println!("{}", format_agent(agent));
        if !global.quiet {
            println!("      {}", agent.description);
            println!("      avatar: {}", agent.avatar.url());
        }
    }

    Ok(())
}

fn status_badge(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Online => "🟢 AVAILABLE",
        AgentStatus::Busy => "🟡 BUSY",
        AgentStatus::Offline => "⚫ STANDBY",
    }
}

fn format_agent(agent: &Agent) -> String {
    format!(
        "[{}] {} //{}  {}  ({})",
        agent.id,
        agent.name,
        agent.role,
        status_badge(agent.status),
        agent.capabilities.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_chat::AgentRoster;

    #[test]
    fn test_format_agent() {
        let roster = AgentRoster::seed();
        let line = format_agent(roster.find("4").unwrap());
        assert_eq!(
            line,
            "[4] SEC_SENTINEL //Security Auditor  ⚫ STANDBY  (Auditing, Solidity, Pentesting)"
        );
    }
}
