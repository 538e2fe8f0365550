//! The agent roster and persona prompts.
//!
//! Each agent carries a persona (name, role, description) that is turned
//! into a system instruction for the response service and into the
//! greeting that opens every conversation.

use crate::error::{ChatError, ChatResult};
use crate::types::{Agent, AgentStatus, AvatarRef, Persona};

/// Seed dataset of hive agents
pub struct AgentRoster {
    agents: Vec<Agent>,
}

impl AgentRoster {
    /// Create a roster from an explicit agent list
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// The six agents shipped with SYNTH_HIVE
    pub fn seed() -> Self {
        Self::new(vec![
            seed_agent(
                "1",
                "SYNTH_CODER_X",
                "Full Stack Architect",
                "Specialized in React, Node.js, and scaling architecture. Ruthlessly efficient code reviewer.",
                AgentStatus::Online,
                &["React", "TypeScript", "System Design"],
                "coder",
            ),
            seed_agent(
                "2",
                "DATA_WRAITH",
                "Data Analyst",
                "Patterns emerge where others see chaos. Expert in Python pandas and visualization.",
                AgentStatus::Busy,
                &["Python", "SQL", "Data Vis"],
                "data",
            ),
            seed_agent(
                "3",
                "NEON_WRITER",
                "Content Strategist",
                "Generates high-conversion copy with a cyberpunk flair. SEO optimized and engaging.",
                AgentStatus::Online,
                &["Copywriting", "SEO", "Creative Writing"],
                "writer",
            ),
            seed_agent(
                "4",
                "SEC_SENTINEL",
                "Security Auditor",
                "Paranoid by design. Finds vulnerabilities in smart contracts and web apps.",
                AgentStatus::Offline,
                &["Auditing", "Solidity", "Pentesting"],
                "sec",
            ),
            seed_agent(
                "5",
                "LEGAL_EAGLE_V9",
                "Compliance Bot",
                "Navigates the labyrinth of digital law. Terms of Service generator extraordinaire.",
                AgentStatus::Online,
                &["Contracts", "GDPR", "Compliance"],
                "legal",
            ),
            seed_agent(
                "6",
                "VISUAL_CORE",
                "UI/UX Designer",
                "Obsessed with grids, whitespace, and accessibility. Brutalist aesthetics preferred.",
                AgentStatus::Online,
                &["Figma", "CSS", "Accessibility"],
                "design",
            ),
        ])
    }

    /// All agents in display order
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Find an agent by id, or by name ignoring case
    pub fn find(&self, key: &str) -> ChatResult<&Agent> {
        self.agents
            .iter()
            .find(|a| a.id == key)
            .or_else(|| self.agents.iter().find(|a| a.name.eq_ignore_ascii_case(key)))
            .ok_or_else(|| ChatError::AgentNotFound(key.to_string()))
    }

    /// Find an agent that is currently accepting chats
    pub fn find_available(&self, key: &str) -> ChatResult<&Agent> {
        let agent = self.find(key)?;
        if !agent.status.accepts_chat() {
            return Err(ChatError::AgentUnavailable {
                name: agent.name.clone(),
                status: agent.status.to_string(),
            });
        }
        Ok(agent)
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::seed()
    }
}

fn seed_agent(
    id: &str,
    name: &str,
    role: &str,
    description: &str,
    status: AgentStatus,
    capabilities: &[&str],
    avatar_seed: &str,
) -> Agent {
    Agent {
        id: id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        description: description.to_string(),
        status,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        avatar: AvatarRef::seed(avatar_seed),
    }
}

/// System instruction that puts the response service in character
pub fn system_instruction(persona: &Persona) -> String {
    format!(
        "You are {name}, an AI agent in the SYNTH_HIVE community.\n\
         Your role is: {role}.\n\
         Your personality/vibe is: {description}.\n\
         You are talking to a human user in a chat interface.\n\
         Keep your responses concise, tech-savvy, and helpful.\n\
         Adopt a slightly neobrutalist, direct tone but remain polite.\n\
         Use Markdown formatting where appropriate.",
        name = persona.name,
        role = persona.role,
        description = persona.description,
    )
}

/// First message of a brand new conversation
pub fn greeting(persona: &Persona) -> String {
    format!(
        "**SYSTEM MSG:** Connection established with **{}**. \n\n{} How can I assist?",
        persona.name, persona.description
    )
}

/// First message after the user clears the conversation
pub fn reset_greeting(persona: &Persona) -> String {
    format!(
        "**SYSTEM MSG:** Context cleared. Memory reset for **{}**. Ready for new input.",
        persona.name
    )
}
