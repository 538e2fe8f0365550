//! Chat command - Interactive chat with an agent.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

use hive_chat::{ChatSession, ConversationEvent, Message, MessageRole, SendOutcome};

use super::GlobalArgs;

#[derive(Args)]
pub struct ChatArgs {
    /// Agent id or name
    agent: String,
}

pub async fn execute(global: &GlobalArgs, args: ChatArgs) -> Result<()> {
    let manager = global.chat_manager()?;
    let agent = manager.roster().find_available(&args.agent)?.clone();
    let session = manager.open(&agent.id)?;
    info!("Chat opened with {}", agent.name);

    let mut renderer = Renderer::new(&agent.name);
    if !global.quiet {
        println!("🤖 {} // {}", agent.name, agent.role);
        println!("   /clear resets the conversation, /exit leaves\n");
    }
    for message in session.messages() {
        renderer.print_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/exit" | "/quit" => break,
            "/clear" => {
                let mut events = session.subscribe();
                session.clear();
                renderer.drain(&mut events);
            }
            _ => {
                session.set_draft(line.as_str());
                exchange(&session, &mut renderer).await;
            }
        }
    }

    manager.close(&agent.id)?;
    Ok(())
}

/// Send the session's draft, printing the reply as it streams in
pub async fn exchange(session: &ChatSession, renderer: &mut Renderer) -> SendOutcome {
    let mut events = session.subscribe();
    let send = session.send_draft();
    tokio::pin!(send);

    loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                if let Ok(event) = event {
                    renderer.render(&event);
                }
            }
            outcome = &mut send => {
                renderer.drain(&mut events);
                return outcome;
            }
        }
    }
}

/// Prints conversation events to stdout
pub struct Renderer {
    agent_name: String,
    partial: bool,
}

impl Renderer {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            partial: false,
        }
    }

    fn header(&self, message: &Message) -> String {
        let who = match message.role {
            MessageRole::User => "OPERATOR",
            MessageRole::Agent => self.agent_name.as_str(),
        };
        let local = message.timestamp.with_timezone(&chrono::Local);
        format!("{} // {}", who, local.format("%H:%M:%S"))
    }

    /// Print a whole message
    pub fn print_message(&self, message: &Message) {
        println!("{}", self.header(message));
        println!("{}\n", message.content);
    }

    /// Print whatever is still queued
    pub fn drain(&mut self, events: &mut broadcast::Receiver<ConversationEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.render(&event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    pub fn render(&mut self, event: &ConversationEvent) {
        match event {
            // Already on screen as typed input
            ConversationEvent::UserMessage(_) => {}
            ConversationEvent::ReplyStarted { .. } => {
                println!("{} // streaming", self.agent_name);
                self.partial = false;
            }
            ConversationEvent::Fragment { delta, .. } => {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
                self.partial = true;
            }
            ConversationEvent::ReplyCompleted { .. } => {
                println!("\n");
                self.partial = false;
            }
            ConversationEvent::ReplyFailed(message) => {
                if self.partial {
                    // Partial text is already printed; show only what was added
                    println!("\n{}\n", hive_chat::CONNECTION_ERROR_TEXT);
                } else {
                    self.print_message(message);
                }
                self.partial = false;
            }
            ConversationEvent::Reset(greeting) => self.print_message(greeting),
        }
    }
}
