//! Per-agent conversation state.
//!
//! A conversation is `Idle` until the user sends a message, then
//! `Awaiting` until the agent's reply completes or fails. At most one
//! agent message is in flight at a time; it is the only message whose
//! content may change.

use crate::agents;
use crate::types::{AgentId, Message, Persona};

/// Send state of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    /// No request in flight, sending allowed
    #[default]
    Idle,
    /// Waiting for the agent's reply
    Awaiting,
}

/// Message history and transient UI state for one agent
#[derive(Debug, Clone)]
pub struct Conversation {
    agent_id: AgentId,
    persona: Persona,
    messages: Vec<Message>,
    state: ConversationState,
    in_flight: Option<String>,
    draft: String,
}

impl Conversation {
    /// Start a conversation with the connection greeting
    pub fn new(agent_id: impl Into<AgentId>, persona: Persona) -> Self {
        let greeting = Message::agent(agents::greeting(&persona));
        Self::with_messages(agent_id, persona, vec![greeting])
    }

    /// Resume from a stored transcript; an empty transcript gets a greeting.
    pub fn restore(agent_id: impl Into<AgentId>, persona: Persona, messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            return Self::new(agent_id, persona);
        }
        Self::with_messages(agent_id, persona, messages)
    }

    fn with_messages(agent_id: impl Into<AgentId>, persona: Persona, messages: Vec<Message>) -> Self {
        Self {
            agent_id: agent_id.into(),
            persona,
            messages,
            state: ConversationState::Idle,
            in_flight: None,
            draft: String::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == ConversationState::Awaiting
    }

    /// Id of the agent message currently being streamed into
    pub fn in_flight_id(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Hand the draft over for sending and leave the input empty
    pub fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }

    /// Append the user's message and start awaiting a reply.
    ///
    /// Returns `None` without touching anything when the text is blank or a
    /// reply is already pending.
    pub fn append_user_message(&mut self, text: &str) -> Option<&Message> {
        if text.trim().is_empty() || self.is_awaiting() {
            return None;
        }
        self.messages.push(Message::user(text));
        self.state = ConversationState::Awaiting;
        self.messages.last()
    }

    /// Open an empty agent message for the streamed reply; returns its id.
    ///
    /// A reply left open from an earlier call is finalized as is.
    pub fn begin_agent_reply(&mut self) -> String {
        let message = Message::agent(String::new());
        let id = message.id.clone();
        self.messages.push(message);
        self.in_flight = Some(id.clone());
        id
    }

    /// Append a fragment to the in-flight reply. Returns false if nothing is in flight.
    pub fn append_to_reply(&mut self, delta: &str) -> bool {
        match self.in_flight_message_mut() {
            Some(message) => {
                message.content.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Finalize the in-flight reply as received
    pub fn complete_reply(&mut self) {
        self.in_flight = None;
        self.state = ConversationState::Idle;
    }

    /// Finalize the reply with an error block.
    ///
    /// Partial content already streamed stays in place and the error block
    /// follows it. Without an in-flight reply a new agent message carries the
    /// error.
    pub fn fail_reply(&mut self, error_text: &str) {
        match self.in_flight_message_mut() {
            Some(message) if message.content.is_empty() => {
                message.content = error_text.to_string();
            }
            Some(message) => {
                message.content.push_str("\n\n");
                message.content.push_str(error_text);
            }
            None => self.messages.push(Message::agent(error_text)),
        }
        self.in_flight = None;
        self.state = ConversationState::Idle;
    }

    /// Drop the history and start over with a single fresh greeting.
    ///
    /// Any in-flight reply is abandoned.
    pub fn reset(&mut self) {
        self.messages = vec![Message::agent(agents::reset_greeting(&self.persona))];
        self.in_flight = None;
        self.state = ConversationState::Idle;
    }

    fn in_flight_message_mut(&mut self) -> Option<&mut Message> {
        let id = self.in_flight.as_deref()?;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    fn persona() -> Persona {
        Persona {
            name: "NEON_WRITER".to_string(),
            role: "Content Strategist".to_string(),
            description: "Cyberpunk copy.".to_string(),
        }
    }

    #[test]
    fn test_new_conversation_has_greeting() {
        let conversation = Conversation::new("3", persona());
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, MessageRole::Agent);
        assert!(conversation.messages()[0].content.contains("NEON_WRITER"));
        assert_eq!(conversation.state(), ConversationState::Idle);
    }

    #[test]
    fn test_restore_empty_transcript_seeds_greeting() {
        let conversation = Conversation::restore("3", persona(), Vec::new());
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut conversation = Conversation::new("3", persona());
        assert!(conversation.append_user_message("").is_none());
        assert!(conversation.append_user_message("   \n\t").is_none());
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.state(), ConversationState::Idle);
    }

    #[test]
    fn test_send_while_awaiting_is_rejected() {
        let mut conversation = Conversation::new("3", persona());
        assert!(conversation.append_user_message("first").is_some());
        assert!(conversation.is_awaiting());

        assert!(conversation.append_user_message("second").is_none());
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn test_user_text_is_kept_verbatim() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("  padded  ");
        assert_eq!(conversation.messages()[1].content, "  padded  ");
    }

    #[test]
    fn test_streamed_reply_lifecycle() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("hello");
        let id = conversation.begin_agent_reply();
        assert_eq!(conversation.in_flight_id(), Some(id.as_str()));

        assert!(conversation.append_to_reply("Hi "));
        assert!(conversation.append_to_reply("there!"));
        conversation.complete_reply();

        let last = conversation.messages().last().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.content, "Hi there!");
        assert_eq!(conversation.state(), ConversationState::Idle);
        assert!(conversation.in_flight_id().is_none());
    }

    #[test]
    fn test_append_without_in_flight_is_noop() {
        let mut conversation = Conversation::new("3", persona());
        let before = conversation.messages().to_vec();
        assert!(!conversation.append_to_reply("stray"));
        assert_eq!(conversation.messages(), &before[..]);
    }

    #[test]
    fn test_fail_reply_without_fragments() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("ping");
        conversation.begin_agent_reply();
        conversation.fail_reply("ERR");

        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(conversation.messages()[2].content, "ERR");
        assert_eq!(conversation.state(), ConversationState::Idle);
    }

    #[test]
    fn test_fail_reply_keeps_partial_content() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("ping");
        conversation.begin_agent_reply();
        conversation.append_to_reply("partial");
        conversation.fail_reply("ERR");

        assert_eq!(conversation.messages()[2].content, "partial\n\nERR");
    }

    #[test]
    fn test_fail_reply_before_reply_started() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("ping");
        conversation.fail_reply("ERR");

        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(conversation.messages()[2].role, MessageRole::Agent);
        assert_eq!(conversation.messages()[2].content, "ERR");
        assert!(!conversation.is_awaiting());
    }

    #[test]
    fn test_reset_after_long_history() {
        let mut conversation = Conversation::new("3", persona());
        for i in 0..5 {
            conversation.append_user_message(&format!("message {}", i));
            conversation.begin_agent_reply();
            conversation.append_to_reply("ok");
            conversation.complete_reply();
        }
        assert_eq!(conversation.messages().len(), 11);

        conversation.reset();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, MessageRole::Agent);
        assert!(conversation.messages()[0].content.contains("Context cleared"));
    }

    #[test]
    fn test_reset_mid_stream_abandons_reply() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("hello");
        conversation.begin_agent_reply();
        conversation.append_to_reply("half");

        conversation.reset();
        assert!(conversation.in_flight_id().is_none());
        assert_eq!(conversation.state(), ConversationState::Idle);
        assert!(!conversation.append_to_reply("late"));
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let mut conversation = Conversation::new("3", persona());
        conversation.append_user_message("a");
        conversation.begin_agent_reply();
        conversation.complete_reply();

        let mut ids: Vec<_> = conversation.messages().iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_draft_is_taken_once() {
        let mut conversation = Conversation::new("3", persona());
        conversation.set_draft("work in progress");
        assert_eq!(conversation.draft(), "work in progress");
        assert_eq!(conversation.take_draft(), "work in progress");
        assert_eq!(conversation.draft(), "");
    }
}
