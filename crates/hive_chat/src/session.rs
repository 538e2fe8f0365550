//! Chat session controller.
//!
//! This module provides the main entry point for chat operations,
//! coordinating between the conversation state, the transcript store and
//! the response service.
//!
//! A [`ChatSession`] is a cheap handle; clones share the same conversation.
//! The conversation lock is never held across an `.await`, so fragments,
//! clears and sends interleave only at well-defined points. Every change to
//! the message list is saved in full before the lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::agents::AgentRoster;
use crate::conversation::{Conversation, ConversationState};
use crate::error::ChatResult;
use crate::llm::{ResponseRequest, ResponseService};
use crate::persistence::TranscriptStore;
use crate::stream::{self, IntegrationOutcome, ReplySink};
use crate::types::{Agent, AgentId, Message};

/// Text shown in place of a reply when the response service fails
pub const CONNECTION_ERROR_TEXT: &str = "```error\nConnection interrupted. Packet loss detected.\n```";

const EVENT_CAPACITY: usize = 256;

/// Change notifications for front ends that render incrementally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    UserMessage(Message),
    ReplyStarted { message_id: String },
    Fragment { message_id: String, delta: String },
    ReplyCompleted { message_id: String },
    ReplyFailed(Message),
    Reset(Message),
}

/// Result of [`ChatSession::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, a reply already pending, or the session is closed
    Rejected,
    /// The reply streamed to the end
    Completed,
    /// The response service failed; the error text was appended
    Failed,
    /// The session was cleared or closed while the reply was streaming
    Abandoned,
}

struct SessionState {
    conversation: Conversation,
    /// Id of the user message whose reply is pending
    pending: Option<String>,
    closed: bool,
}

struct SessionInner {
    state: Mutex<SessionState>,
    store: Arc<dyn TranscriptStore>,
    service: Arc<dyn ResponseService>,
    events: broadcast::Sender<ConversationEvent>,
}

/// Chat with one agent
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    /// Open a session, restoring the agent's transcript when one is stored
    pub fn open(
        agent: &Agent,
        service: Arc<dyn ResponseService>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        let stored = match store.load(&agent.id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(agent = %agent.id, "Failed to load chat history: {}", e);
                None
            }
        };

        let conversation = match stored {
            Some(messages) => {
                debug!(agent = %agent.id, count = messages.len(), "Restored conversation");
                Conversation::restore(agent.id.clone(), agent.persona(), messages)
            }
            None => Conversation::new(agent.id.clone(), agent.persona()),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    conversation,
                    pending: None,
                    closed: false,
                }),
                store,
                service,
                events,
            }),
        };

        let state = session.inner.state.lock();
        session.persist(&state.conversation);
        drop(state);
        session
    }

    pub fn agent_id(&self) -> AgentId {
        self.inner.state.lock().conversation.agent_id().to_string()
    }

    /// Snapshot of the message list
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().conversation.messages().to_vec()
    }

    pub fn state(&self) -> ConversationState {
        self.inner.state.lock().conversation.state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Receive change notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.inner.events.subscribe()
    }

    pub fn draft(&self) -> String {
        self.inner.state.lock().conversation.draft().to_string()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.inner.state.lock().conversation.set_draft(text);
    }

    /// Send whatever is in the draft; the draft is kept if the send is rejected.
    pub async fn send_draft(&self) -> SendOutcome {
        let text = {
            let mut state = self.inner.state.lock();
            if state.conversation.is_awaiting() || state.conversation.draft().trim().is_empty() {
                return SendOutcome::Rejected;
            }
            state.conversation.take_draft()
        };
        self.send(&text).await
    }

    /// Send a user message and stream the agent's reply into the conversation.
    ///
    /// Never fails: service faults end up as an error message in the
    /// conversation.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let (request, user_id) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return SendOutcome::Rejected;
            }

            let prior = state.conversation.messages().to_vec();
            let persona = state.conversation.persona().clone();
            let Some(user_message) = state.conversation.append_user_message(text).cloned() else {
                debug!("Send rejected");
                return SendOutcome::Rejected;
            };

            state.pending = Some(user_message.id.clone());
            self.persist(&state.conversation);
            self.emit(ConversationEvent::UserMessage(user_message.clone()));

            (ResponseRequest::new(persona, &prior, text), user_message.id)
        };

        info!(
            agent = %request.persona.name,
            history = request.history.len(),
            "Sending message"
        );

        let fragments = match self.inner.service.stream_reply(request).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!("Chat error: {}", e);
                return self.fail_pending(&user_id);
            }
        };

        let message_id = {
            let mut state = self.inner.state.lock();
            if state.closed || state.pending.as_deref() != Some(user_id.as_str()) {
                debug!("Conversation moved on before the reply started");
                return SendOutcome::Abandoned;
            }
            state.pending = None;
            let message_id = state.conversation.begin_agent_reply();
            self.persist(&state.conversation);
            self.emit(ConversationEvent::ReplyStarted {
                message_id: message_id.clone(),
            });
            message_id
        };

        let mut sink = SessionReply {
            session: self,
            message_id,
            detached: false,
        };
        let outcome = stream::integrate(fragments, &mut sink).await;

        match outcome {
            _ if sink.detached => SendOutcome::Abandoned,
            IntegrationOutcome::Completed { fragments } => {
                debug!(fragments, "Reply complete");
                SendOutcome::Completed
            }
            IntegrationOutcome::Faulted { .. } => SendOutcome::Failed,
            IntegrationOutcome::Abandoned { .. } => SendOutcome::Abandoned,
        }
    }

    /// Clear the conversation down to a fresh greeting.
    ///
    /// A reply still streaming is abandoned.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.conversation.reset();
        state.pending = None;
        self.persist(&state.conversation);
        if let Some(greeting) = state.conversation.messages().first() {
            self.emit(ConversationEvent::Reset(greeting.clone()));
        }
    }

    /// Tear the session down. Replies still streaming are discarded.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
    }

    fn fail_pending(&self, user_id: &str) -> SendOutcome {
        let mut state = self.inner.state.lock();
        if state.closed || state.pending.as_deref() != Some(user_id) {
            return SendOutcome::Abandoned;
        }
        state.pending = None;
        state.conversation.fail_reply(CONNECTION_ERROR_TEXT);
        self.persist(&state.conversation);
        if let Some(message) = state.conversation.messages().last() {
            self.emit(ConversationEvent::ReplyFailed(message.clone()));
        }
        SendOutcome::Failed
    }

    fn persist(&self, conversation: &Conversation) {
        if let Err(e) = self
            .inner
            .store
            .save(conversation.agent_id(), conversation.messages())
        {
            warn!(agent = %conversation.agent_id(), "Failed to save chat history: {}", e);
        }
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

/// Applies one streamed reply to its session
struct SessionReply<'a> {
    session: &'a ChatSession,
    message_id: String,
    detached: bool,
}

impl SessionReply<'_> {
    /// Apply `f` if this reply is still the one in flight, then save and emit
    /// its event before the lock is released so events keep the order of
    /// the changes they describe.
    fn with_reply(&mut self, f: impl FnOnce(&mut Conversation, &str) -> Option<ConversationEvent>) -> bool {
        let mut state = self.session.inner.state.lock();
        if state.closed || state.conversation.in_flight_id() != Some(self.message_id.as_str()) {
            self.detached = true;
            return false;
        }
        let event = f(&mut state.conversation, &self.message_id);
        self.session.persist(&state.conversation);
        if let Some(event) = event {
            self.session.emit(event);
        }
        true
    }
}

impl ReplySink for SessionReply<'_> {
    fn append(&mut self, delta: &str) -> bool {
        self.with_reply(|c, id| {
            c.append_to_reply(delta).then(|| ConversationEvent::Fragment {
                message_id: id.to_string(),
                delta: delta.to_string(),
            })
        })
    }

    fn complete(&mut self) {
        self.with_reply(|c, id| {
            c.complete_reply();
            Some(ConversationEvent::ReplyCompleted {
                message_id: id.to_string(),
            })
        });
    }

    fn fail(&mut self, _reason: &str) {
        self.with_reply(|c, id| {
            c.fail_reply(CONNECTION_ERROR_TEXT);
            c.messages()
                .iter()
                .rev()
                .find(|m| m.id == id)
                .cloned()
                .map(ConversationEvent::ReplyFailed)
        });
    }
}

/// Opens and keeps one session per agent
pub struct ChatManager {
    roster: AgentRoster,
    service: Arc<dyn ResponseService>,
    store: Arc<dyn TranscriptStore>,
    sessions: Mutex<HashMap<AgentId, ChatSession>>,
}

impl ChatManager {
    /// Create a chat manager with an injected response service and store
    pub fn new(
        roster: AgentRoster,
        service: Arc<dyn ResponseService>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            roster,
            service,
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    /// Session for an agent, opened on first use
    pub fn open(&self, agent_key: &str) -> ChatResult<ChatSession> {
        let agent = self.roster.find_available(agent_key)?;
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(agent.id.clone())
            .or_insert_with(|| {
                info!(agent = %agent.name, "Opening chat");
                ChatSession::open(agent, self.service.clone(), self.store.clone())
            })
            .clone();
        Ok(session)
    }

    /// Close an agent's session if it is open
    pub fn close(&self, agent_key: &str) -> ChatResult<()> {
        let agent = self.roster.find(agent_key)?;
        if let Some(session) = self.sessions.lock().remove(&agent.id) {
            session.close();
        }
        Ok(())
    }

    /// Stored messages for an agent, without opening a session
    pub fn history(&self, agent_key: &str) -> ChatResult<Vec<Message>> {
        let agent = self.roster.find(agent_key)?;
        if let Some(session) = self.sessions.lock().get(&agent.id) {
            return Ok(session.messages());
        }
        match self.store.load(&agent.id) {
            Ok(messages) => Ok(messages.unwrap_or_default()),
            Err(e) => {
                warn!(agent = %agent.id, "Failed to load chat history: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::mock::{ScriptedReply, ScriptedResponseService};
    use crate::persistence::{MemoryTranscriptStore, MockTranscriptStore};
    use crate::types::MessageRole;

    fn agent() -> Agent {
        AgentRoster::seed().find("1").unwrap().clone()
    }

    #[tokio::test]
    async fn test_save_failure_does_not_break_chat() {
        let mut store = MockTranscriptStore::new();
        store.expect_load().returning(|_| Ok(None));
        store
            .expect_save()
            .returning(|_, _| Err(ChatError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))));

        let service = ScriptedResponseService::new().add_reply(ScriptedReply::fragments(["ok"]));
        let session = ChatSession::open(&agent(), Arc::new(service), Arc::new(store));

        assert_eq!(session.send("hello").await, SendOutcome::Completed);
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, "ok");
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_greeting() {
        let mut store = MockTranscriptStore::new();
        store
            .expect_load()
            .returning(|_| Err(ChatError::Serialization("corrupt".to_string())));
        store.expect_save().returning(|_, _| Ok(()));

        let service = ScriptedResponseService::new();
        let session = ChatSession::open(&agent(), Arc::new(service), Arc::new(store));

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Agent);
        assert!(messages[0].content.contains("Connection established"));
    }

    #[tokio::test]
    async fn test_every_mutation_saves_full_transcript() {
        let mut store = MockTranscriptStore::new();
        store.expect_load().returning(|_| Ok(None));
        // open, user message, reply started, two fragments, completion
        store.expect_save().times(6).returning(|_, _| Ok(()));

        let service = ScriptedResponseService::new().add_reply(ScriptedReply::fragments(["Hi ", "there!"]));
        let session = ChatSession::open(&agent(), Arc::new(service), Arc::new(store));
        assert_eq!(session.send("hello").await, SendOutcome::Completed);
    }

    #[tokio::test]
    async fn test_failed_sends_leave_store_in_step() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let service = ScriptedResponseService::new()
            .add_reply(ScriptedReply::refuse("connection refused"))
            .add_reply(ScriptedReply::fault_after(["x"], "reset by peer"));
        let session = ChatSession::open(&agent(), Arc::new(service), store.clone());

        // Refused before any stream exists
        assert_eq!(session.send("first").await, SendOutcome::Failed);
        let stored = store.load("1").unwrap().unwrap();
        assert_eq!(stored, session.messages());
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].content, CONNECTION_ERROR_TEXT);

        // Faulted after one fragment
        assert_eq!(session.send("second").await, SendOutcome::Failed);
        let stored = store.load("1").unwrap().unwrap();
        assert_eq!(stored, session.messages());
        assert_eq!(stored.len(), 5);
        assert_eq!(stored[4].content, format!("x\n\n{}", CONNECTION_ERROR_TEXT));
        assert_eq!(session.state(), ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_events_follow_the_stream() {
        let service = ScriptedResponseService::new().add_reply(ScriptedReply::fragments(["a", "b"]));
        let session = ChatSession::open(
            &agent(),
            Arc::new(service),
            Arc::new(MemoryTranscriptStore::new()),
        );
        let mut events = session.subscribe();

        session.send("hi").await;

        assert!(matches!(events.recv().await.unwrap(), ConversationEvent::UserMessage(m) if m.content == "hi"));
        let ConversationEvent::ReplyStarted { message_id } = events.recv().await.unwrap() else {
            panic!("expected reply start");
        };
        assert_eq!(
            events.recv().await.unwrap(),
            ConversationEvent::Fragment { message_id: message_id.clone(), delta: "a".to_string() }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConversationEvent::Fragment { message_id: message_id.clone(), delta: "b".to_string() }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConversationEvent::ReplyCompleted { message_id }
        );
    }

    #[tokio::test]
    async fn test_send_draft() {
        let service = ScriptedResponseService::new().add_reply(ScriptedReply::fragments(["done"]));
        let session = ChatSession::open(
            &agent(),
            Arc::new(service.clone()),
            Arc::new(MemoryTranscriptStore::new()),
        );

        assert_eq!(session.send_draft().await, SendOutcome::Rejected);

        session.set_draft("from the input box");
        assert_eq!(session.send_draft().await, SendOutcome::Completed);
        assert_eq!(session.draft(), "");
        assert_eq!(service.captured_requests()[0].message, "from the input box");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_sends() {
        let service = ScriptedResponseService::new();
        let session = ChatSession::open(
            &agent(),
            Arc::new(service.clone()),
            Arc::new(MemoryTranscriptStore::new()),
        );
        session.close();

        assert!(session.is_closed());
        assert_eq!(session.send("anyone?").await, SendOutcome::Rejected);
        assert_eq!(service.call_count(), 0);
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_manager_reuses_sessions_per_agent() {
        let manager = ChatManager::new(
            AgentRoster::seed(),
            Arc::new(ScriptedResponseService::new()),
            Arc::new(MemoryTranscriptStore::new()),
        );

        let a = manager.open("SYNTH_CODER_X").unwrap();
        let b = manager.open("1").unwrap();
        a.set_draft("shared");
        assert_eq!(b.draft(), "shared");

        let other = manager.open("2").unwrap();
        assert_eq!(other.draft(), "");
        assert_eq!(other.agent_id(), "2");
    }

    #[test]
    fn test_manager_refuses_offline_agent() {
        let manager = ChatManager::new(
            AgentRoster::seed(),
            Arc::new(ScriptedResponseService::new()),
            Arc::new(MemoryTranscriptStore::new()),
        );
        assert!(matches!(
            manager.open("SEC_SENTINEL"),
            Err(ChatError::AgentUnavailable { .. })
        ));
        assert!(manager.history("SEC_SENTINEL").unwrap().is_empty());
    }

    #[test]
    fn test_manager_close_tears_down_session() {
        let manager = ChatManager::new(
            AgentRoster::seed(),
            Arc::new(ScriptedResponseService::new()),
            Arc::new(MemoryTranscriptStore::new()),
        );
        let session = manager.open("3").unwrap();
        manager.close("3").unwrap();
        assert!(session.is_closed());

        let reopened = manager.open("3").unwrap();
        assert!(!reopened.is_closed());
        assert_eq!(manager.history("3").unwrap().len(), 1);
    }
}
