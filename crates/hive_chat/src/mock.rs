//! Scripted response service for testing.
//!
//! Replays predefined replies (fragments, faults, refused requests) in
//! order and captures every request so tests can inspect what the session
//! sent, without network access.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{ChatError, ChatResult};
use crate::llm::{FragmentStream, ResponseRequest, ResponseService};

/// How a scripted reply ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEnd {
    /// Stream ends normally
    Complete,
    /// Stream raises a transport fault after the fragments
    Fault(String),
}

/// Predefined reply for one `stream_reply` call
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Request accepted; fragments are streamed, then the stream ends
    Stream { fragments: Vec<String>, end: ScriptEnd },
    /// Request refused before any stream exists
    Refuse(String),
}

impl ScriptedReply {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream {
            fragments: fragments.into_iter().map(Into::into).collect(),
            end: ScriptEnd::Complete,
        }
    }

    pub fn fault_after<I, S>(fragments: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream {
            fragments: fragments.into_iter().map(Into::into).collect(),
            end: ScriptEnd::Fault(reason.into()),
        }
    }

    pub fn refuse(reason: impl Into<String>) -> Self {
        Self::Refuse(reason.into())
    }
}

/// Response service that replays scripted replies.
///
/// When the script runs out every further call is refused.
#[derive(Clone, Default)]
pub struct ScriptedResponseService {
    replies: Arc<RwLock<VecDeque<ScriptedReply>>>,
    captured: Arc<RwLock<Vec<ResponseRequest>>>,
}

impl ScriptedResponseService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call
    pub fn add_reply(self, reply: ScriptedReply) -> Self {
        self.replies.write().push_back(reply);
        self
    }

    /// Requests received so far
    pub fn captured_requests(&self) -> Vec<ResponseRequest> {
        self.captured.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }
}

#[async_trait]
impl ResponseService for ScriptedResponseService {
    async fn stream_reply(&self, request: ResponseRequest) -> ChatResult<FragmentStream> {
        self.captured.write().push(request);

        let reply = self.replies.write().pop_front();
        match reply {
            Some(ScriptedReply::Stream { fragments, end }) => {
                let mut items: Vec<ChatResult<String>> = fragments.into_iter().map(Ok).collect();
                if let ScriptEnd::Fault(reason) = end {
                    items.push(Err(ChatError::Transport(reason)));
                }
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(ScriptedReply::Refuse(reason)) => Err(ChatError::Transport(reason)),
            None => Err(ChatError::Transport("no scripted reply left".to_string())),
        }
    }
}
