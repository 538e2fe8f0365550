//! Error types for the chat system.

use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat system errors
#[derive(Error, Debug)]
pub enum ChatError {
    /// No agent with the given id or name exists in the roster
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// The agent exists but is not accepting chats
    #[error("Agent {name} is {status} and cannot chat right now")]
    AgentUnavailable { name: String, status: String },

    /// No API key for the response service
    #[error("Response service not configured. Set GEMINI_API_KEY or API_KEY")]
    NotConfigured,

    /// Request to the response service failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response service answered with something we could not read
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Transcript storage failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
