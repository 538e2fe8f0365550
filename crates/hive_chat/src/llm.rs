//! Response service adapter.
//!
//! The chat core only sees [`ResponseService`]: persona, prior history and
//! the new message go in, a stream of text fragments comes out. The
//! [`GeminiAdapter`] implements it against the Gemini `streamGenerateContent`
//! endpoint using server-sent events.

use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agents;
use crate::error::{ChatError, ChatResult};
use crate::settings::HiveSettings;
use crate::types::{Message, MessageRole, Persona};

/// Single-pass stream of reply fragments
pub type FragmentStream = Pin<Box<dyn Stream<Item = ChatResult<String>> + Send>>;

/// One earlier turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub text: String,
}

/// Everything the response service needs to produce a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRequest {
    pub persona: Persona,
    pub history: Vec<HistoryTurn>,
    pub message: String,
}

impl ResponseRequest {
    /// Build a request from the messages that preceded `message`
    pub fn new(persona: Persona, prior: &[Message], message: impl Into<String>) -> Self {
        Self {
            persona,
            history: prior
                .iter()
                .map(|m| HistoryTurn {
                    role: m.role,
                    text: m.content.clone(),
                })
                .collect(),
            message: message.into(),
        }
    }
}

/// External service producing streamed agent replies
#[async_trait]
pub trait ResponseService: Send + Sync {
    /// Start a reply. Errors before the first fragment are returned here;
    /// errors after that arrive as items of the stream.
    async fn stream_reply(&self, request: ResponseRequest) -> ChatResult<FragmentStream>;
}

/// Gemini streaming adapter
pub struct GeminiAdapter {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    /// Create a new adapter with explicit configuration
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the adapter at a different host (proxies, local fakes)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create an adapter from resolved settings
    pub fn from_settings(settings: &HiveSettings) -> ChatResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(ChatError::NotConfigured)?;

        let adapter = Self::new(api_key, settings.model.clone());
        Ok(match &settings.api_base_url {
            Some(url) => adapter.with_base_url(url.clone()),
            None => adapter,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn build_body(request: &ResponseRequest) -> GenerateContentRequest {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: turn.role.wire_name().to_string(),
                parts: vec![GeminiPart {
                    text: Some(turn.text.clone()),
                }],
            })
            .collect();

        contents.push(GeminiContent {
            role: MessageRole::User.wire_name().to_string(),
            parts: vec![GeminiPart {
                text: Some(request.message.clone()),
            }],
        });

        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![GeminiPart {
                    text: Some(agents::system_instruction(&request.persona)),
                }],
            },
            contents,
        }
    }
}

#[async_trait]
impl ResponseService for GeminiAdapter {
    async fn stream_reply(&self, request: ResponseRequest) -> ChatResult<FragmentStream> {
        let body = Self::build_body(&request);
        debug!(model = %self.model, turns = body.contents.len(), "Requesting streamed reply");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let fragments = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => parse_chunk(&event.data).transpose(),
                    Err(e) => {
                        warn!("SSE stream error: {}", e);
                        Some(Err(ChatError::Transport(format!("SSE stream error: {}", e))))
                    }
                }
            });

        Ok(Box::pin(fragments))
    }
}

/// Stand-in used when no API key is configured; every request fails.
pub struct UnconfiguredService;

#[async_trait]
impl ResponseService for UnconfiguredService {
    async fn stream_reply(&self, _request: ResponseRequest) -> ChatResult<FragmentStream> {
        Err(ChatError::NotConfigured)
    }
}

/// Extract the text carried by one SSE `data:` payload.
///
/// Chunks without text (metadata, finish markers) yield `None`.
pub fn parse_chunk(data: &str) -> ChatResult<Option<String>> {
    let chunk: GenerateContentChunk = serde_json::from_str(data)
        .map_err(|e| ChatError::MalformedResponse(format!("{}: {}", e, data)))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::Transport(error.message));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

// Gemini API types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
