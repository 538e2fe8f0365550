//! Transcript persistence layer.
//!
//! Each agent's conversation is stored as one JSON document under the key
//! `synth_hive_chat_<agentId>`, with every byte of the id outside
//! `[a-z0-9_]` written as `~XX`. The file store keeps documents in
//! `<data dir>/transcripts/`:
//!
//! ```text
//! <data dir>/transcripts/
//! ├── synth_hive_chat_1.json
//! ├── synth_hive_chat_2.json
//! └── ...
//! ```
//!
//! Document layout:
//!
//! ```json
//! { "version": 1, "agentId": "1", "messages": [ { "id", "role", "content", "timestamp" } ] }
//! ```
//!
//! A bare message array (the untagged layout written by earlier builds) is
//! still readable. Records that do not validate are skipped, and a record
//! reusing an earlier id is given a fresh one.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ChatResult;
use crate::types::Message;

/// Current on-disk transcript layout
pub const TRANSCRIPT_VERSION: u32 = 1;

const KEY_PREFIX: &str = "synth_hive_chat_";

/// Storage key for an agent's transcript.
///
/// Distinct ids always map to distinct keys. Upper-case letters are escaped
/// too, so keys stay distinct on case-insensitive file systems.
pub fn transcript_key(agent_id: &str) -> String {
    let mut key = String::with_capacity(KEY_PREFIX.len() + agent_id.len());
    key.push_str(KEY_PREFIX);
    for byte in agent_id.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'_' => key.push(char::from(byte)),
            _ => key.push_str(&format!("~{:02X}", byte)),
        }
    }
    key
}

/// Key-value persistence for per-agent transcripts
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptStore: Send + Sync {
    /// Load an agent's transcript. `Ok(None)` when nothing usable is stored.
    fn load(&self, agent_id: &str) -> ChatResult<Option<Vec<Message>>>;

    /// Replace an agent's transcript with `messages`
    fn save(&self, agent_id: &str, messages: &[Message]) -> ChatResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptDocument<'a> {
    version: u32,
    agent_id: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTranscript {
    version: u32,
    agent_id: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
}

/// Serialize a transcript into its storage document
pub fn encode_transcript(agent_id: &str, messages: &[Message]) -> ChatResult<String> {
    let document = TranscriptDocument {
        version: TRANSCRIPT_VERSION,
        agent_id,
        messages,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse `agent_id`'s storage document, dropping records that do not validate.
///
/// A document written for a different agent reads as absent.
pub fn decode_transcript(agent_id: &str, raw: &str) -> ChatResult<Option<Vec<Message>>> {
    let records = match serde_json::from_str::<Value>(raw)? {
        Value::Array(records) => records,
        value => {
            let stored: StoredTranscript = serde_json::from_value(value)?;
            if stored.version != TRANSCRIPT_VERSION {
                warn!(version = stored.version, "Unsupported transcript version, ignoring");
                return Ok(None);
            }
            if let Some(owner) = stored.agent_id.as_deref().filter(|owner| *owner != agent_id) {
                warn!(agent = %agent_id, owner = %owner, "Transcript belongs to another agent, ignoring");
                return Ok(None);
            }
            stored.messages
        }
    };

    let mut seen = HashSet::new();
    let mut messages = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value::<Message>(record) {
            Ok(mut message) => {
                if !seen.insert(message.id.clone()) {
                    let fresh = uuid::Uuid::new_v4().to_string();
                    debug!(id = %message.id, fresh = %fresh, "Renaming duplicate transcript record");
                    message.id = fresh.clone();
                    seen.insert(fresh);
                }
                messages.push(message);
            }
            Err(e) => warn!("Skipping malformed transcript record: {}", e),
        }
    }

    if messages.is_empty() {
        return Ok(None);
    }
    Ok(Some(messages))
}

/// Transcript store backed by JSON files
#[derive(Clone)]
pub struct FileTranscriptStore {
    /// Root data directory
    data_dir: PathBuf,
}

impl FileTranscriptStore {
    /// Create a store rooted at `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn transcripts_dir(&self) -> PathBuf {
        self.data_dir.join("transcripts")
    }

    /// Path of an agent's transcript document
    pub fn transcript_path(&self, agent_id: &str) -> PathBuf {
        self.transcripts_dir()
            .join(format!("{}.json", transcript_key(agent_id)))
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn load(&self, agent_id: &str) -> ChatResult<Option<Vec<Message>>> {
        let path = self.transcript_path(agent_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Loaded transcript");
        decode_transcript(agent_id, &raw)
    }

    fn save(&self, agent_id: &str, messages: &[Message]) -> ChatResult<()> {
        let dir = self.transcripts_dir();
        fs::create_dir_all(&dir)?;

        let content = encode_transcript(agent_id, messages)?;

        // Write next to the target and rename so readers never see half a file
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(content.as_bytes())?;
        file.persist(self.transcript_path(agent_id))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

/// In-process transcript store
#[derive(Default)]
pub struct MemoryTranscriptStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored document for an agent
    pub fn raw(&self, agent_id: &str) -> Option<String> {
        self.entries.read().get(&transcript_key(agent_id)).cloned()
    }

    /// Store a raw document, bypassing validation
    pub fn insert_raw(&self, agent_id: &str, raw: impl Into<String>) {
        self.entries.write().insert(transcript_key(agent_id), raw.into());
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn load(&self, agent_id: &str) -> ChatResult<Option<Vec<Message>>> {
        match self.raw(agent_id) {
            Some(raw) => decode_transcript(agent_id, &raw),
            None => Ok(None),
        }
    }

    fn save(&self, agent_id: &str, messages: &[Message]) -> ChatResult<()> {
        let content = encode_transcript(agent_id, messages)?;
        self.insert_raw(agent_id, content);
        Ok(())
    }
}
