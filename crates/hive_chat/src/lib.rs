//! # hive_chat - Agent Chat Core for SYNTH_HIVE
//!
//! This crate provides the chat system behind the SYNTH_HIVE agent roster:
//! - Per-agent conversations seeded with a persona greeting
//! - Streamed agent replies folded into a single growing message
//! - Transcript persistence that survives restarts
//! - Fault handling that keeps the session usable when the service fails
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │   ChatManager   │────▶│   ChatSession   │────▶│ ResponseService  │
//! └─────────────────┘     └────────┬────────┘     └────────┬─────────┘
//!                                  │                       │ fragments
//!                                  ▼                       ▼
//!                        ┌─────────────────┐     ┌──────────────────┐
//!                        │  Conversation   │◀────│ Stream integrator│
//!                        └────────┬────────┘     └──────────────────┘
//!                                 ▼
//!                        ┌─────────────────┐
//!                        │ TranscriptStore │
//!                        └─────────────────┘
//! ```

pub mod types;
pub mod agents;
pub mod conversation;
pub mod persistence;
pub mod llm;
pub mod stream;
pub mod session;
pub mod settings;
pub mod mock;
pub mod error;

pub use types::*;
pub use agents::*;
pub use conversation::*;
pub use persistence::*;
pub use llm::*;
pub use stream::*;
pub use session::*;
pub use settings::*;
pub use mock::*;
pub use error::*;
