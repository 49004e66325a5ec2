//! Voice Chat - a voice-driven client for a remote conversational model
//!
//! This library provides the core of the client:
//! - Local command classification (mute, model selection, history, images)
//! - Bounded conversation history and turn handling
//! - Single-flight speech output
//! - Image generation and copy/save/open actions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Backends                          │
//! │   Recognizer (stdin / mic)  │  Synthesizer (say/…)  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ events
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Assistant                          │
//! │  Classifier │ Session │ Speech guard │ Image actions │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Remote endpoints                        │
//! │        Chat completion  │  Image generation          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod images;
pub mod prompt;
pub mod remote;
pub mod session;
pub mod voice;

pub use assistant::Assistant;
pub use commands::{LocalAction, classify};
pub use config::Config;
pub use conversation::{ConversationTurnHandler, TurnOutcome};
pub use error::{Error, Result};
pub use events::{Event, EventQueue, EventSender, UtteranceId};
pub use images::{Desktop, ImageActionDispatcher, ImageActionOutcome, SystemDesktop};
pub use session::{HISTORY_LIMIT, ImageModel, Role, SessionState, Turn};
