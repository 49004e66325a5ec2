//! Conversation session state
//!
//! One `SessionState` lives for the whole process. It holds the mute flag,
//! the active image model, the rolling chat history and the system prompt.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::{Error, Result};

/// Maximum number of turns kept in history (system prompt excluded)
pub const HISTORY_LIMIT: usize = 12;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions prepended to every request
    System,
    /// The person talking to the assistant
    User,
    /// The remote model
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// A turn spoken by the user
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A reply from the assistant
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Message in a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Image generation model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImageModel {
    #[default]
    Flux,
    Turbo,
    Kontext,
}

impl ImageModel {
    /// All supported models
    pub const ALL: [Self; 3] = [Self::Flux, Self::Turbo, Self::Kontext];

    /// Model id sent to the image endpoint
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Flux => "flux",
            Self::Turbo => "turbo",
            Self::Kontext => "kontext",
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ImageModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|model| model.id() == normalized)
            .ok_or_else(|| Error::UnknownImageModel(s.to_string()))
    }
}

/// Change produced by [`SessionState::set_muted`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteTransition {
    /// false -> true: listening must be suspended
    Muted,
    /// true -> false: listening must resume
    Unmuted,
    /// Flag already had the requested value
    Unchanged,
}

/// Per-process conversation state
#[derive(Debug, Clone)]
pub struct SessionState {
    muted: bool,
    image_model: ImageModel,
    history: VecDeque<Turn>,
    system_prompt: String,
}

impl SessionState {
    /// Create a session around an already-loaded system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            muted: false,
            image_model: ImageModel::default(),
            history: VecDeque::with_capacity(HISTORY_LIMIT + 1),
            system_prompt: system_prompt.into(),
        }
    }

    /// Start with a specific image model selected
    #[must_use]
    pub const fn with_image_model(mut self, model: ImageModel) -> Self {
        self.image_model = model;
        self
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Set the mute flag, reporting which way it moved
    ///
    /// The caller owns the recognizer and applies the returned transition to it.
    pub fn set_muted(&mut self, muted: bool) -> MuteTransition {
        let transition = match (self.muted, muted) {
            (false, true) => MuteTransition::Muted,
            (true, false) => MuteTransition::Unmuted,
            _ => MuteTransition::Unchanged,
        };
        self.muted = muted;
        transition
    }

    #[must_use]
    pub const fn image_model(&self) -> ImageModel {
        self.image_model
    }

    pub fn set_image_model(&mut self, model: ImageModel) {
        tracing::debug!(model = %model, "image model selected");
        self.image_model = model;
    }

    /// Select an image model by id
    ///
    /// # Errors
    ///
    /// Returns `UnknownImageModel` if the id is not one of the supported models
    pub fn set_image_model_id(&mut self, id: &str) -> Result<()> {
        let model = id.parse()?;
        self.set_image_model(model);
        Ok(())
    }

    /// Append a turn, then drop from the front until the history bound holds
    pub fn append_turn(&mut self, turn: Turn) {
        self.history.push_back(turn);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Forget all turns; the system prompt is kept
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Turns in conversational order
    pub fn history(&self) -> impl ExactSizeIterator<Item = &Turn> {
        self.history.iter()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Request payload: the system prompt followed by the bounded history
    #[must_use]
    pub fn request_messages(&self) -> Vec<ChatMessage<'_>> {
        std::iter::once(ChatMessage {
            role: Role::System,
            content: &self.system_prompt,
        })
        .chain(self.history.iter().map(|turn| ChatMessage {
            role: turn.role,
            content: &turn.content,
        }))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let session = SessionState::new("be nice");
        assert!(!session.is_muted());
        assert_eq!(session.image_model(), ImageModel::Flux);
        assert_eq!(session.history_len(), 0);
        assert_eq!(session.system_prompt(), "be nice");
    }

    #[test]
    fn test_history_keeps_most_recent_in_order() {
        let mut session = SessionState::new("prompt");
        for i in 0..30 {
            session.append_turn(Turn::user(format!("turn {i}")));
            assert!(session.history_len() <= HISTORY_LIMIT);
        }

        let kept: Vec<&str> = session.history().map(|t| t.content.as_str()).collect();
        let expected: Vec<String> = (18..30).map(|i| format!("turn {i}")).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_clear_history_is_idempotent() {
        let mut session = SessionState::new("prompt");
        session.append_turn(Turn::user("hello"));
        session.clear_history();
        assert_eq!(session.history_len(), 0);
        session.clear_history();
        assert_eq!(session.history_len(), 0);
        assert_eq!(session.system_prompt(), "prompt");
    }

    #[test]
    fn test_mute_transitions() {
        let mut session = SessionState::new("prompt");
        assert_eq!(session.set_muted(false), MuteTransition::Unchanged);
        assert_eq!(session.set_muted(true), MuteTransition::Muted);
        assert_eq!(session.set_muted(true), MuteTransition::Unchanged);
        assert_eq!(session.set_muted(false), MuteTransition::Unmuted);
    }

    #[test]
    fn test_image_model_ids() {
        assert_eq!("turbo".parse::<ImageModel>().unwrap(), ImageModel::Turbo);
        assert_eq!(" Kontext ".parse::<ImageModel>().unwrap(), ImageModel::Kontext);
        assert!(matches!(
            "dalle".parse::<ImageModel>(),
            Err(Error::UnknownImageModel(_))
        ));

        let mut session = SessionState::new("prompt");
        assert!(session.set_image_model_id("sdxl").is_err());
        assert_eq!(session.image_model(), ImageModel::Flux);
        session.set_image_model_id("kontext").unwrap();
        assert_eq!(session.image_model(), ImageModel::Kontext);
    }

    #[test]
    fn test_request_messages_prepend_system_prompt() {
        let mut session = SessionState::new("You are Unity");
        session.append_turn(Turn::user("hi"));
        session.append_turn(Turn::assistant("hello"));

        let messages = session.request_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are Unity");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].content, "hello");

        let json = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
