//! Local voice command classification
//!
//! Transcripts are lower-cased and tested against an ordered rule table.
//! The first rule with any matching phrase wins, so overlapping phrases
//! resolve by declaration order. "unmute my mic" contains "mute my mic"
//! and therefore resolves to [`LocalAction::Mute`].

use std::fmt;

/// Action handled entirely on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalAction {
    Mute,
    Unmute,
    StopSpeaking,
    CopyImage,
    SaveImage,
    OpenImage,
    SetModelFlux,
    SetModelTurbo,
    SetModelKontext,
    ClearHistory,
}

impl LocalAction {
    /// Fixed spoken confirmation, for actions that have one
    ///
    /// Image actions report their own outcome and `StopSpeaking` stays silent.
    #[must_use]
    pub const fn acknowledgment(self) -> Option<&'static str> {
        match self {
            Self::Mute => Some("Microphone muted."),
            Self::Unmute => Some("Microphone unmuted."),
            Self::SetModelFlux => Some("Image model set to flux."),
            Self::SetModelTurbo => Some("Image model set to turbo."),
            Self::SetModelKontext => Some("Image model set to kontext."),
            Self::ClearHistory => Some("Chat history cleared."),
            Self::StopSpeaking | Self::CopyImage | Self::SaveImage | Self::OpenImage => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::StopSpeaking => "stop-speaking",
            Self::CopyImage => "copy-image",
            Self::SaveImage => "save-image",
            Self::OpenImage => "open-image",
            Self::SetModelFlux => "set-model-flux",
            Self::SetModelTurbo => "set-model-turbo",
            Self::SetModelKontext => "set-model-kontext",
            Self::ClearHistory => "clear-history",
        }
    }
}

impl fmt::Display for LocalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trigger phrases for one action
#[derive(Debug)]
pub struct CommandRule {
    pub action: LocalAction,
    pub phrases: &'static [&'static str],
}

impl CommandRule {
    fn matches(&self, normalized: &str) -> bool {
        self.phrases.iter().any(|phrase| normalized.contains(phrase))
    }
}

/// Rules in priority order
pub const RULES: &[CommandRule] = &[
    CommandRule {
        action: LocalAction::Mute,
        phrases: &["mute my mic", "mute microphone"],
    },
    CommandRule {
        action: LocalAction::Unmute,
        phrases: &["unmute my mic", "unmute microphone"],
    },
    CommandRule {
        action: LocalAction::StopSpeaking,
        phrases: &["shut up", "be quiet"],
    },
    CommandRule {
        action: LocalAction::CopyImage,
        phrases: &["copy image", "copy this image"],
    },
    CommandRule {
        action: LocalAction::SaveImage,
        phrases: &["save image", "download image"],
    },
    CommandRule {
        action: LocalAction::OpenImage,
        phrases: &["open image", "open this image"],
    },
    CommandRule {
        action: LocalAction::SetModelFlux,
        phrases: &["use flux model", "switch to flux"],
    },
    CommandRule {
        action: LocalAction::SetModelTurbo,
        phrases: &["use turbo model", "switch to turbo"],
    },
    CommandRule {
        action: LocalAction::SetModelKontext,
        phrases: &["use kontext model", "switch to kontext"],
    },
    CommandRule {
        action: LocalAction::ClearHistory,
        phrases: &["clear history", "delete history", "clear chat"],
    },
];

/// Resolve a transcript to a local action
///
/// Returns `None` when the transcript should go to the remote model.
#[must_use]
pub fn classify(transcript: &str) -> Option<LocalAction> {
    let normalized = transcript.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&normalized))
        .map(|rule| rule.action)
}
