//! Single-flight speech output
//!
//! At most one utterance is audible at a time. A request made while another
//! utterance is playing is rejected, never queued.

use crate::events::UtteranceId;

use super::synth::{Synthesizer, VoiceHint, select_voice};

/// State of the speech output guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    /// Nothing is being spoken
    Idle,
    /// An utterance is in flight
    Speaking,
}

/// Result of a [`SpeechOutputGuard::speak`] request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Output started
    Started(UtteranceId),
    /// Empty text, nothing to do
    Empty,
    /// Another utterance is still playing
    Busy,
    /// Synthesizer refused to start
    Failed,
}

/// Serializes access to the synthesizer
pub struct SpeechOutputGuard {
    synth: Box<dyn Synthesizer>,
    hint: VoiceHint,
    current: Option<UtteranceId>,
    next_id: u64,
}

impl SpeechOutputGuard {
    pub fn new(synth: Box<dyn Synthesizer>, hint: VoiceHint) -> Self {
        Self {
            synth,
            hint,
            current: None,
            next_id: 1,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SpeechState {
        if self.current.is_some() {
            SpeechState::Speaking
        } else {
            SpeechState::Idle
        }
    }

    /// Utterance currently in flight
    #[must_use]
    pub const fn current(&self) -> Option<UtteranceId> {
        self.current
    }

    /// Speak `text` unless something else is already being spoken
    pub fn speak(&mut self, text: &str) -> SpeakOutcome {
        if text.is_empty() {
            return SpeakOutcome::Empty;
        }

        if let Some(active) = self.current {
            tracing::warn!(active = active.0, text, "speech output already active");
            return SpeakOutcome::Busy;
        }

        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        let voices = self.synth.voices();
        let voice = select_voice(&voices, &self.hint);
        if voice.is_none() {
            tracing::warn!(
                preferred = %self.hint.preferred_name,
                locale = %self.hint.locale,
                "preferred voice not found, using default"
            );
        }

        match self.synth.speak(id, text, voice) {
            Ok(()) => {
                tracing::debug!(utterance = id.0, text, "speaking");
                self.current = Some(id);
                SpeakOutcome::Started(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech output failed to start");
                SpeakOutcome::Failed
            }
        }
    }

    /// Synthesizer reported audible output for `id`
    pub fn started(&self, id: UtteranceId) {
        if self.current == Some(id) {
            tracing::debug!(utterance = id.0, "speech started");
        }
    }

    /// Natural completion of `id`; stale ids are ignored
    ///
    /// Returns true if the guard moved back to idle.
    pub fn finish(&mut self, id: UtteranceId) -> bool {
        if self.current == Some(id) {
            self.current = None;
            tracing::debug!(utterance = id.0, "speech finished");
            true
        } else {
            tracing::trace!(utterance = id.0, "ignoring stale speech completion");
            false
        }
    }

    /// Cancel whatever is being spoken and return to idle
    pub fn stop(&mut self) {
        self.synth.cancel();
        if let Some(id) = self.current.take() {
            tracing::debug!(utterance = id.0, "speech cancelled");
        }
    }
}
