//! Assistant - the single consumer of the event queue
//!
//! Owns the session and every collaborator. Each event is routed to a named
//! handler and runs to completion before the next one is taken. Image
//! generation is the one slow step kept off this path; its result comes back
//! as an event.

use std::fmt;
use std::io::Write;
use std::ops::ControlFlow;
use std::time::Duration;

use url::Url;

use crate::commands::{self, LocalAction};
use crate::conversation::{ConversationTurnHandler, TEXT_APOLOGY};
use crate::events::{Event, EventQueue, UtteranceId};
use crate::images::ImageActionDispatcher;
use crate::session::{ImageModel, MuteTransition, SessionState};
use crate::voice::{Recognizer, SpeechOutputGuard, SpeechState};
use crate::Result;

/// Pause before restarting a recognizer that ended after an error
const RESTART_DELAY: Duration = Duration::from_millis(250);

/// Voice assistant session
pub struct Assistant {
    session: SessionState,
    speech: SpeechOutputGuard,
    turns: ConversationTurnHandler,
    image_actions: ImageActionDispatcher,
    recognizer: Box<dyn Recognizer>,
    displayed_image: Option<Url>,
    pending_image: Option<Url>,
    recognizer_failed: bool,
    input_closed: bool,
    display: Box<dyn Write + Send>,
}

impl Assistant {
    pub fn new(
        session: SessionState,
        speech: SpeechOutputGuard,
        turns: ConversationTurnHandler,
        image_actions: ImageActionDispatcher,
        recognizer: Box<dyn Recognizer>,
    ) -> Self {
        Self {
            session,
            speech,
            turns,
            image_actions,
            recognizer,
            displayed_image: None,
            pending_image: None,
            recognizer_failed: false,
            input_closed: false,
            display: Box::new(std::io::stdout()),
        }
    }

    /// Write the conversation transcript somewhere other than stdout
    #[must_use]
    pub fn with_display(mut self, display: Box<dyn Write + Send>) -> Self {
        self.display = display;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub const fn speech(&self) -> &SpeechOutputGuard {
        &self.speech
    }

    /// Locator of the image currently on display
    #[must_use]
    pub const fn displayed_image(&self) -> Option<&Url> {
        self.displayed_image.as_ref()
    }

    /// Whether the latest turn's image is still being generated
    #[must_use]
    pub const fn image_pending(&self) -> bool {
        self.pending_image.is_some()
    }

    /// Start listening and process events until shutdown
    ///
    /// Stops on Ctrl-C, or once input has closed and both speech and the
    /// last image have finished.
    ///
    /// # Errors
    ///
    /// Returns `RecognitionUnsupported` if the recognizer cannot start
    pub async fn run(mut self, mut queue: EventQueue) -> Result<()> {
        self.recognizer.start()?;
        tracing::info!(
            image_model = %self.session.image_model(),
            "assistant ready"
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = queue.next() => {
                    let Some(event) = event else {
                        tracing::debug!("event queue closed");
                        break;
                    };
                    tokio::select! {
                        _ = &mut shutdown => {
                            tracing::info!("shutdown requested");
                            break;
                        }
                        flow = self.dispatch(event) => {
                            if flow.is_break() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Route one event to its handler
    pub async fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        tracing::trace!(?event, "dispatching");

        match event {
            Event::Transcript(text) => self.on_transcript(&text).await,
            Event::RecognizerStarted => self.on_recognizer_started(),
            Event::RecognizerEnded => self.on_recognizer_ended().await,
            Event::RecognizerError(message) => self.on_recognizer_error(&message),
            Event::SpeechStarted(id) => self.on_speech_started(id),
            Event::SpeechEnded(id) => self.on_speech_ended(id),
            Event::InputClosed => {
                tracing::info!("input closed");
                self.input_closed = true;
            }
            Event::ImageReady(locator) => self.on_image_ready(locator),
            Event::ImageFailed(locator) => self.on_image_failed(&locator),
        }

        if self.input_closed
            && self.speech.state() == SpeechState::Idle
            && self.pending_image.is_none()
        {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Classify a transcript and run the local action or a conversational turn
    pub async fn on_transcript(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        self.show(format_args!("you: {transcript}"));

        match commands::classify(transcript) {
            Some(action) => self.perform(action).await,
            None => {
                let outcome = self
                    .turns
                    .handle(&mut self.session, &mut self.speech, transcript)
                    .await;

                let reply = outcome.reply.as_deref().unwrap_or(TEXT_APOLOGY);
                self.show(format_args!("assistant: {reply}"));

                // A newer request supersedes any generation still in flight
                if outcome.image_request.is_some() {
                    self.pending_image = outcome.image_request;
                }
            }
        }
    }

    /// Display a finished image if it belongs to the latest turn
    pub fn on_image_ready(&mut self, locator: Url) {
        if self.pending_image.as_ref() != Some(&locator) {
            tracing::debug!(url = %locator, "ignoring superseded image");
            return;
        }
        self.pending_image = None;
        self.show(format_args!("image: {locator}"));
        self.displayed_image = Some(locator);
    }

    /// Keep the previous image when generation fails
    pub fn on_image_failed(&mut self, locator: &Url) {
        if self.pending_image.as_ref() == Some(locator) {
            self.pending_image = None;
        }
    }

    fn show(&mut self, line: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.display, "{line}") {
            tracing::debug!(error = %e, "display write failed");
        }
    }

    /// Execute a local action, then speak its acknowledgment
    pub async fn perform(&mut self, action: LocalAction) {
        tracing::info!(%action, "local command");

        match action {
            LocalAction::Mute => self.apply_mute(true),
            LocalAction::Unmute => self.apply_mute(false),
            LocalAction::StopSpeaking => self.speech.stop(),
            LocalAction::CopyImage => {
                self.image_actions
                    .copy_to_clipboard(self.displayed_image.as_ref(), &mut self.speech)
                    .await;
            }
            LocalAction::SaveImage => {
                self.image_actions
                    .save_to_disk(self.displayed_image.as_ref(), None, &mut self.speech)
                    .await;
            }
            LocalAction::OpenImage => {
                self.image_actions
                    .open_in_viewer(self.displayed_image.as_ref(), &mut self.speech);
            }
            LocalAction::SetModelFlux => self.session.set_image_model(ImageModel::Flux),
            LocalAction::SetModelTurbo => self.session.set_image_model(ImageModel::Turbo),
            LocalAction::SetModelKontext => self.session.set_image_model(ImageModel::Kontext),
            LocalAction::ClearHistory => self.session.clear_history(),
        }

        if let Some(text) = action.acknowledgment() {
            self.show(format_args!("assistant: {text}"));
            self.speech.speak(text);
        }
    }

    fn apply_mute(&mut self, muted: bool) {
        match self.session.set_muted(muted) {
            MuteTransition::Muted => self.recognizer.stop(),
            MuteTransition::Unmuted => {
                if let Err(e) = self.recognizer.start() {
                    tracing::warn!(error = %e, "failed to resume listening");
                }
            }
            MuteTransition::Unchanged => {}
        }
    }

    pub fn on_recognizer_started(&mut self) {
        self.recognizer_failed = false;
        tracing::info!("listening");
    }

    /// Restart listening unless the session is muted
    pub async fn on_recognizer_ended(&mut self) {
        if self.session.is_muted() {
            tracing::debug!("recognizer ended while muted");
            return;
        }
        if self.input_closed {
            return;
        }

        if self.recognizer_failed {
            tokio::time::sleep(RESTART_DELAY).await;
        }

        tracing::debug!("restarting recognizer");
        if let Err(e) = self.recognizer.start() {
            tracing::warn!(error = %e, "failed to restart recognizer");
        }
    }

    pub fn on_recognizer_error(&mut self, message: &str) {
        self.recognizer_failed = true;
        tracing::warn!(error = message, "recognizer error");
    }

    pub fn on_speech_started(&mut self, id: UtteranceId) {
        self.speech.started(id);
    }

    pub fn on_speech_ended(&mut self, id: UtteranceId) {
        self.speech.finish(id);
    }

    fn shutdown(&mut self) {
        self.recognizer.stop();
        self.speech.stop();
        tracing::info!(turns = self.session.history_len(), "assistant stopped");
    }
}
