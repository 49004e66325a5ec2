//! Conversational turns forwarded to the remote model
//!
//! A turn has two phases that fail independently. The text phase updates
//! history and speaks the reply on the current task. The image phase runs on
//! its own task and reports back with `ImageReady` / `ImageFailed`, so a
//! slow generation never holds up the event queue.

use std::sync::Arc;

use url::Url;

use crate::events::{Event, EventSender};
use crate::remote::{ChatCompletion, ImageOptions, ImageRequest, ImageSource, random_seed};
use crate::session::{ImageModel, SessionState, Turn};
use crate::voice::SpeechOutputGuard;

/// Spoken when the text phase fails
pub const TEXT_APOLOGY: &str = "Sorry, I couldn't get a text response.";

/// What a turn produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Assistant reply, if the text phase succeeded
    pub reply: Option<String>,
    /// Locator whose generation is now in flight
    pub image_request: Option<Url>,
}

/// Runs conversational turns against the remote endpoints
pub struct ConversationTurnHandler {
    chat: Arc<dyn ChatCompletion>,
    images: Arc<dyn ImageSource>,
    options: ImageOptions,
    events: EventSender,
}

impl ConversationTurnHandler {
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        images: Arc<dyn ImageSource>,
        options: ImageOptions,
        events: EventSender,
    ) -> Self {
        Self {
            chat,
            images,
            options,
            events,
        }
    }

    /// Handle a transcript that is not a local command
    ///
    /// Returns once the reply has been handed to speech output; the image
    /// result arrives later as an event.
    pub async fn handle(
        &self,
        session: &mut SessionState,
        speech: &mut SpeechOutputGuard,
        transcript: &str,
    ) -> TurnOutcome {
        tracing::info!(transcript, "sending to assistant");

        let image_request = self.request_image(transcript, session.image_model(), random_seed());
        let reply = self.text_phase(session, speech, transcript).await;

        TurnOutcome {
            reply,
            image_request,
        }
    }

    async fn text_phase(
        &self,
        session: &mut SessionState,
        speech: &mut SpeechOutputGuard,
        transcript: &str,
    ) -> Option<String> {
        session.append_turn(Turn::user(transcript));

        let result = {
            let messages = session.request_messages();
            self.chat.complete(&messages).await
        };

        match result {
            Ok(reply) => {
                tracing::debug!(reply_len = reply.len(), "assistant replied");
                session.append_turn(Turn::assistant(reply.clone()));
                speech.speak(&reply);
                Some(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat completion failed");
                speech.speak(TEXT_APOLOGY);
                None
            }
        }
    }

    fn request_image(&self, prompt: &str, model: ImageModel, seed: u32) -> Option<Url> {
        let request = ImageRequest {
            prompt,
            seed,
            model,
            options: &self.options,
        };

        let locator = match request.locator() {
            Ok(locator) => locator,
            Err(e) => {
                tracing::warn!(error = %e, "image request not built");
                return None;
            }
        };

        let images = Arc::clone(&self.images);
        let events = self.events.clone();
        let pending = locator.clone();
        tokio::spawn(async move {
            match images.fetch(&pending).await {
                Ok(bytes) => {
                    tracing::debug!(url = %pending, bytes = bytes.len(), %model, seed, "image generated");
                    events.emit(Event::ImageReady(pending));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "image generation failed, keeping previous image");
                    events.emit(Event::ImageFailed(pending));
                }
            }
        });

        Some(locator)
    }
}
