//! Lifecycle signals and the single-consumer event queue
//!
//! Recognizer and synthesizer backends never call into the assistant
//! directly. They post an [`Event`] and the assistant handles events one at
//! a time, in delivery order.

use tokio::sync::mpsc;
use url::Url;

/// Identifies one spoken utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

/// Lifecycle signal delivered to the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Finalized speech recognition result
    Transcript(String),
    /// Recognizer began listening
    RecognizerStarted,
    /// Recognizer stopped, either on request or unexpectedly
    RecognizerEnded,
    /// Recognizer reported a non-fatal error
    RecognizerError(String),
    /// Synthesizer began audible output
    SpeechStarted(UtteranceId),
    /// Synthesizer finished an utterance naturally
    SpeechEnded(UtteranceId),
    /// Transcript source is exhausted
    InputClosed,
    /// Image generation for this locator finished
    ImageReady(Url),
    /// Image generation for this locator failed
    ImageFailed(Url),
}

/// Cloneable handle used by backends to post events
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Post an event; dropped silently once the queue is gone
    pub fn emit(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event = ?e.0, "event queue closed, dropping event");
        }
    }
}

/// Receiving end of the event queue
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventQueue {
    /// Wait for the next event; `None` once every sender is dropped
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an event if one is already queued
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected sender/queue pair
#[must_use]
pub fn channel() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventQueue { rx })
}
