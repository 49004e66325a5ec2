//! Transcript sources

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::Result;
use crate::events::{Event, EventSender};

/// Produces finalized transcripts as events
///
/// Implementations post `RecognizerStarted` when listening begins,
/// `Transcript` for each result and `RecognizerEnded` when listening stops
/// for any reason.
pub trait Recognizer: Send {
    /// Begin (or resume) listening
    ///
    /// # Errors
    ///
    /// Returns `RecognitionUnsupported` if the backend cannot listen at all
    fn start(&mut self) -> Result<()>;

    /// Stop listening
    fn stop(&mut self);

    /// Whether results are currently being delivered
    fn is_active(&self) -> bool;
}

type LineSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Reads one transcript per line, typically from stdin
///
/// A single reader task runs for the life of the recognizer. Lines read
/// while stopped are discarded, as a muted microphone would not hear them.
pub struct StdinRecognizer {
    events: EventSender,
    active: Arc<AtomicBool>,
    source: Option<LineSource>,
    reader: Option<JoinHandle<()>>,
}

impl StdinRecognizer {
    /// Read transcripts from standard input
    #[must_use]
    pub fn stdin(events: EventSender) -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), events)
    }

    /// Read transcripts from any buffered async reader
    pub fn from_reader<R>(reader: R, events: EventSender) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            events,
            active: Arc::new(AtomicBool::new(false)),
            source: Some(Box::new(reader)),
            reader: None,
        }
    }

    fn spawn_reader(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };
        let events = self.events.clone();
        let active = Arc::clone(&self.active);

        self.reader = Some(tokio::spawn(async move {
            let mut lines = source.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let transcript = line.trim();
                        if transcript.is_empty() {
                            continue;
                        }
                        if active.load(Ordering::SeqCst) {
                            events.emit(Event::Transcript(transcript.to_string()));
                        } else {
                            tracing::debug!(transcript, "recognizer stopped, discarding input");
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("transcript input closed");
                        break;
                    }
                    Err(e) => {
                        events.emit(Event::RecognizerError(e.to_string()));
                        break;
                    }
                }
            }
            events.emit(Event::InputClosed);
        }));
    }
}

impl Recognizer for StdinRecognizer {
    fn start(&mut self) -> Result<()> {
        self.spawn_reader();
        if !self.active.swap(true, Ordering::SeqCst) {
            self.events.emit(Event::RecognizerStarted);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.events.emit(Event::RecognizerEnded);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for StdinRecognizer {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
