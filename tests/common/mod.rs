//! Shared test doubles

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use url::Url;

use voice_chat::events::{Event, EventQueue, EventSender, UtteranceId};
use voice_chat::remote::{ChatCompletion, ImageOptions, ImageSource};
use voice_chat::session::{ChatMessage, Role};
use voice_chat::voice::{Recognizer, SpeechOutputGuard, Synthesizer, Voice, VoiceHint};
use voice_chat::{
    Assistant, ConversationTurnHandler, Desktop, Error, ImageActionDispatcher, Result,
    SessionState,
};

pub const TEST_PROMPT: &str = "You are Unity, a test assistant.";

/// Chat endpoint that replays scripted outcomes and records requests
#[derive(Default)]
pub struct ScriptedChat {
    outcomes: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<(Role, String)>>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Arc<Self> {
        let chat = Self::default();
        chat.push_reply(reply);
        Arc::new(chat)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let chat = Self::default();
        chat.push_failure(message);
        Arc::new(chat)
    }

    pub fn push_reply(&self, reply: &str) {
        self.outcomes.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self, message: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Every request body seen so far, as (role, content) pairs
    pub fn requests(&self) -> Vec<Vec<(Role, String)>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage<'_>]) -> Result<String> {
        self.requests.lock().unwrap().push(
            messages
                .iter()
                .map(|m| (m.role, m.content.to_string()))
                .collect(),
        );

        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(Error::RemoteText(message)),
            None => Err(Error::RemoteText("no scripted reply".to_string())),
        }
    }
}

/// Image source that records every locator it is asked for
#[derive(Default)]
pub struct RecordingImageSource {
    fail: AtomicBool,
    stall: AtomicBool,
    fetched: Mutex<Vec<Url>>,
}

impl RecordingImageSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let source = Self::default();
        source.fail.store(true, Ordering::SeqCst);
        Arc::new(source)
    }

    /// Generation that never finishes
    pub fn stalled() -> Arc<Self> {
        let source = Self::default();
        source.stall.store(true, Ordering::SeqCst);
        Arc::new(source)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetched(&self) -> Vec<Url> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for RecordingImageSource {
    async fn fetch(&self, locator: &Url) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(locator.clone());
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::RemoteImage("connection refused".to_string()));
        }
        Ok(b"\x89PNG fake image".to_vec())
    }
}

/// Synthesizer that records utterances
///
/// With an event sender attached it finishes every utterance immediately,
/// like the console fallback.
#[derive(Clone, Default)]
pub struct RecordingSynth {
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub cancels: Arc<AtomicUsize>,
    pub voices: Vec<Voice>,
    events: Option<EventSender>,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventSender) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Synthesizer for RecordingSynth {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, id: UtteranceId, text: &str, _voice: Option<&Voice>) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if let Some(events) = &self.events {
            events.emit(Event::SpeechStarted(id));
            events.emit(Event::SpeechEnded(id));
        }
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`RecordingDesktop`] was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopAction {
    Copy(usize),
    Save(String),
    Open(Url),
}

/// Desktop that records actions instead of touching the host
#[derive(Default)]
pub struct RecordingDesktop {
    fail: AtomicBool,
    actions: Mutex<Vec<DesktopAction>>,
    threads: Mutex<Vec<ThreadId>>,
}

impl RecordingDesktop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let desktop = Self::default();
        desktop.fail.store(true, Ordering::SeqCst);
        Arc::new(desktop)
    }

    pub fn actions(&self) -> Vec<DesktopAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Threads each action ran on
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    fn record(&self, action: DesktopAction) -> Result<()> {
        self.actions.lock().unwrap().push(action);
        self.threads.lock().unwrap().push(thread::current().id());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ClipboardOrFile("permission denied".to_string()));
        }
        Ok(())
    }
}

impl Desktop for RecordingDesktop {
    fn copy_image(&self, bytes: &[u8]) -> Result<()> {
        self.record(DesktopAction::Copy(bytes.len()))
    }

    fn save_file(&self, name: &str, _bytes: &[u8]) -> Result<PathBuf> {
        self.record(DesktopAction::Save(name.to_string()))?;
        Ok(PathBuf::from("/downloads").join(name))
    }

    fn open_url(&self, url: &Url) -> Result<()> {
        self.record(DesktopAction::Open(url.clone()))
    }
}

/// Recognizer that counts start and stop calls
#[derive(Clone, Default)]
pub struct CountingRecognizer {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
}

impl CountingRecognizer {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Recognizer for CountingRecognizer {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// In-memory stand-in for the terminal
#[derive(Clone, Default)]
pub struct CapturedDisplay(Arc<Mutex<Vec<u8>>>);

impl CapturedDisplay {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedDisplay {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Handles to every double wired into a test assistant
pub struct Harness {
    pub assistant: Assistant,
    pub queue: EventQueue,
    pub chat: Arc<ScriptedChat>,
    pub images: Arc<RecordingImageSource>,
    pub desktop: Arc<RecordingDesktop>,
    pub synth: RecordingSynth,
    pub recognizer: CountingRecognizer,
    pub display: CapturedDisplay,
}

impl Harness {
    pub fn new(chat: Arc<ScriptedChat>) -> Self {
        Self::with_doubles(chat, RecordingImageSource::new(), RecordingDesktop::new())
    }

    pub fn with_doubles(
        chat: Arc<ScriptedChat>,
        images: Arc<RecordingImageSource>,
        desktop: Arc<RecordingDesktop>,
    ) -> Self {
        let (events, queue) = voice_chat::events::channel();
        let synth = RecordingSynth::with_events(events.clone());
        let recognizer = CountingRecognizer::default();
        let display = CapturedDisplay::default();

        let speech = SpeechOutputGuard::new(Box::new(synth.clone()), VoiceHint::default());
        let turns = ConversationTurnHandler::new(
            chat.clone(),
            images.clone(),
            ImageOptions::default(),
            events,
        );
        let image_actions = ImageActionDispatcher::new(images.clone(), desktop.clone());

        let assistant = Assistant::new(
            SessionState::new(TEST_PROMPT),
            speech,
            turns,
            image_actions,
            Box::new(recognizer.clone()),
        )
        .with_display(Box::new(display.clone()));

        Self {
            assistant,
            queue,
            chat,
            images,
            desktop,
            synth,
            recognizer,
            display,
        }
    }

    /// Deliver a transcript, then handle every event it caused
    pub async fn say(&mut self, transcript: &str) {
        let _ = self
            .assistant
            .dispatch(Event::Transcript(transcript.to_string()))
            .await;
        self.drain().await;
    }

    /// Handle queued events until the queue is empty and no image is
    /// still being generated
    pub async fn drain(&mut self) {
        loop {
            while let Some(event) = self.queue.try_next() {
                let _ = self.assistant.dispatch(event).await;
            }
            if !self.assistant.image_pending() {
                return;
            }
            let Some(event) = self.queue.next().await else {
                return;
            };
            let _ = self.assistant.dispatch(event).await;
        }
    }
}
