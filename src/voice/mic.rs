//! Microphone recognizer: capture, segment, transcribe
//!
//! cpal streams are not `Send`, so capture and the blocking STT client live
//! on a dedicated worker thread that posts results to the event queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cpal::traits::HostTrait;
use secrecy::{ExposeSecret, SecretString};

use super::capture::{AudioCapture, samples_to_wav};
use super::recognizer::Recognizer;
use super::segmenter::{SAMPLE_RATE, UtteranceSegmenter};
use super::stt::WhisperTranscriber;
use crate::events::{Event, EventSender};
use crate::{Error, Result};

/// Capture polling interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Transcription endpoint settings
#[derive(Debug, Clone)]
pub struct MicrophoneSettings {
    pub stt_url: String,
    pub stt_model: String,
    pub api_key: SecretString,
    pub language: String,
}

/// Listens on the default input device
pub struct MicrophoneRecognizer {
    settings: MicrophoneSettings,
    events: EventSender,
    running: Option<Arc<AtomicBool>>,
}

impl MicrophoneRecognizer {
    #[must_use]
    pub const fn new(settings: MicrophoneSettings, events: EventSender) -> Self {
        Self {
            settings,
            events,
            running: None,
        }
    }
}

impl Recognizer for MicrophoneRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        if self.settings.api_key.expose_secret().is_empty() {
            return Err(Error::RecognitionUnsupported(
                "OPENAI_API_KEY required for microphone transcription".to_string(),
            ));
        }
        if cpal::default_host().default_input_device().is_none() {
            return Err(Error::RecognitionUnsupported(
                "no input device available".to_string(),
            ));
        }

        let running = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            settings: self.settings.clone(),
            events: self.events.clone(),
            running: Arc::clone(&running),
        };

        thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || worker.run())?;

        self.running = Some(running);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.load(Ordering::SeqCst))
    }
}

impl Drop for MicrophoneRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    settings: MicrophoneSettings,
    events: EventSender,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        if let Err(e) = self.listen() {
            tracing::warn!(error = %e, "microphone recognizer stopped");
            self.events.emit(Event::RecognizerError(e.to_string()));
        }
        self.running.store(false, Ordering::SeqCst);
        self.events.emit(Event::RecognizerEnded);
    }

    fn listen(&self) -> Result<()> {
        let transcriber = WhisperTranscriber::new(
            self.settings.stt_url.clone(),
            self.settings.api_key.clone(),
            self.settings.stt_model.clone(),
            Some(&self.settings.language),
        )?;

        let mut capture = AudioCapture::new()?;
        capture.start()?;
        self.events.emit(Event::RecognizerStarted);

        let mut segmenter = UtteranceSegmenter::new();
        let result = self.capture_loop(&capture, &mut segmenter, &transcriber);
        capture.stop();
        result
    }

    fn capture_loop(
        &self,
        capture: &AudioCapture,
        segmenter: &mut UtteranceSegmenter,
        transcriber: &WhisperTranscriber,
    ) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            thread::sleep(POLL_INTERVAL);

            let samples = capture.take_buffer();
            let Some(utterance) = segmenter.process(&samples) else {
                continue;
            };

            let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;
            let transcript = transcriber.transcribe(wav)?;

            // stop() may have been called while the request was in flight
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if !transcript.is_empty() {
                self.events.emit(Event::Transcript(transcript));
            }
        }

        Ok(())
    }
}
