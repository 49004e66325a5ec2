//! Voice input and output
//!
//! Recognizers turn speech (or typed lines) into transcripts, synthesizers
//! speak replies, and the guard keeps output single-flight.

#[cfg(feature = "microphone")]
mod capture;
mod guard;
#[cfg(feature = "microphone")]
mod mic;
mod recognizer;
mod segmenter;
#[cfg(feature = "microphone")]
mod stt;
mod synth;

#[cfg(feature = "microphone")]
pub use capture::{AudioCapture, samples_to_wav};
pub use guard::{SpeakOutcome, SpeechOutputGuard, SpeechState};
#[cfg(feature = "microphone")]
pub use mic::{MicrophoneRecognizer, MicrophoneSettings};
pub use recognizer::{Recognizer, StdinRecognizer};
pub use segmenter::{SAMPLE_RATE, SegmenterState, UtteranceSegmenter, rms_energy};
#[cfg(feature = "microphone")]
pub use stt::WhisperTranscriber;
pub use synth::{
    CommandSynthesizer, ConsoleSynthesizer, Gender, Synthesizer, TtsProgram, Voice, VoiceHint,
    select_voice,
};
