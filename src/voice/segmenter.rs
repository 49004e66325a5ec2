//! Utterance segmentation
//!
//! Splits a microphone stream into utterances using RMS energy: speech
//! starts when a block rises above the threshold and ends after enough
//! trailing silence.

/// Sample rate the segmenter thresholds are expressed in
pub const SAMPLE_RATE: u32 = 16000;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to keep (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Longest utterance kept before it is cut (in samples)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Listening,
}

/// Cuts utterances out of a stream of sample blocks
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed one block of samples
    ///
    /// Returns the finished utterance once speech is followed by silence.
    pub fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = rms_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
                None
            }
            SegmenterState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let spoken = self.speech_buffer.len().saturating_sub(self.silence_counter);

                if (self.silence_counter > SILENCE_SAMPLES && spoken > MIN_SPEECH_SAMPLES)
                    || self.speech_buffer.len() > MAX_UTTERANCE_SAMPLES
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    let utterance = std::mem::take(&mut self.speech_buffer);
                    self.reset();
                    return Some(utterance);
                }

                // Too much silence for too little speech: a click or a cough
                if self.silence_counter > SILENCE_SAMPLES {
                    tracing::trace!("speech too short, resetting");
                    self.reset();
                }

                None
            }
        }
    }

    /// Reset to idle, discarding buffered audio
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Samples buffered for the utterance in progress
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.speech_buffer.len()
    }
}

/// RMS energy of a block of samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms_energy(&loud) > 0.4);

        assert!(rms_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_short_blip_is_dropped() {
        let mut segmenter = UtteranceSegmenter::new();

        assert!(segmenter.process(&vec![0.5; 800]).is_none());
        assert_eq!(segmenter.state(), SegmenterState::Listening);

        assert!(segmenter.process(&vec![0.0; SILENCE_SAMPLES + 1]).is_none());
        assert_eq!(segmenter.state(), SegmenterState::Idle);
        assert_eq!(segmenter.buffered(), 0);
    }
}
