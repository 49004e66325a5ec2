//! Microphone input for the utterance segmenter
//!
//! The cpal callback appends 16 kHz mono samples to a shared buffer; the
//! microphone worker drains it every poll and `test-mic` samples it for the
//! level meter.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::segmenter::SAMPLE_RATE;
use crate::{Error, Result};

type SampleBuffer = Arc<Mutex<Vec<f32>>>;

/// Live input stream on the default device
///
/// cpal streams are not `Send`; an `AudioCapture` stays on the thread that
/// opened it.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    samples: SampleBuffer,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device at the segmenter rate
    ///
    /// # Errors
    ///
    /// Returns `RecognitionUnsupported` if there is no input device or it
    /// cannot record 16 kHz mono
    pub fn new() -> Result<Self> {
        let device = cpal::default_host().default_input_device().ok_or_else(|| {
            Error::RecognitionUnsupported("no input device available".to_string())
        })?;

        let rate = SampleRate(SAMPLE_RATE);
        let config = device
            .supported_input_configs()
            .map_err(|e| Error::RecognitionUnsupported(e.to_string()))?
            .find(|range| {
                range.channels() == 1
                    && range.min_sample_rate() <= rate
                    && range.max_sample_rate() >= rate
            })
            .map(|range| range.with_sample_rate(rate).config())
            .ok_or_else(|| {
                Error::RecognitionUnsupported("input device cannot record 16 kHz mono".to_string())
            })?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            samples: SampleBuffer::default(),
            stream: None,
        })
    }

    /// Begin filling the sample buffer; no-op when already recording
    ///
    /// # Errors
    ///
    /// Returns `Audio` if the input stream cannot be built or played
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let samples = Arc::clone(&self.samples);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = samples.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| tracing::warn!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        self.stream = Some(stream);
        tracing::debug!("microphone recording");
        Ok(())
    }

    /// Close the input stream
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("microphone closed");
        }
    }

    /// Samples recorded since the previous drain
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Copy of the pending samples, leaving them in place
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.clear();
        }
    }
}

/// Encode one utterance as a 16-bit PCM WAV upload
///
/// # Errors
///
/// Returns `Audio` if encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let audio_err = |e: hound::Error| Error::Audio(e.to_string());

    let mut wav = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut wav, spec).map_err(audio_err)?;
    for sample in samples.iter().copied().map(to_pcm16) {
        writer.write_sample(sample).map_err(audio_err)?;
    }
    writer.finalize().map_err(audio_err)?;

    Ok(wav.into_inner())
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_clamps_out_of_range() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), i16::MAX);
        assert_eq!(to_pcm16(4.0), i16::MAX);
        assert_eq!(to_pcm16(-4.0), -i16::MAX);
    }
}
