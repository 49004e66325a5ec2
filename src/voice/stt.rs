//! Speech-to-text (STT) via an OpenAI-compatible transcription endpoint
//!
//! Blocking client: runs on the microphone thread, off the async runtime.

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes WAV audio to text
pub struct WhisperTranscriber {
    client: reqwest::blocking::Client,
    url: String,
    api_key: SecretString,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Create a transcriber
    ///
    /// `language` is a BCP-47 tag such as `en-US`; only the primary subtag
    /// is sent.
    ///
    /// # Errors
    ///
    /// Returns `RecognitionUnsupported` if the API key is empty
    pub fn new(
        url: String,
        api_key: SecretString,
        model: String,
        language: Option<&str>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::RecognitionUnsupported(
                "OPENAI_API_KEY required for microphone transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::blocking::Client::new(),
            url,
            api_key,
            model,
            language: language.and_then(primary_language),
        })
    }

    /// Transcribe WAV audio
    ///
    /// # Errors
    ///
    /// Returns `RecognitionTransient` if the request or response fails
    pub fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::RecognitionTransient(e.to_string()))?;

        let mut form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                Error::RecognitionTransient(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::RecognitionTransient(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .map_err(|e| Error::RecognitionTransient(format!("bad transcription response: {e}")))?;

        let text = result.text.trim().to_string();
        tracing::debug!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

/// `en-US` -> `en`
fn primary_language(tag: &str) -> Option<String> {
    let primary = tag.split(['-', '_']).next()?.trim();
    if primary.is_empty() {
        None
    } else {
        Some(primary.to_ascii_lowercase())
    }
}
