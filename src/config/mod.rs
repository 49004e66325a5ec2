//! Configuration management for the voice chat client
//!
//! Resolution order, lowest to highest: built-in defaults, the TOML file,
//! environment variables. The CLI applies its own overrides afterwards.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::images::DEFAULT_FILENAME;
use crate::remote::ImageOptions;
use crate::session::ImageModel;
use crate::voice::{Gender, VoiceHint};
use crate::{Error, Result};

use file::ConfigFile;

/// Default text completion endpoint
pub const DEFAULT_CHAT_URL: &str = "https://text.pollinations.ai/openai";

/// Default text model
pub const DEFAULT_CHAT_MODEL: &str = "unity";

/// Default system prompt source
pub const DEFAULT_PROMPT_SOURCE: &str = "ai-instruct.txt";

/// Default transcription endpoint for the microphone backend
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Voice chat configuration
#[derive(Debug)]
pub struct Config {
    /// Text completion endpoint
    pub chat: ChatConfig,

    /// Image generation and image actions
    pub image: ImageConfig,

    /// System prompt file path or URL
    pub prompt_source: String,

    /// Speech output
    pub voice: VoiceConfig,

    /// Speech input
    pub recognizer: RecognizerConfig,
}

/// Text completion endpoint configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub url: String,
    pub model: String,
}

/// Image configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Fixed generation parameters
    pub options: ImageOptions,

    /// Model selected at startup
    pub default_model: ImageModel,

    /// Filename suggested when saving
    pub filename: String,

    /// Where saved images land
    pub download_dir: PathBuf,
}

/// Speech output configuration
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    /// Preferred voice characteristics
    pub hint: VoiceHint,

    /// TTS program override; auto-detected when unset
    pub program: Option<String>,
}

/// Transcript source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecognizerBackend {
    /// One transcript per line on stdin
    #[default]
    Stdin,
    /// Default input device, transcribed remotely
    Microphone,
}

impl fmt::Display for RecognizerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdin => "stdin",
            Self::Microphone => "microphone",
        })
    }
}

impl FromStr for RecognizerBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin" => Ok(Self::Stdin),
            "microphone" | "mic" => Ok(Self::Microphone),
            other => Err(Error::Config(format!("unknown recognizer backend: {other}"))),
        }
    }
}

/// Speech input configuration
#[derive(Debug)]
pub struct RecognizerConfig {
    pub backend: RecognizerBackend,

    /// Recognition language, e.g. `en-US`
    pub language: String,

    /// Transcription endpoint (microphone backend)
    pub stt_url: String,

    /// Transcription model (microphone backend)
    pub stt_model: String,

    /// `OpenAI` API key, required only by the microphone backend
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns `Config` if a value is present but invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns `Config` if a value is present but invalid
    pub fn from_sources<F>(fc: ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Chat endpoint (env > toml > default)
        let chat = ChatConfig {
            url: env("VOICE_CHAT_CHAT_URL")
                .or(fc.chat.url)
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            model: env("VOICE_CHAT_CHAT_MODEL")
                .or(fc.chat.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        };

        // Image generation (env > toml > default)
        let defaults = ImageOptions::default();
        let options = ImageOptions {
            base_url: env("VOICE_CHAT_IMAGE_URL")
                .or(fc.image.url)
                .unwrap_or(defaults.base_url),
            width: fc.image.width.unwrap_or(defaults.width),
            height: fc.image.height.unwrap_or(defaults.height),
            private: fc.image.private.unwrap_or(defaults.private),
            enhance: fc.image.enhance.unwrap_or(defaults.enhance),
            referrer: fc.image.referrer.unwrap_or(defaults.referrer),
        };
        let default_model = env("VOICE_CHAT_IMAGE_MODEL")
            .or(fc.image.default_model)
            .map(|id| {
                id.parse::<ImageModel>()
                    .map_err(|e| Error::Config(e.to_string()))
            })
            .transpose()?
            .unwrap_or_default();
        let image = ImageConfig {
            options,
            default_model,
            filename: fc
                .image
                .filename
                .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            download_dir: fc
                .image
                .download_dir
                .map_or_else(default_download_dir, PathBuf::from),
        };

        let prompt_source = env("VOICE_CHAT_PROMPT")
            .or(fc.prompt.source)
            .unwrap_or_else(|| DEFAULT_PROMPT_SOURCE.to_string());

        // Voice hint (toml > default)
        let default_hint = VoiceHint::default();
        let gender = match fc.voice.gender {
            Some(raw) => Some(
                Gender::parse(&raw)
                    .ok_or_else(|| Error::Config(format!("unknown voice gender: {raw}")))?,
            ),
            None => default_hint.gender,
        };
        let voice = VoiceConfig {
            hint: VoiceHint {
                preferred_name: fc
                    .voice
                    .preferred_name
                    .unwrap_or(default_hint.preferred_name),
                locale: fc.voice.locale.unwrap_or(default_hint.locale),
                gender,
            },
            program: env("VOICE_CHAT_TTS_PROGRAM").or(fc.voice.program),
        };

        // Recognizer (env > toml > default)
        let backend = env("VOICE_CHAT_RECOGNIZER")
            .or(fc.recognizer.backend)
            .map(|raw| raw.parse::<RecognizerBackend>())
            .transpose()?
            .unwrap_or_default();
        let recognizer = RecognizerConfig {
            backend,
            language: fc
                .recognizer
                .language
                .unwrap_or_else(|| "en-US".to_string()),
            stt_url: fc
                .recognizer
                .stt_url
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            stt_model: fc
                .recognizer
                .stt_model
                .unwrap_or_else(|| "whisper-1".to_string()),
            api_key: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::from),
        };

        tracing::debug!(
            chat_url = %chat.url,
            image_url = %image.options.base_url,
            image_model = %image.default_model,
            recognizer = %recognizer.backend,
            "configuration resolved"
        );

        Ok(Self {
            chat,
            image,
            prompt_source,
            voice,
            recognizer,
        })
    }
}

/// The user's download directory, else the current directory
fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.download_dir().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
