//! TOML configuration file loading
//!
//! Supports `<config_dir>/voice-chat/config.toml` as a persistent config
//! source. All fields are optional, the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub chat: ChatFileConfig,

    #[serde(default)]
    pub image: ImageFileConfig,

    #[serde(default)]
    pub prompt: PromptFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub recognizer: RecognizerFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Text completion endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    pub url: Option<String>,
    pub model: Option<String>,
}

/// Image generation and image actions
#[derive(Debug, Default, Deserialize)]
pub struct ImageFileConfig {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub private: Option<bool>,
    pub enhance: Option<bool>,
    pub referrer: Option<String>,
    /// Initial model id (`flux`, `turbo` or `kontext`)
    pub default_model: Option<String>,
    /// Filename suggested when saving
    pub filename: Option<String>,
    pub download_dir: Option<String>,
}

/// System prompt source
#[derive(Debug, Default, Deserialize)]
pub struct PromptFileConfig {
    /// File path or `http(s)` URL
    pub source: Option<String>,
}

/// Speech output
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub preferred_name: Option<String>,
    pub locale: Option<String>,
    pub gender: Option<String>,
    /// TTS program name or path (e.g. "espeak-ng")
    pub program: Option<String>,
}

/// Speech input
#[derive(Debug, Default, Deserialize)]
pub struct RecognizerFileConfig {
    /// `stdin` or `microphone`
    pub backend: Option<String>,
    pub language: Option<String>,
    pub stt_url: Option<String>,
    pub stt_model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-chat/config.toml` on Linux
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-chat").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let fc = parse_config_file(
            r#"
            [chat]
            model = "openai"

            [image]
            default_model = "turbo"
            width = 768

            [recognizer]
            backend = "microphone"
            "#,
        )
        .unwrap();

        assert_eq!(fc.chat.model.as_deref(), Some("openai"));
        assert!(fc.chat.url.is_none());
        assert_eq!(fc.image.default_model.as_deref(), Some("turbo"));
        assert_eq!(fc.image.width, Some(768));
        assert_eq!(fc.recognizer.backend.as_deref(), Some("microphone"));
        assert!(fc.voice.program.is_none());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chat\nurl = ").unwrap();

        let fc = load_config_file_from(&path);
        assert!(fc.chat.url.is_none());
        assert!(fc.image.default_model.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file_from(&dir.path().join("absent.toml"));
        assert!(fc.prompt.source.is_none());
    }
}
