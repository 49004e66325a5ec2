//! Error types for the voice chat client

use thiserror::Error;

/// Result type alias for voice chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice chat client
#[derive(Debug, Error)]
pub enum Error {
    /// Speech recognition is not available on this host
    #[error("speech recognition unsupported: {0}")]
    RecognitionUnsupported(String),

    /// Recognizer stopped unexpectedly
    #[error("speech recognition interrupted: {0}")]
    RecognitionTransient(String),

    /// Chat completion request or response failed
    #[error("text completion failed: {0}")]
    RemoteText(String),

    /// Image generation or image fetch failed
    #[error("image request failed: {0}")]
    RemoteImage(String),

    /// Clipboard, file or viewer action failed
    #[error("image action failed: {0}")]
    ClipboardOrFile(String),

    /// System prompt could not be loaded
    #[error("prompt load failed: {0}")]
    PromptLoad(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Image model id outside the supported set
    #[error("unknown image model: {0}")]
    UnknownImageModel(String),

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// Audio capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
