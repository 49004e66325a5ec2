//! System prompt loading
//!
//! The prompt is read once at startup from a file path or an `http(s)` URL.
//! Any failure falls back to a fixed persona so the session can still start.

use std::path::Path;

use crate::{Error, Result};

/// Used when the configured source cannot be read
pub const FALLBACK_PROMPT: &str = "You are Unity, a helpful AI assistant.";

/// Load the system prompt, falling back on any failure
pub async fn load_system_prompt(source: &str) -> String {
    match read_source(source).await {
        Ok(prompt) => {
            tracing::info!(source, chars = prompt.len(), "loaded system prompt");
            prompt
        }
        Err(e) => {
            tracing::warn!(source, error = %e, "using fallback system prompt");
            FALLBACK_PROMPT.to_string()
        }
    }
}

/// Read the prompt text from `source` without falling back
///
/// # Errors
///
/// Returns `PromptLoad` if the source is unreachable, unreadable or empty
pub async fn read_source(source: &str) -> Result<String> {
    let raw = if is_url(source) {
        fetch(source).await?
    } else {
        read_file(Path::new(source)).await?
    };

    let prompt = raw.trim();
    if prompt.is_empty() {
        return Err(Error::PromptLoad(format!("{source} is empty")));
    }
    Ok(prompt.to_string())
}

fn is_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn fetch(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::PromptLoad(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::PromptLoad(format!("{url} returned {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| Error::PromptLoad(e.to_string()))
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::PromptLoad(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loads_file_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai-instruct.txt");
        std::fs::write(&path, "\n  You are a pirate.  \n").unwrap();

        let prompt = load_system_prompt(path.to_str().unwrap()).await;
        assert_eq!(prompt, "You are a pirate.");
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        let prompt = load_system_prompt(path.to_str().unwrap()).await;
        assert_eq!(prompt, FALLBACK_PROMPT);
    }

    #[tokio::test]
    async fn test_empty_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "   \n\t").unwrap();

        assert!(matches!(
            read_source(path.to_str().unwrap()).await,
            Err(Error::PromptLoad(_))
        ));
        assert_eq!(load_system_prompt(path.to_str().unwrap()).await, FALLBACK_PROMPT);
    }

    #[tokio::test]
    async fn test_unreachable_url_falls_back() {
        let prompt = load_system_prompt("http://127.0.0.1:1/ai-instruct.txt").await;
        assert_eq!(prompt, FALLBACK_PROMPT);
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/p.txt"));
        assert!(is_url("HTTP://example.com/p.txt"));
        assert!(!is_url("ai-instruct.txt"));
        assert!(!is_url("/etc/http/prompt.txt"));
    }
}
