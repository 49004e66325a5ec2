//! Chat completion endpoint

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::ChatMessage;
use crate::{Error, Result};

/// Remote conversational model
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the full message list and return the reply text
    ///
    /// # Errors
    ///
    /// Returns `RemoteText` on network failure or a malformed response
    async fn complete(&self, messages: &[ChatMessage<'_>]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage<'a>],
    model: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-style chat completions over HTTPS
pub struct PollinationsChat {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl PollinationsChat {
    #[must_use]
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            model,
        }
    }
}

#[async_trait]
impl ChatCompletion for PollinationsChat {
    async fn complete(&self, messages: &[ChatMessage<'_>]) -> Result<String> {
        tracing::debug!(
            url = %self.url,
            model = %self.model,
            messages = messages.len(),
            "requesting chat completion"
        );

        let request = ChatRequest {
            messages,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::RemoteText(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteText(format!("chat API error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::RemoteText(e.to_string()))?;

        parse_reply(&body)
    }
}

/// Extract `choices[0].message.content` from a response body
///
/// # Errors
///
/// Returns `RemoteText` if the body is not JSON or has no reply content
pub fn parse_reply(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::RemoteText(format!("malformed chat response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::RemoteText("chat response has no content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_parse_reply() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Sunny."}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Sunny.");
    }

    #[test]
    fn test_parse_reply_rejects_malformed() {
        assert!(matches!(parse_reply("<html>"), Err(Error::RemoteText(_))));
        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(Error::RemoteText(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(Error::RemoteText(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = [
            ChatMessage {
                role: Role::System,
                content: "You are Unity",
            },
            ChatMessage {
                role: Role::User,
                content: "hi",
            },
        ];
        let request = ChatRequest {
            messages: &messages,
            model: "unity",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [
                    {"role": "system", "content": "You are Unity"},
                    {"role": "user", "content": "hi"}
                ],
                "model": "unity"
            })
        );
    }
}
