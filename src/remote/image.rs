//! Image generation endpoint
//!
//! Images are addressed by a locator URL that embeds the prompt and all
//! generation parameters; fetching the locator returns the image bytes.

use async_trait::async_trait;
use rand::Rng;
use url::Url;

use crate::session::ImageModel;
use crate::{Error, Result};

/// Seed range, inclusive: always six digits
pub const SEED_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Draw a uniformly random six-digit seed
#[must_use]
pub fn random_seed() -> u32 {
    rand::thread_rng().gen_range(SEED_RANGE)
}

/// Fixed generation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// Endpoint base, e.g. `https://image.pollinations.ai`
    pub base_url: String,
    pub width: u32,
    pub height: u32,
    pub private: bool,
    pub enhance: bool,
    pub referrer: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai".to_string(),
            width: 512,
            height: 512,
            private: true,
            enhance: true,
            referrer: "unityailab.com".to_string(),
        }
    }
}

/// One image generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub seed: u32,
    pub model: ImageModel,
    pub options: &'a ImageOptions,
}

impl ImageRequest<'_> {
    /// Build the locator URL for this request
    ///
    /// # Errors
    ///
    /// Returns `RemoteImage` if the configured base URL is invalid
    pub fn locator(&self) -> Result<Url> {
        let options = self.options;
        let raw = format!(
            "{}/prompt/{}?height={}&width={}&private={}&enhance={}&seed={}&model={}&referrer={}",
            options.base_url.trim_end_matches('/'),
            urlencoding::encode(self.prompt),
            options.height,
            options.width,
            options.private,
            options.enhance,
            self.seed,
            self.model.id(),
            urlencoding::encode(&options.referrer),
        );

        Url::parse(&raw).map_err(|e| Error::RemoteImage(format!("invalid image locator: {e}")))
    }
}

/// Fetches image bytes from a locator
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `RemoteImage` on network failure or a non-success status
    async fn fetch(&self, locator: &Url) -> Result<Vec<u8>>;
}

/// Plain HTTPS GET
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl Default for HttpImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpImageSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, locator: &Url) -> Result<Vec<u8>> {
        tracing::debug!(url = %locator, "fetching image");

        let response = self
            .client
            .get(locator.clone())
            .send()
            .await
            .map_err(|e| Error::RemoteImage(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteImage(format!("image API error {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::RemoteImage(e.to_string()))?;

        tracing::debug!(bytes = bytes.len(), "image fetched");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_seed_is_six_digits() {
        for _ in 0..1000 {
            let seed = random_seed();
            assert!(SEED_RANGE.contains(&seed), "seed {seed} out of range");
        }
    }

    #[test]
    fn test_locator_embeds_parameters() {
        let options = ImageOptions::default();
        let request = ImageRequest {
            prompt: "What's the weather?",
            seed: 123_456,
            model: ImageModel::Turbo,
            options: &options,
        };

        let url = request.locator().unwrap();
        assert_eq!(url.host_str(), Some("image.pollinations.ai"));
        assert_eq!(url.path(), "/prompt/What%27s%20the%20weather%3F");

        let decoded = urlencoding::decode(url.path().trim_start_matches("/prompt/")).unwrap();
        assert_eq!(decoded, "What's the weather?");

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["height"], "512");
        assert_eq!(query["width"], "512");
        assert_eq!(query["private"], "true");
        assert_eq!(query["enhance"], "true");
        assert_eq!(query["seed"], "123456");
        assert_eq!(query["model"], "turbo");
        assert_eq!(query["referrer"], "unityailab.com");
    }

    #[test]
    fn test_locator_escapes_path_separators() {
        let options = ImageOptions {
            base_url: "https://images.example.com/".to_string(),
            ..ImageOptions::default()
        };
        let request = ImageRequest {
            prompt: "cats/dogs & more",
            seed: 100_000,
            model: ImageModel::Flux,
            options: &options,
        };

        let url = request.locator().unwrap();
        assert_eq!(url.path(), "/prompt/cats%2Fdogs%20%26%20more");
    }

    #[test]
    fn test_invalid_base_url() {
        let options = ImageOptions {
            base_url: "not a url".to_string(),
            ..ImageOptions::default()
        };
        let request = ImageRequest {
            prompt: "x",
            seed: 100_000,
            model: ImageModel::Flux,
            options: &options,
        };
        assert!(matches!(request.locator(), Err(Error::RemoteImage(_))));
    }
}
