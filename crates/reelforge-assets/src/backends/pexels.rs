use async_trait::async_trait;
use serde::Deserialize;

use super::{download, pick_candidate, search_json};
use crate::backend::{ImageFetcher, ImageRequest};
use crate::error::BackendError;

const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    large2x: Option<String>,
    large: Option<String>,
}

/// Pexels stock photo search, portrait orientation.
pub struct PexelsFetcher {
    client: reqwest::Client,
    api_key_env: String,
    search_url: String,
}

impl PexelsFetcher {
    pub fn new(client: reqwest::Client, api_key_env: impl Into<String>) -> Self {
        Self {
            client,
            api_key_env: api_key_env.into(),
            search_url: PEXELS_SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

#[async_trait]
impl ImageFetcher for PexelsFetcher {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| BackendError::missing_credentials(&self.api_key_env))?;
        if request.query.is_empty() {
            return Err(BackendError::permanent("empty search query"));
        }

        let request_builder = self
            .client
            .get(&self.search_url)
            .header("Authorization", api_key)
            .query(&[
                ("query", request.query.as_str()),
                ("orientation", "portrait"),
                ("per_page", "15"),
                ("size", "large"),
            ]);
        let found: SearchResponse = search_json(request_builder, "Pexels").await?;

        let urls = found
            .photos
            .into_iter()
            .filter_map(|p| p.src.large2x.or(p.src.large))
            .collect();
        let url = pick_candidate(urls, request.variant, "Pexels", &request.query)?;

        download(&self.client, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_search_response() {
        let raw = r#"{"page":1,"photos":[{"id":1,"src":{"large2x":"https://x/1.jpg","large":"https://x/1s.jpg"}},{"id":2,"src":{"large":"https://x/2.jpg"}}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.photos.len(), 2);
        assert_eq!(parsed.photos[1].src.large2x, None);
        assert_eq!(parsed.photos[1].src.large.as_deref(), Some("https://x/2.jpg"));
    }

    #[tokio::test]
    async fn test_missing_key_is_permanent() {
        let fetcher = PexelsFetcher::new(reqwest::Client::new(), "REELFORGE_TEST_UNSET_PEXELS_KEY");
        let request = ImageRequest {
            query: "city".into(),
            prompt: "city".into(),
            width: 1080,
            height: 1920,
            variant: 0,
        };
        assert!(!fetcher.fetch(&request).await.unwrap_err().is_transient());
    }
}
