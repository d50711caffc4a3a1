use async_trait::async_trait;
use serde::Deserialize;

use super::{download, pick_candidate, search_json};
use crate::backend::{ImageFetcher, ImageRequest};
use crate::error::BackendError;

const PIXABAY_SEARCH_URL: &str = "https://pixabay.com/api/";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
}

fn candidates(found: SearchResponse) -> Vec<String> {
    found
        .hits
        .into_iter()
        .filter_map(|h| h.large_image_url.or(h.webformat_url))
        .collect()
}

/// Pixabay photo search, vertical orientation with safe search on.
pub struct PixabayFetcher {
    client: reqwest::Client,
    api_key_env: String,
    search_url: String,
}

impl PixabayFetcher {
    pub fn new(client: reqwest::Client, api_key_env: impl Into<String>) -> Self {
        Self {
            client,
            api_key_env: api_key_env.into(),
            search_url: PIXABAY_SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

#[async_trait]
impl ImageFetcher for PixabayFetcher {
    fn name(&self) -> &str {
        "pixabay"
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| BackendError::missing_credentials(&self.api_key_env))?;
        if request.query.is_empty() {
            return Err(BackendError::permanent("empty search query"));
        }

        // The key travels as a query parameter, not a header.
        let request_builder = self.client.get(&self.search_url).query(&[
            ("key", api_key.as_str()),
            ("q", request.query.as_str()),
            ("orientation", "vertical"),
            ("image_type", "photo"),
            ("safesearch", "true"),
            ("per_page", "15"),
        ]);
        let found: SearchResponse = search_json(request_builder, "Pixabay").await?;
        let url = pick_candidate(candidates(found), request.variant, "Pixabay", &request.query)?;

        download(&self.client, &url).await
    }
}
