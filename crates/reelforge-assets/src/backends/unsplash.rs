use async_trait::async_trait;
use serde::Deserialize;

use super::{download, pick_candidate, search_json};
use crate::backend::{ImageFetcher, ImageRequest};
use crate::error::BackendError;

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    raw: Option<String>,
    regular: Option<String>,
}

/// Unsplash photo search through the official API (`Client-ID` access key).
pub struct UnsplashFetcher {
    client: reqwest::Client,
    api_key_env: String,
    search_url: String,
}

impl UnsplashFetcher {
    pub fn new(client: reqwest::Client, api_key_env: impl Into<String>) -> Self {
        Self {
            client,
            api_key_env: api_key_env.into(),
            search_url: UNSPLASH_SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

/// `raw` URLs accept imgix sizing parameters, so ask for the output frame directly.
fn sized_url(urls: PhotoUrls, width: u32, height: u32) -> Option<String> {
    match urls.raw {
        Some(raw) => {
            let sep = if raw.contains('?') { '&' } else { '?' };
            Some(format!("{}{}w={}&h={}&fit=crop&fm=jpg", raw, sep, width, height))
        }
        None => urls.regular,
    }
}

#[async_trait]
impl ImageFetcher for UnsplashFetcher {
    fn name(&self) -> &str {
        "unsplash"
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        let access_key = std::env::var(&self.api_key_env)
            .map_err(|_| BackendError::missing_credentials(&self.api_key_env))?;
        if request.query.is_empty() {
            return Err(BackendError::permanent("empty search query"));
        }

        let request_builder = self
            .client
            .get(&self.search_url)
            .header("Authorization", format!("Client-ID {}", access_key))
            .query(&[
                ("query", request.query.as_str()),
                ("orientation", "portrait"),
                ("per_page", "15"),
                ("content_filter", "high"),
            ]);
        let found: SearchResponse = search_json(request_builder, "Unsplash").await?;

        let urls = found
            .results
            .into_iter()
            .filter_map(|p| sized_url(p.urls, request.width, request.height))
            .collect();
        let url = pick_candidate(urls, request.variant, "Unsplash", &request.query)?;

        download(&self.client, &url).await
    }
}
