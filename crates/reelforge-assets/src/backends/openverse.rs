use async_trait::async_trait;
use serde::Deserialize;

use super::{download, pick_candidate, search_json};
use crate::backend::{ImageFetcher, ImageRequest};
use crate::error::BackendError;

const OPENVERSE_SEARCH_URL: &str = "https://api.openverse.org/v1/images/";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
    #[serde(default)]
    mature: bool,
}

fn candidates(found: SearchResponse) -> Vec<String> {
    found
        .results
        .into_iter()
        .filter(|i| !i.mature)
        .filter_map(|i| i.url)
        .collect()
}

/// Openly licensed images from Openverse. Anonymous access, no key needed.
pub struct OpenverseFetcher {
    client: reqwest::Client,
    search_url: String,
}

impl OpenverseFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            search_url: OPENVERSE_SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

#[async_trait]
impl ImageFetcher for OpenverseFetcher {
    fn name(&self) -> &str {
        "openverse"
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        if request.query.is_empty() {
            return Err(BackendError::permanent("empty search query"));
        }

        let request_builder = self.client.get(&self.search_url).query(&[
            ("q", request.query.as_str()),
            ("aspect_ratio", "tall"),
            ("license_type", "commercial"),
            ("mature", "false"),
            ("page_size", "20"),
        ]);
        let found: SearchResponse = search_json(request_builder, "Openverse").await?;
        let url = pick_candidate(candidates(found), request.variant, "Openverse", &request.query)?;

        download(&self.client, &url).await
    }
}
