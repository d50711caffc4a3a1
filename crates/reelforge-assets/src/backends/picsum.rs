use async_trait::async_trait;

use reelforge_core::hash::hash_fields;

use super::download;
use crate::backend::{ImageFetcher, ImageRequest};
use crate::error::BackendError;

const PICSUM_URL: &str = "https://picsum.photos";

/// Keyword-free photos from Lorem Picsum.
///
/// The query only seeds the pick, so the same request always gets the same
/// photo and different segments get different ones.
pub struct PicsumFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl PicsumFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: PICSUM_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn url_for(&self, request: &ImageRequest) -> String {
        let seed = hash_fields(&[&request.query, &request.variant.to_string()]).to_hex();
        format!(
            "{}/seed/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            &seed[..16],
            request.width,
            request.height
        )
    }
}

#[async_trait]
impl ImageFetcher for PicsumFetcher {
    fn name(&self) -> &str {
        "picsum"
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        download(&self.client, &self.url_for(request)).await
    }
}
