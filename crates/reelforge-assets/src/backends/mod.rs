//! Concrete speech and image backends.

pub mod diffusion;
pub mod openai;
pub mod openverse;
pub mod pexels;
pub mod picsum;
pub mod piper;
pub mod pixabay;
pub mod unsplash;

pub use diffusion::DiffusionGenerator;
pub use openai::OpenAiSpeech;
pub use openverse::OpenverseFetcher;
pub use pexels::PexelsFetcher;
pub use picsum::PicsumFetcher;
pub use piper::PiperSpeech;
pub use pixabay::PixabayFetcher;
pub use unsplash::UnsplashFetcher;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;

use reelforge_core::{ReelError, ReelResult};

use crate::error::BackendError;

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique scratch file for a local tool's output.
pub(crate) fn scratch_file(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{}-{}-{}.{}", prefix, std::process::id(), n, extension))
}

/// Shared HTTP client with the configured request timeout.
pub fn http_client(timeout_seconds: u64) -> ReelResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .user_agent(concat!("reelforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ReelError::Fetch(format!("failed to build HTTP client: {}", e)))
}

/// Download a URL, classifying failures.
pub(crate) async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, BackendError> {
    let res = client.get(url).send().await?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(BackendError::from_status(status, &body));
    }
    let bytes = res.bytes().await?;
    if bytes.is_empty() {
        return Err(BackendError::permanent(format!("empty response from {}", url)));
    }
    Ok(bytes.to_vec())
}

/// Send a search request and decode its JSON body, classifying failures.
pub(crate) async fn search_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    source: &str,
) -> Result<T, BackendError> {
    let res = request.send().await?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(BackendError::from_status(status, &body));
    }
    res.json()
        .await
        .map_err(|e| BackendError::permanent(format!("bad {} response: {}", source, e)))
}

/// Pick the candidate for a segment's `variant`; the hook (variant 0) always
/// takes the top hit.
pub(crate) fn pick_candidate(
    candidates: Vec<String>,
    variant: usize,
    source: &str,
    query: &str,
) -> Result<String, BackendError> {
    let mut candidates: Vec<String> = candidates.into_iter().filter(|u| !u.is_empty()).collect();
    if candidates.is_empty() {
        return Err(BackendError::permanent(format!(
            "no {} results for '{}'",
            source, query
        )));
    }
    let index = variant % candidates.len();
    Ok(candidates.swap_remove(index))
}
