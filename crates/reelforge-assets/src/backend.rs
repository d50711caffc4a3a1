use async_trait::async_trait;

use crate::error::BackendError;

/// Synthesized narration audio.
#[derive(Debug, Clone)]
pub struct Speech {
    pub bytes: Vec<u8>,
    /// Realized playback length in seconds.
    pub duration: f64,
    /// File extension of `bytes` (`wav`, `mp3`).
    pub extension: &'static str,
}

/// What an image backend is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Keyword query for search-based sources.
    pub query: String,
    /// Full visual description, used as the prompt by generators.
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    /// Which of a segment's images this is; lets backends vary their pick.
    pub variant: usize,
}

/// Text-to-speech capability.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Distinguishes cache entries of differently configured instances.
    fn cache_tag(&self) -> String {
        self.name().to_string()
    }

    /// Heavy backends run under the process-wide heavy-step permit.
    fn is_heavy(&self) -> bool {
        false
    }

    async fn synthesize(&self, text: &str) -> Result<Speech, BackendError>;
}

/// Search-and-download image capability.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    fn name(&self) -> &str;

    fn cache_tag(&self) -> String {
        self.name().to_string()
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError>;
}

/// Prompt-to-image capability, usually a local generative model.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn cache_tag(&self) -> String {
        self.name().to_string()
    }

    fn is_heavy(&self) -> bool {
        true
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, BackendError>;
}

/// Guess a file extension from leading magic bytes.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(b"RIFF") && bytes.len() > 12 && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "jpg"
    }
}
