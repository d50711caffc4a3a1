//! Fallback chains, chosen once per run from the configured policy.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use reelforge_core::{ImageSource, ReelConfig, ReelResult, SpeechEngine};

use crate::backend::{ImageFetcher, ImageGenerator, SpeechBackend};
use crate::backends::{
    http_client, DiffusionGenerator, OpenAiSpeech, OpenverseFetcher, PexelsFetcher,
    PicsumFetcher, PiperSpeech, PixabayFetcher, UnsplashFetcher,
};

/// One tier of the audio fallback chain.
#[derive(Clone)]
pub enum SpeechTier {
    Synthesize(Arc<dyn SpeechBackend>),
    /// Silent audio of the segment's planned duration. Never fails.
    Placeholder,
}

impl SpeechTier {
    pub fn name(&self) -> &str {
        match self {
            SpeechTier::Synthesize(b) => b.name(),
            SpeechTier::Placeholder => "placeholder",
        }
    }
}

impl fmt::Debug for SpeechTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpeechTier({})", self.name())
    }
}

/// One tier of the image fallback chain.
#[derive(Clone)]
pub enum ImageTier {
    Fetch(Arc<dyn ImageFetcher>),
    Generate(Arc<dyn ImageGenerator>),
    /// Gradient image tagged with the segment index. Never fails.
    Placeholder,
}

impl ImageTier {
    pub fn name(&self) -> &str {
        match self {
            ImageTier::Fetch(b) => b.name(),
            ImageTier::Generate(b) => b.name(),
            ImageTier::Placeholder => "placeholder",
        }
    }
}

impl fmt::Debug for ImageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageTier({})", self.name())
    }
}

/// The audio and image fallback chains of a run. Both always end in a placeholder.
#[derive(Debug, Clone)]
pub struct Backends {
    speech: Vec<SpeechTier>,
    images: Vec<ImageTier>,
}

impl Backends {
    /// Build chains from explicit tiers. Placeholders anywhere but the end are
    /// dropped and a final placeholder is appended.
    pub fn new(speech: Vec<SpeechTier>, images: Vec<ImageTier>) -> Self {
        let mut speech: Vec<_> = speech
            .into_iter()
            .filter(|t| !matches!(t, SpeechTier::Placeholder))
            .collect();
        speech.push(SpeechTier::Placeholder);
        let mut images: Vec<_> = images
            .into_iter()
            .filter(|t| !matches!(t, ImageTier::Placeholder))
            .collect();
        images.push(ImageTier::Placeholder);
        Self { speech, images }
    }

    /// Chains that go straight to placeholders.
    pub fn placeholders_only() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Select the concrete backends named by the run-wide policy.
    ///
    /// `stock` tries the keyed stock APIs (Pexels, Pixabay, Unsplash) then
    /// Openverse and Picsum. `web` skips the keyed APIs. `generate` is the
    /// local diffusion command then Picsum.
    pub fn from_config(config: &ReelConfig, scratch_dir: &Path) -> ReelResult<Self> {
        let assets = &config.assets;
        let client = http_client(assets.request_timeout_seconds)?;

        let speech = match assets.speech_engine {
            SpeechEngine::Piper => vec![SpeechTier::Synthesize(Arc::new(PiperSpeech::new(
                assets.piper.clone(),
                scratch_dir.join("piper"),
            )))],
            SpeechEngine::OpenAi => vec![SpeechTier::Synthesize(Arc::new(OpenAiSpeech::new(
                client.clone(),
                assets.openai.clone(),
            )))],
            SpeechEngine::Silent => Vec::new(),
        };

        let picsum = ImageTier::Fetch(Arc::new(PicsumFetcher::new(client.clone())));
        let images = match assets.image_source {
            ImageSource::Stock => vec![
                ImageTier::Fetch(Arc::new(PexelsFetcher::new(
                    client.clone(),
                    assets.pexels_api_key_env.clone(),
                ))),
                ImageTier::Fetch(Arc::new(PixabayFetcher::new(
                    client.clone(),
                    assets.pixabay_api_key_env.clone(),
                ))),
                ImageTier::Fetch(Arc::new(UnsplashFetcher::new(
                    client.clone(),
                    assets.unsplash_api_key_env.clone(),
                ))),
                ImageTier::Fetch(Arc::new(OpenverseFetcher::new(client))),
                picsum,
            ],
            ImageSource::Web => vec![
                ImageTier::Fetch(Arc::new(OpenverseFetcher::new(client))),
                picsum,
            ],
            ImageSource::Generate => vec![
                ImageTier::Generate(Arc::new(DiffusionGenerator::new(
                    assets.diffusion.clone(),
                    scratch_dir.join("diffusion"),
                ))),
                picsum,
            ],
        };

        Ok(Self::new(speech, images))
    }

    pub fn speech(&self) -> &[SpeechTier] {
        &self.speech
    }

    pub fn images(&self) -> &[ImageTier] {
        &self.images
    }

    /// Human-readable chains, e.g. `speech: piper > placeholder`.
    pub fn describe(&self) -> String {
        let speech: Vec<&str> = self.speech.iter().map(|t| t.name()).collect();
        let images: Vec<&str> = self.images.iter().map(|t| t.name()).collect();
        format!(
            "speech: {}; images: {}",
            speech.join(" > "),
            images.join(" > ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chains_for(source: ImageSource, engine: SpeechEngine) -> String {
        let mut config = ReelConfig::default();
        config.assets.image_source = source;
        config.assets.speech_engine = engine;
        Backends::from_config(&config, Path::new("/tmp/reelforge-test"))
            .unwrap()
            .describe()
    }

    #[test]
    fn test_policy_selects_chains() {
        assert_eq!(
            chains_for(ImageSource::Stock, SpeechEngine::Piper),
            "speech: piper > placeholder; images: pexels > pixabay > unsplash > openverse > picsum > placeholder"
        );
        assert_eq!(
            chains_for(ImageSource::Web, SpeechEngine::OpenAi),
            "speech: openai-tts > placeholder; images: openverse > picsum > placeholder"
        );
        assert_eq!(
            chains_for(ImageSource::Generate, SpeechEngine::Silent),
            "speech: placeholder; images: diffusion > picsum > placeholder"
        );
    }

    #[test]
    fn test_placeholder_always_last() {
        let backends = Backends::new(
            vec![SpeechTier::Placeholder],
            vec![ImageTier::Placeholder, ImageTier::Placeholder],
        );
        assert_eq!(backends.speech().len(), 1);
        assert_eq!(backends.images().len(), 1);
        assert!(matches!(backends.images()[0], ImageTier::Placeholder));
    }
}
