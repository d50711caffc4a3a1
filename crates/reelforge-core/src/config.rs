use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelError, ReelResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Speaking rate used to estimate missing segment durations.
    pub words_per_second: f64,
    pub min_segment_seconds: f64,
    pub max_segment_seconds: f64,
    /// Relative deviation between planned and realized audio that triggers a retime.
    pub realized_tolerance: f64,
    /// Total above `target * long_factor` is reported as a deviation.
    pub long_factor: f64,
    /// Total below `target * short_factor` is reported as a deviation.
    pub short_factor: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            words_per_second: 2.5,
            min_segment_seconds: 1.0,
            max_segment_seconds: 12.0,
            realized_tolerance: 0.15,
            long_factor: 1.25,
            short_factor: 0.5,
        }
    }
}

impl TimingConfig {
    /// Check the bounds the Timing Engine relies on.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("words_per_second", self.words_per_second),
            ("min_segment_seconds", self.min_segment_seconds),
            ("max_segment_seconds", self.max_segment_seconds),
            ("long_factor", self.long_factor),
            ("short_factor", self.short_factor),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("timing.{} must be a positive number, got {}", name, value));
            }
        }
        if !self.realized_tolerance.is_finite() || self.realized_tolerance < 0.0 {
            return Err(format!(
                "timing.realized_tolerance must be zero or positive, got {}",
                self.realized_tolerance
            ));
        }
        if self.min_segment_seconds > self.max_segment_seconds {
            return Err(format!(
                "timing.min_segment_seconds ({}) exceeds timing.max_segment_seconds ({})",
                self.min_segment_seconds, self.max_segment_seconds
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptionConfig {
    pub enabled: bool,
    pub max_chars: usize,
    pub font_size: u32,
    pub font_file: Option<String>,
    pub position: CaptionPosition,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: 40,
            font_size: 70,
            font_file: None,
            position: CaptionPosition::Center,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositionConfig {
    pub crossfade_seconds: f64,
    pub terminal_fade_seconds: f64,
    /// Peak scale reached by the pan/zoom motion.
    pub zoom_factor: f64,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            crossfade_seconds: 0.3,
            terminal_fade_seconds: 0.5,
            zoom_factor: 1.15,
        }
    }
}

/// Run-wide image acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Keyed stock APIs (Pexels, Pixabay, Unsplash), then Openverse and Picsum.
    #[default]
    Stock,
    /// Keyless sources only: Openverse, then Picsum.
    Web,
    /// Local diffusion model, then Picsum.
    Generate,
}

impl std::str::FromStr for ImageSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(ImageSource::Stock),
            "web" => Ok(ImageSource::Web),
            "generate" => Ok(ImageSource::Generate),
            other => Err(format!("unknown image source: {} (expected stock|web|generate)", other)),
        }
    }
}

/// Run-wide speech synthesis policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechEngine {
    /// Local Piper binary, then the OpenAI-compatible endpoint when a key is configured.
    #[default]
    Piper,
    /// OpenAI-compatible endpoint, then Piper.
    OpenAi,
    /// Silent placeholder audio only.
    Silent,
}

impl std::str::FromStr for SpeechEngine {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "piper" => Ok(SpeechEngine::Piper),
            "openai" => Ok(SpeechEngine::OpenAi),
            "silent" => Ok(SpeechEngine::Silent),
            other => Err(format!("unknown speech engine: {} (expected piper|openai|silent)", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PiperConfig {
    pub binary: String,
    pub model: String,
    /// Speech speed multiplier (1.2 = 20% faster).
    pub speed: f64,
    /// Piper is a local model; when true it takes the heavy-step permit.
    pub heavy: bool,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            binary: "piper".to_string(),
            model: "en_US-lessac-medium".to_string(),
            speed: 1.2,
            heavy: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiSpeechConfig {
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub api_key_env: String,
}

impl Default for OpenAiSpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini-tts".to_string(),
            voice: "alloy".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiffusionConfig {
    /// Command template; `{prompt}` and `{output}` are substituted per image.
    pub command: Vec<String>,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "sd".to_string(),
                "--prompt".to_string(),
                "{prompt}".to_string(),
                "--output".to_string(),
                "{output}".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetsConfig {
    pub image_source: ImageSource,
    pub speech_engine: SpeechEngine,
    /// Upper bound on concurrent network-bound backend calls.
    pub fetch_concurrency: usize,
    pub retry_backoff_ms: u64,
    pub request_timeout_seconds: u64,
    pub cache_dir: String,
    pub pexels_api_key_env: String,
    #[serde(default = "default_pixabay_key_env")]
    pub pixabay_api_key_env: String,
    #[serde(default = "default_unsplash_key_env")]
    pub unsplash_api_key_env: String,
    #[serde(default)]
    pub piper: PiperConfig,
    #[serde(default)]
    pub openai: OpenAiSpeechConfig,
    #[serde(default)]
    pub diffusion: DiffusionConfig,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            image_source: ImageSource::Stock,
            speech_engine: SpeechEngine::Piper,
            fetch_concurrency: 4,
            retry_backoff_ms: 500,
            request_timeout_seconds: 30,
            cache_dir: "~/.reelforge/cache".to_string(),
            pexels_api_key_env: "PEXELS_API_KEY".to_string(),
            pixabay_api_key_env: default_pixabay_key_env(),
            unsplash_api_key_env: default_unsplash_key_env(),
            piper: PiperConfig::default(),
            openai: OpenAiSpeechConfig::default(),
            diffusion: DiffusionConfig::default(),
        }
    }
}

fn default_pixabay_key_env() -> String {
    "PIXABAY_API_KEY".to_string()
}

fn default_unsplash_key_env() -> String {
    "UNSPLASH_ACCESS_KEY".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NarrationProvider {
    /// OpenAI-compatible chat completion endpoint.
    #[default]
    Llm,
    /// Deterministic offline script built from the input's key points.
    Template,
}

impl std::str::FromStr for NarrationProvider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(NarrationProvider::Llm),
            "template" => Ok(NarrationProvider::Template),
            other => Err(format!("unknown narrator: {} (expected llm|template)", other)),
        }
    }
}

/// Tone of the drafted narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NarrationStyle {
    #[default]
    Informational,
    Explainer,
    News,
    Reaction,
}

impl NarrationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationStyle::Informational => "informational",
            NarrationStyle::Explainer => "explainer",
            NarrationStyle::News => "news",
            NarrationStyle::Reaction => "reaction",
        }
    }
}

impl std::fmt::Display for NarrationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NarrationStyle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "informational" => Ok(NarrationStyle::Informational),
            "explainer" => Ok(NarrationStyle::Explainer),
            "news" => Ok(NarrationStyle::News),
            "reaction" => Ok(NarrationStyle::Reaction),
            other => Err(format!(
                "unknown style: {} (expected informational|explainer|news|reaction)",
                other
            )),
        }
    }
}

/// Web research ahead of drafting (`--research`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchConfig {
    pub enabled: bool,
    /// HTML search endpoint taking a form-encoded `q`.
    pub search_url: String,
    /// Sites queried in the second, news-only search.
    pub news_sites: Vec<String>,
    pub max_sources: usize,
    /// Articles downloaded for fact extraction; the rest contribute snippets only.
    pub max_articles: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            news_sites: vec![
                "reuters.com".to_string(),
                "apnews.com".to_string(),
                "bbc.com".to_string(),
            ],
            max_sources: 8,
            max_articles: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NarrationConfig {
    pub provider: NarrationProvider,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// A locally hosted model shares the heavy-step permit with image generation.
    pub heavy: bool,
    pub temperature: f64,
    #[serde(default)]
    pub style: NarrationStyle,
    #[serde(default)]
    pub research: ResearchConfig,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            provider: NarrationProvider::Llm,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key_env: "REELFORGE_LLM_API_KEY".to_string(),
            heavy: true,
            temperature: 0.7,
            style: NarrationStyle::Informational,
            research: ResearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub work_dir: String,
    pub keep_intermediate: bool,
    pub persist_intermediate: bool,
    pub deadline_seconds: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: "outputs/.work".to_string(),
            keep_intermediate: false,
            persist_intermediate: true,
            deadline_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ReelConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub captions: CaptionConfig,
    #[serde(default)]
    pub composition: CompositionConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ReelConfig {
    pub fn load_from_file(path: &Path) -> ReelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ReelError::config(e.to_string(), path))?;
        config.validate().map_err(|e| ReelError::config(e, path))?;
        Ok(config)
    }

    /// Reject values that would break timing, rendering or fetching.
    pub fn validate(&self) -> Result<(), String> {
        self.timing.validate()?;
        if self.output.width == 0 || self.output.height == 0 || self.output.fps == 0 {
            return Err(format!(
                "output size and fps must be non-zero, got {}x{} @ {}",
                self.output.width, self.output.height, self.output.fps
            ));
        }
        if self.assets.fetch_concurrency == 0 {
            return Err("assets.fetch_concurrency must be at least 1".to_string());
        }
        if self.captions.max_chars == 0 {
            return Err("captions.max_chars must be at least 1".to_string());
        }
        if self.narration.research.enabled && self.narration.research.max_sources == 0 {
            return Err("narration.research.max_sources must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> ReelResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ReelError::config(e.to_string(), path))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Asset cache root with a leading `~` expanded to the home directory.
    pub fn cache_root(&self) -> ReelResult<PathBuf> {
        expand_tilde(&self.assets.cache_dir)
    }
}

/// Expand a leading `~` or `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> ReelResult<PathBuf> {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ReelError::config("failed to resolve home dir", path))?;
        if path == "~" {
            return Ok(home);
        }
        return Ok(home.join(path.trim_start_matches("~/")));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_vertical_reel() {
        let config = ReelConfig::default();
        assert_eq!(config.output.width, 1080);
        assert_eq!(config.output.height, 1920);
        assert_eq!(config.captions.max_chars, 40);
        assert_eq!(config.assets.fetch_concurrency, 4);
        assert!((config.timing.max_segment_seconds - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ReelConfig = toml::from_str(
            r#"
            [assets]
            image_source = "generate"
            speech_engine = "silent"
            fetch_concurrency = 2
            retry_backoff_ms = 10
            request_timeout_seconds = 5
            cache_dir = "/tmp/reel-cache"
            pexels_api_key_env = "PEXELS"
            "#,
        )
        .unwrap();
        assert_eq!(config.assets.image_source, ImageSource::Generate);
        assert_eq!(config.assets.speech_engine, SpeechEngine::Silent);
        assert_eq!(config.assets.piper.binary, "piper");
        assert_eq!(config.output.fps, 30);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");
        let mut config = ReelConfig::default();
        config.captions.max_chars = 32;
        config.save_to_file(&path).unwrap();
        let loaded = ReelConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.captions.max_chars, 32);
    }

    #[test]
    fn test_policy_flags_parse() {
        assert_eq!("WEB".parse::<ImageSource>().unwrap(), ImageSource::Web);
        assert_eq!("openai".parse::<SpeechEngine>().unwrap(), SpeechEngine::OpenAi);
        assert!("bogus".parse::<NarrationProvider>().is_err());
        assert_eq!("News".parse::<NarrationStyle>().unwrap(), NarrationStyle::News);
        assert!("viral".parse::<NarrationStyle>().is_err());
    }

    #[test]
    fn test_style_and_research_default_when_absent() {
        let config: ReelConfig = toml::from_str(
            r#"
            [narration]
            provider = "template"
            base_url = "http://localhost:11434"
            model = "llama3.2:3b"
            api_key_env = "KEY"
            heavy = false
            temperature = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.narration.style, NarrationStyle::Informational);
        assert!(!config.narration.research.enabled);
        assert_eq!(config.narration.research.max_sources, 8);
        assert_eq!(config.assets.pixabay_api_key_env, "PIXABAY_API_KEY");
    }

    #[test]
    fn test_inverted_segment_bounds_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");
        std::fs::write(
            &path,
            r#"
            [timing]
            words_per_second = 2.5
            min_segment_seconds = 5.0
            max_segment_seconds = 3.0
            realized_tolerance = 0.15
            long_factor = 1.25
            short_factor = 0.5
            "#,
        )
        .unwrap();
        let err = ReelConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains("min_segment_seconds"));
    }

    #[test]
    fn test_timing_validation() {
        assert!(TimingConfig::default().validate().is_ok());

        let mut timing = TimingConfig::default();
        timing.words_per_second = 0.0;
        assert!(timing.validate().is_err());

        let mut timing = TimingConfig::default();
        timing.max_segment_seconds = f64::NAN;
        assert!(timing.validate().is_err());

        let mut timing = TimingConfig::default();
        timing.min_segment_seconds = 12.0;
        assert!(timing.validate().is_ok());
    }

    #[test]
    fn test_expand_tilde_home() {
        let p = expand_tilde("~").unwrap();
        assert!(p.is_absolute());
        assert_eq!(expand_tilde("/abs/path").unwrap(), PathBuf::from("/abs/path"));
    }
}
