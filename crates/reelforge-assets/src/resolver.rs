//! Resolution of every segment's audio and images through the fallback chains.
//!
//! Segments resolve concurrently, and within a segment audio and images
//! resolve concurrently. Network-bound calls share a fixed number of fetch
//! slots; heavy local models take the process-wide [`HeavyPermit`] instead.
//! Each tier is attempted at most once per asset, with a single retry after a
//! backoff when the failure is transient.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use reelforge_core::{ReelConfig, ReelError, ReelResult};
use reelforge_encode::{placeholder, wav};
use reelforge_ir::{Asset, AssetSet, AssetType, Script, Segment, SourceKind, Timeline, TimelineEntry};

use crate::backend::{image_extension, ImageRequest};
use crate::cache::AssetCache;
use crate::cancel::CancelToken;
use crate::error::BackendError;
use crate::permit::HeavyPermit;
use crate::query::search_query;
use crate::strategy::{Backends, ImageTier, SpeechTier};

/// A degraded asset or failed backend attempt, attached to the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetWarning {
    pub segment_index: usize,
    pub asset_type: AssetType,
    pub backend: String,
    /// Error kind name (`synthesis`, `fetch`, `generation`, `cancelled`, `placeholder`).
    pub kind: String,
    pub message: String,
}

impl AssetWarning {
    fn from_error(segment_index: usize, asset_type: AssetType, backend: &str, err: &ReelError) -> Self {
        Self {
            segment_index,
            asset_type,
            backend: backend.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    fn placeholder(segment_index: usize, asset_type: AssetType) -> Self {
        Self {
            segment_index,
            asset_type,
            backend: "placeholder".to_string(),
            kind: "placeholder".to_string(),
            message: format!("placeholder {} substituted", asset_type),
        }
    }
}

impl fmt::Display for AssetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment {} {}: {}",
            self.segment_index, self.asset_type, self.message
        )
    }
}

/// Output of the Resolving stage.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub assets: AssetSet,
    pub warnings: Vec<AssetWarning>,
}

struct Resolved {
    asset: Asset,
    warnings: Vec<AssetWarning>,
}

/// Which failure constructor a capability maps backend errors onto.
#[derive(Clone, Copy)]
enum Capability {
    Speech,
    Fetch,
    Generate,
}

impl Capability {
    fn error(self, backend: &str, segment_index: usize, err: &BackendError) -> ReelError {
        if let BackendError::Cancelled(reason) = err {
            return ReelError::Cancelled(reason.clone());
        }
        let msg = format!(
            "{} failed for segment {}: {}",
            backend,
            segment_index,
            err.message()
        );
        match self {
            Capability::Speech => ReelError::Synthesis(msg),
            Capability::Fetch => ReelError::Fetch(msg),
            Capability::Generate => ReelError::Generation(msg),
        }
    }
}

pub struct AssetResolver {
    backends: Backends,
    cache: Option<AssetCache>,
    heavy: HeavyPermit,
    fetch_slots: Arc<Semaphore>,
    retry_backoff: Duration,
    work_dir: PathBuf,
    width: u32,
    height: u32,
    images_per_segment: usize,
}

impl AssetResolver {
    pub fn new(backends: Backends, heavy: HeavyPermit, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            backends,
            cache: None,
            heavy,
            fetch_slots: Arc::new(Semaphore::new(4)),
            retry_backoff: Duration::from_millis(500),
            work_dir: work_dir.into(),
            width: 1080,
            height: 1920,
            images_per_segment: 1,
        }
    }

    /// Resolver with the concurrency, backoff, output size and cache of `config`.
    pub fn from_config(
        config: &ReelConfig,
        backends: Backends,
        heavy: HeavyPermit,
        work_dir: impl Into<PathBuf>,
    ) -> ReelResult<Self> {
        Ok(Self::new(backends, heavy, work_dir)
            .with_cache(Some(AssetCache::new(config.cache_root()?)))
            .with_fetch_concurrency(config.assets.fetch_concurrency)
            .with_retry_backoff(Duration::from_millis(config.assets.retry_backoff_ms))
            .with_output_size(config.output.width, config.output.height))
    }

    pub fn with_cache(mut self, cache: Option<AssetCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fetch_concurrency(mut self, slots: usize) -> Self {
        self.fetch_slots = Arc::new(Semaphore::new(slots.max(1)));
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_images_per_segment(mut self, count: usize) -> Self {
        self.images_per_segment = count.max(1);
        self
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Resolve every segment of `timeline`.
    ///
    /// Backend failures never surface here; they become warnings and the
    /// chain moves on, ending in a placeholder. Once `cancel` fires, pending
    /// backend calls are abandoned and the remaining assets become
    /// placeholders, so the result is always complete. Only local I/O errors
    /// while writing assets are returned.
    pub async fn resolve(
        &self,
        script: &Script,
        timeline: &Timeline,
        cancel: &CancelToken,
    ) -> ReelResult<Resolution> {
        info!(
            segments = timeline.len(),
            "resolving assets ({})",
            self.backends.describe()
        );

        let mut segment_jobs = Vec::with_capacity(timeline.len());
        for entry in timeline.entries() {
            let segment = script.segments.get(entry.index).ok_or_else(|| {
                ReelError::PlanInconsistency(format!(
                    "timeline entry {} has no script segment",
                    entry.index
                ))
            })?;
            segment_jobs.push(self.resolve_segment(segment, entry, cancel));
        }

        let mut resolution = Resolution::default();
        for outcome in join_all(segment_jobs).await {
            for resolved in outcome? {
                resolution.assets.register(resolved.asset);
                resolution.warnings.extend(resolved.warnings);
            }
        }

        info!(
            assets = resolution.assets.count(),
            placeholders = resolution.assets.placeholder_count(),
            warnings = resolution.warnings.len(),
            "asset resolution finished"
        );
        Ok(resolution)
    }

    async fn resolve_segment(
        &self,
        segment: &Segment,
        entry: &TimelineEntry,
        cancel: &CancelToken,
    ) -> ReelResult<Vec<Resolved>> {
        let images = join_all(
            (0..self.images_per_segment).map(|ordinal| self.resolve_image(segment, entry, ordinal, cancel)),
        );
        let (audio, images) = tokio::join!(self.resolve_audio(segment, entry, cancel), images);

        let mut resolved = vec![audio?];
        for image in images {
            resolved.push(image?);
        }
        Ok(resolved)
    }

    async fn resolve_audio(
        &self,
        segment: &Segment,
        entry: &TimelineEntry,
        cancel: &CancelToken,
    ) -> ReelResult<Resolved> {
        let index = entry.index;
        let planned = entry.duration();
        let mut warnings = Vec::new();
        let mut attempted = false;

        for tier in self.backends.speech() {
            let SpeechTier::Synthesize(backend) = tier else {
                break;
            };
            if let Some(reason) = cancel.reason() {
                warnings.push(AssetWarning::from_error(
                    index,
                    AssetType::Audio,
                    backend.name(),
                    &ReelError::Cancelled(reason),
                ));
                break;
            }
            attempted = true;

            let key = AssetCache::key(&backend.cache_tag(), AssetType::Audio, &segment.narration);
            if let Some(path) = self.cached(AssetType::Audio, &key) {
                let duration = wav::duration_from_file(&path).ok().flatten().unwrap_or(planned);
                debug!(segment = index, backend = backend.name(), "audio cache hit");
                let asset = Asset::audio(index, SourceKind::Generated, path, duration)
                    .with_backend(backend.name());
                return Ok(Resolved { asset, warnings });
            }

            let outcome = self
                .attempt(backend.name(), backend.is_heavy(), cancel, || {
                    backend.synthesize(&segment.narration)
                })
                .await;
            match outcome {
                Ok(speech) => {
                    let path = self.persist(
                        AssetType::Audio,
                        &key,
                        &format!("seg_{:03}", index),
                        speech.extension,
                        &speech.bytes,
                    )?;
                    debug!(
                        segment = index,
                        backend = backend.name(),
                        duration = speech.duration,
                        "audio synthesized"
                    );
                    let asset = Asset::audio(index, SourceKind::Generated, path, speech.duration)
                        .with_backend(backend.name());
                    return Ok(Resolved { asset, warnings });
                }
                Err(e) => {
                    let err = Capability::Speech.error(backend.name(), index, &e);
                    warn!("{}; falling back", err);
                    warnings.push(AssetWarning::from_error(index, AssetType::Audio, backend.name(), &err));
                }
            }
        }

        let path = self.write_placeholder(
            &format!("audio_{:03}.wav", index),
            placeholder::silent_audio(planned),
        )?;
        if attempted || !warnings.is_empty() {
            warnings.push(AssetWarning::placeholder(index, AssetType::Audio));
        }
        let asset = Asset::audio(index, SourceKind::Placeholder, path, planned).with_backend("placeholder");
        Ok(Resolved { asset, warnings })
    }

    async fn resolve_image(
        &self,
        segment: &Segment,
        entry: &TimelineEntry,
        ordinal: usize,
        cancel: &CancelToken,
    ) -> ReelResult<Resolved> {
        let index = entry.index;
        let visual = segment.visual_description();
        let request = ImageRequest {
            query: search_query(visual),
            prompt: visual.to_string(),
            width: self.width,
            height: self.height,
            variant: ordinal,
        };
        let mut warnings = Vec::new();
        let mut attempted = false;

        for tier in self.backends.images() {
            let (name, tag, heavy, capability, source) = match tier {
                ImageTier::Fetch(b) => (b.name(), b.cache_tag(), false, Capability::Fetch, SourceKind::Fetched),
                ImageTier::Generate(b) => (b.name(), b.cache_tag(), b.is_heavy(), Capability::Generate, SourceKind::Generated),
                ImageTier::Placeholder => break,
            };
            if let Some(reason) = cancel.reason() {
                warnings.push(AssetWarning::from_error(
                    index,
                    AssetType::Image,
                    name,
                    &ReelError::Cancelled(reason),
                ));
                break;
            }
            attempted = true;

            let text = match capability {
                Capability::Generate => &request.prompt,
                _ => &request.query,
            };
            let key = AssetCache::image_key(&tag, text, ordinal, self.width, self.height);
            if let Some(path) = self.cached(AssetType::Image, &key) {
                debug!(segment = index, backend = name, "image cache hit");
                let asset = Asset::image(index, ordinal, source, path).with_backend(name);
                return Ok(Resolved { asset, warnings });
            }

            let outcome = match tier {
                ImageTier::Fetch(b) => self.attempt(name, heavy, cancel, || b.fetch(&request)).await,
                ImageTier::Generate(b) => self.attempt(name, heavy, cancel, || b.generate(&request)).await,
                ImageTier::Placeholder => break,
            };
            match outcome {
                Ok(bytes) => {
                    let path = self.persist(
                        AssetType::Image,
                        &key,
                        &format!("seg_{:03}_{}", index, ordinal),
                        image_extension(&bytes),
                        &bytes,
                    )?;
                    debug!(segment = index, backend = name, "image resolved");
                    let asset = Asset::image(index, ordinal, source, path).with_backend(name);
                    return Ok(Resolved { asset, warnings });
                }
                Err(e) => {
                    let err = capability.error(name, index, &e);
                    warn!("{}; falling back", err);
                    warnings.push(AssetWarning::from_error(index, AssetType::Image, name, &err));
                }
            }
        }

        let (width, height) = (self.width, self.height);
        let png = tokio::task::spawn_blocking(move || placeholder::gradient_image(width, height, index))
            .await
            .map_err(|e| ReelError::Io(std::io::Error::other(e.to_string())))??;
        let path = self.write_placeholder(&format!("image_{:03}_{}.png", index, ordinal), png)?;
        if attempted || !warnings.is_empty() {
            warnings.push(AssetWarning::placeholder(index, AssetType::Image));
        }
        let asset = Asset::image(index, ordinal, SourceKind::Placeholder, path).with_backend("placeholder");
        Ok(Resolved { asset, warnings })
    }

    /// Run one tier: take a slot, race the call against cancellation, and
    /// retry once after the backoff if the failure was transient.
    async fn attempt<T, F, Fut>(
        &self,
        backend: &str,
        heavy: bool,
        cancel: &CancelToken,
        call: F,
    ) -> Result<T, BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut retried = false;
        loop {
            let outcome = {
                let _slot = tokio::select! {
                    slot = self.slot(heavy) => slot?,
                    _ = cancel.cancelled() => return Err(cancelled(cancel)),
                };
                tokio::select! {
                    result = call() => result,
                    _ = cancel.cancelled() => Err(cancelled(cancel)),
                }
            };

            match outcome {
                Err(e) if e.is_transient() && !retried && !cancel.is_cancelled() => {
                    warn!(backend, "transient failure, retrying in {:?}: {}", self.retry_backoff, e);
                    retried = true;
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                        _ = cancel.cancelled() => return Err(cancelled(cancel)),
                    }
                }
                other => return other,
            }
        }
    }

    async fn slot(&self, heavy: bool) -> Result<OwnedSemaphorePermit, BackendError> {
        if heavy {
            self.heavy
                .acquire()
                .await
                .map_err(|e| BackendError::permanent(e.to_string()))
        } else {
            self.fetch_slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BackendError::permanent("fetch slots closed"))
        }
    }

    fn cached(&self, asset_type: AssetType, key: &str) -> Option<PathBuf> {
        self.cache.as_ref()?.lookup(asset_type, key)
    }

    /// Store backend output in the cache when there is one, else in the work dir.
    fn persist(
        &self,
        asset_type: AssetType,
        key: &str,
        stem: &str,
        extension: &str,
        bytes: &[u8],
    ) -> ReelResult<PathBuf> {
        if let Some(cache) = &self.cache {
            return cache.store(asset_type, key, extension, bytes);
        }
        let dir = self.work_dir.join(match asset_type {
            AssetType::Audio => "audio",
            AssetType::Image => "images",
        });
        write_file(&dir, &format!("{}.{}", stem, extension), bytes)
    }

    fn write_placeholder(&self, file_name: &str, bytes: Vec<u8>) -> ReelResult<PathBuf> {
        write_file(&self.work_dir.join("placeholders"), file_name, &bytes)
    }
}

fn cancelled(cancel: &CancelToken) -> BackendError {
    BackendError::Cancelled(cancel.reason().unwrap_or_else(|| "run cancelled".into()))
}

fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> ReelResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ImageFetcher, Speech, SpeechBackend};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakySpeech {
        failures: Mutex<VecDeque<BackendError>>,
        calls: AtomicUsize,
    }

    impl FlakySpeech {
        fn new(failures: Vec<BackendError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SpeechBackend for FlakySpeech {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn synthesize(&self, _text: &str) -> Result<Speech, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.failures.lock().unwrap().pop_front() {
                return Err(e);
            }
            Ok(Speech {
                bytes: placeholder::silent_audio(2.0),
                duration: 2.0,
                extension: "wav",
            })
        }
    }

    struct StaticImage;

    #[async_trait]
    impl ImageFetcher for StaticImage {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, _request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0xff, 0xd8, 0xff, 0xe0])
        }
    }

    #[derive(Default)]
    struct CountingImage {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for CountingImage {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, _request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0xff, 0xd8, 0xff, 0xe0])
        }
    }

    struct StalledSpeech;

    #[async_trait]
    impl SpeechBackend for StalledSpeech {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn synthesize(&self, _text: &str) -> Result<Speech, BackendError> {
            std::future::pending().await
        }
    }

    fn one_segment() -> (Script, Timeline) {
        let mut script = Script::new(2.0);
        script.add_segment(Segment::hook("Wait for it").with_duration(2.0).with_visual("clock"));
        let timeline = Timeline::compute(&script).unwrap();
        (script, timeline)
    }

    fn resolver(speech: Arc<FlakySpeech>, dir: &Path) -> AssetResolver {
        let backends = Backends::new(
            vec![SpeechTier::Synthesize(speech)],
            vec![ImageTier::Fetch(Arc::new(StaticImage))],
        );
        AssetResolver::new(backends, HeavyPermit::new(), dir)
            .with_retry_backoff(Duration::from_millis(1))
            .with_output_size(36, 64)
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        let speech = FlakySpeech::new(vec![BackendError::transient("timeout")]);
        let (script, timeline) = one_segment();
        let resolution = resolver(speech.clone(), dir.path())
            .resolve(&script, &timeline, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
        let audio = resolution.assets.audio_for(0).unwrap();
        assert_eq!(audio.source, SourceKind::Generated);
        assert!(resolution.warnings.is_empty());
        let image = &resolution.assets.images_for(0)[0];
        assert_eq!(image.source, SourceKind::Fetched);
        assert_eq!(image.path.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_second_transient_failure_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let speech = FlakySpeech::new(vec![
            BackendError::transient("timeout"),
            BackendError::transient("timeout again"),
        ]);
        let (script, timeline) = one_segment();
        let resolution = resolver(speech.clone(), dir.path())
            .resolve(&script, &timeline, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
        assert!(resolution.assets.audio_for(0).unwrap().is_placeholder());
        assert_eq!(resolution.warnings[0].kind, "synthesis");
        assert_eq!(resolution.warnings.last().unwrap().kind, "placeholder");
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let speech = FlakySpeech::new(vec![BackendError::permanent("bad key")]);
        let (script, timeline) = one_segment();
        let resolution = resolver(speech.clone(), dir.path())
            .resolve(&script, &timeline, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
        let audio = resolution.assets.audio_for(0).unwrap();
        assert!(audio.is_placeholder());
        assert_eq!(audio.duration, Some(2.0));
        let bytes = std::fs::read(&audio.path).unwrap();
        assert!((wav::duration_from_bytes(&bytes).unwrap() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path().join("cache"));
        let (script, timeline) = one_segment();

        let first = FlakySpeech::new(vec![]);
        resolver(first.clone(), dir.path())
            .with_cache(Some(cache.clone()))
            .resolve(&script, &timeline, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);

        let second = FlakySpeech::new(vec![]);
        let resolution = resolver(second.clone(), dir.path())
            .with_cache(Some(cache))
            .resolve(&script, &timeline, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        let audio = resolution.assets.audio_for(0).unwrap();
        assert_eq!(audio.source, SourceKind::Generated);
        assert!((audio.duration.unwrap() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancel_mid_call_reports_cancelled_kind() {
        let dir = tempfile::tempdir().unwrap();
        let backends = Backends::new(
            vec![SpeechTier::Synthesize(Arc::new(StalledSpeech))],
            vec![ImageTier::Fetch(Arc::new(StaticImage))],
        );
        let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path()).with_output_size(36, 64);
        let (script, timeline) = one_segment();
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel("deadline reached");
        });

        let resolution = resolver.resolve(&script, &timeline, &cancel).await.unwrap();

        assert!(resolution.assets.audio_for(0).unwrap().is_placeholder());
        let audio_warnings: Vec<&AssetWarning> = resolution
            .warnings
            .iter()
            .filter(|w| w.asset_type == AssetType::Audio)
            .collect();
        assert_eq!(audio_warnings[0].kind, "cancelled");
        assert_eq!(audio_warnings[0].backend, "stalled");
        assert!(audio_warnings[0].message.contains("deadline reached"));
        assert!(!resolution.warnings.iter().any(|w| w.kind == "synthesis"));
    }

    #[tokio::test]
    async fn test_image_cache_is_keyed_by_output_size() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path().join("cache"));
        let images = Arc::new(CountingImage::default());
        let (script, timeline) = one_segment();
        let resolver_at = |width, height| {
            let backends = Backends::new(vec![], vec![ImageTier::Fetch(images.clone())]);
            AssetResolver::new(backends, HeavyPermit::new(), dir.path())
                .with_cache(Some(cache.clone()))
                .with_output_size(width, height)
        };

        for (width, height) in [(36, 64), (36, 64), (72, 128)] {
            resolver_at(width, height)
                .resolve(&script, &timeline, &CancelToken::new())
                .await
                .unwrap();
        }
        // The repeat at 36x64 hits the cache; the new size does not.
        assert_eq!(images.calls.load(Ordering::SeqCst), 2);
    }
}
