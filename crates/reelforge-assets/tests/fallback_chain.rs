//! Fallback-chain behaviour of the resolver against in-memory backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use reelforge_assets::{
    AssetResolver, BackendError, Backends, CancelToken, HeavyPermit, ImageFetcher, ImageGenerator,
    ImageRequest, ImageTier, Speech, SpeechBackend, SpeechTier,
};
use reelforge_encode::placeholder::silent_audio;
use reelforge_ir::{AssetType, Script, Segment, SourceKind, Timeline};

struct BrokenSpeech;

#[async_trait]
impl SpeechBackend for BrokenSpeech {
    fn name(&self) -> &str {
        "broken-tts"
    }

    async fn synthesize(&self, _text: &str) -> Result<Speech, BackendError> {
        Err(BackendError::permanent("voice model missing"))
    }
}

struct BrokenFetcher;

#[async_trait]
impl ImageFetcher for BrokenFetcher {
    fn name(&self) -> &str {
        "broken-stock"
    }

    async fn fetch(&self, _request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::transient("connection reset"))
    }
}

/// Never finishes on its own; only cancellation gets past it.
struct HangingSpeech;

#[async_trait]
impl SpeechBackend for HangingSpeech {
    fn name(&self) -> &str {
        "hanging-tts"
    }

    async fn synthesize(&self, _text: &str) -> Result<Speech, BackendError> {
        std::future::pending().await
    }
}

/// Records the highest number of overlapping generate calls.
#[derive(Default)]
struct CountingGenerator {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for CountingGenerator {
    fn name(&self) -> &str {
        "counting-diffusion"
    }

    async fn generate(&self, _request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0])
    }
}

/// Network-style fetcher that records how many calls overlap.
#[derive(Default)]
struct CountingFetcher {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ImageFetcher for CountingFetcher {
    fn name(&self) -> &str {
        "counting-stock"
    }

    async fn fetch(&self, _request: &ImageRequest) -> Result<Vec<u8>, BackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0xff, 0xd8, 0xff, 0xe0])
    }
}

struct QuickSpeech;

#[async_trait]
impl SpeechBackend for QuickSpeech {
    fn name(&self) -> &str {
        "quick-tts"
    }

    async fn synthesize(&self, text: &str) -> Result<Speech, BackendError> {
        let seconds = text.split_whitespace().count() as f64 * 0.5;
        Ok(Speech {
            bytes: silent_audio(seconds),
            duration: seconds,
            extension: "wav",
        })
    }
}

fn three_segments() -> (Script, Timeline) {
    let mut script = Script::new(9.0);
    script.add_segment(Segment::hook("Wait for it").with_duration(2.0).with_visual("a ticking clock"));
    script.add_segment(
        Segment::narration("Octopuses have three hearts")
            .with_duration(3.5)
            .with_visual("octopus underwater, vibrant colors"),
    );
    script.add_segment(
        Segment::narration("And blue blood")
            .with_duration(3.5)
            .with_visual("blue liquid in a glass"),
    );
    let timeline = Timeline::compute(&script).unwrap();
    (script, timeline)
}

#[tokio::test]
async fn test_total_backend_failure_still_populates_every_segment() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let backends = Backends::new(
        vec![SpeechTier::Synthesize(Arc::new(BrokenSpeech))],
        vec![ImageTier::Fetch(Arc::new(BrokenFetcher))],
    );
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path())
        .with_retry_backoff(Duration::from_millis(1))
        .with_output_size(36, 64)
        .with_images_per_segment(2);

    let resolution = resolver
        .resolve(&script, &timeline, &CancelToken::new())
        .await
        .unwrap();

    for entry in timeline.entries() {
        assert_eq!(resolution.assets.count_for(entry.index, AssetType::Audio), 1);
        assert_eq!(resolution.assets.count_for(entry.index, AssetType::Image), 2);
        let audio = resolution.assets.audio_for(entry.index).unwrap();
        assert!(audio.is_placeholder());
        assert!((audio.duration.unwrap() - entry.duration()).abs() < 1e-9);
        assert!(audio.path.exists());
        for image in resolution.assets.images_for(entry.index) {
            assert!(image.is_placeholder());
            assert!(image.path.exists());
        }
    }
    assert_eq!(resolution.assets.placeholder_count(), 9);

    let kinds: Vec<&str> = resolution.warnings.iter().map(|w| w.kind.as_str()).collect();
    assert!(kinds.contains(&"synthesis"));
    assert!(kinds.contains(&"fetch"));
    assert!(kinds.contains(&"placeholder"));
}

#[tokio::test]
async fn test_silent_engine_resolves_without_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let resolver = AssetResolver::new(Backends::placeholders_only(), HeavyPermit::new(), dir.path())
        .with_output_size(36, 64);

    let resolution = resolver
        .resolve(&script, &timeline, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.assets.count(), 6);
    assert!(resolution.warnings.is_empty());
}

#[tokio::test]
async fn test_cancellation_substitutes_placeholders_for_in_flight_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let backends = Backends::new(
        vec![SpeechTier::Synthesize(Arc::new(HangingSpeech))],
        vec![ImageTier::Placeholder],
    );
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path()).with_output_size(36, 64);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel("interrupted by user");
    });

    let resolution = tokio::time::timeout(
        Duration::from_secs(5),
        resolver.resolve(&script, &timeline, &cancel),
    )
    .await
    .expect("cancellation must unblock resolution")
    .unwrap();

    for entry in timeline.entries() {
        let audio = resolution.assets.audio_for(entry.index).unwrap();
        assert!(audio.is_placeholder());
    }
    assert!(resolution
        .warnings
        .iter()
        .any(|w| w.message.contains("interrupted by user")));
}

#[tokio::test]
async fn test_deadline_in_the_past_skips_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let backends = Backends::new(
        vec![SpeechTier::Synthesize(Arc::new(HangingSpeech))],
        vec![ImageTier::Fetch(Arc::new(BrokenFetcher))],
    );
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path()).with_output_size(36, 64);
    let cancel = CancelToken::with_deadline(Duration::ZERO);

    let resolution = resolver.resolve(&script, &timeline, &cancel).await.unwrap();

    assert_eq!(resolution.assets.placeholder_count(), 6);
    assert!(resolution.warnings.iter().all(|w| w.kind == "cancelled" || w.kind == "placeholder"));
}

#[tokio::test]
async fn test_heavy_generation_runs_one_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let generator = Arc::new(CountingGenerator::default());
    let backends = Backends::new(
        vec![SpeechTier::Synthesize(Arc::new(QuickSpeech))],
        vec![ImageTier::Generate(generator.clone())],
    );
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path())
        .with_fetch_concurrency(4)
        .with_images_per_segment(2);

    let resolution = resolver
        .resolve(&script, &timeline, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 6);
    assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
    for image in resolution.assets.iter().filter(|a| a.asset_type == AssetType::Image) {
        assert_eq!(image.source, SourceKind::Generated);
        assert_eq!(image.path.extension().unwrap(), "png");
    }
    // Realized durations come from the backend, not the plan.
    let audio = resolution.assets.audio_for(1).unwrap();
    assert!((audio.duration.unwrap() - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_fetches_share_bounded_slots() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let fetcher = Arc::new(CountingFetcher::default());
    let backends = Backends::new(vec![], vec![ImageTier::Fetch(fetcher.clone())]);
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path())
        .with_fetch_concurrency(2)
        .with_images_per_segment(2);

    let resolution = resolver
        .resolve(&script, &timeline, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak of {} concurrent fetches exceeds 2 slots", peak);
    assert!(peak > 1, "fetches never overlapped");
    assert_eq!(
        resolution
            .assets
            .iter()
            .filter(|a| a.asset_type == AssetType::Image && a.source == SourceKind::Fetched)
            .count(),
        6
    );
}

#[tokio::test]
async fn test_results_join_on_segment_index() {
    let dir = tempfile::tempdir().unwrap();
    let (script, timeline) = three_segments();
    let backends = Backends::new(
        vec![SpeechTier::Synthesize(Arc::new(QuickSpeech))],
        vec![ImageTier::Placeholder],
    );
    let resolver = AssetResolver::new(backends, HeavyPermit::new(), dir.path()).with_output_size(36, 64);

    let resolution = resolver
        .resolve(&script, &timeline, &CancelToken::new())
        .await
        .unwrap();

    let planned: Vec<f64> = timeline.entries().iter().map(|e| e.duration()).collect();
    let realized = resolution.assets.realized_durations(&planned);
    assert_eq!(realized, vec![1.5, 2.0, 1.5]);
}
