//! The pipeline orchestrator: one supervised run from input to output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use reelforge_assets::{AssetCache, AssetResolver, Backends, CancelToken, HeavyPermit};
use reelforge_core::{expand_tilde, ReelConfig, ReelError, ReelResult};
use reelforge_encode::{CaptionOverlay, FfmpegRenderer, Renderer};
use reelforge_ir::{AssetSet, CaptionTrack, CompositionPlan, PlanSettings, Script, Timeline, TimingPolicy};

use crate::input::InputDocument;
use crate::narration::{narrator_from_config, NarrationSource};
use crate::persist::WorkDir;
use crate::report::{RunReport, RunWarning};
use crate::safety::SafetyChecker;
use crate::state::{FailureReason, RunState};

/// What a run starts from.
#[derive(Debug, Clone)]
pub enum RunInput {
    /// Parsed user input; the narration source drafts the script.
    Document(InputDocument),
    /// A ready script; `Scripting` only checks it.
    Script(Script),
}

pub struct Orchestrator {
    config: ReelConfig,
    narrator: Arc<dyn NarrationSource>,
    backends: Backends,
    renderer: Arc<dyn Renderer>,
    cache: Option<AssetCache>,
    heavy: HeavyPermit,
    safety: SafetyChecker,
}

impl Orchestrator {
    pub fn new(
        config: ReelConfig,
        narrator: Arc<dyn NarrationSource>,
        backends: Backends,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config,
            narrator,
            backends,
            renderer,
            cache: None,
            heavy: HeavyPermit::new(),
            safety: SafetyChecker::default(),
        }
    }

    /// Orchestrator with the narrator, backends, cache and FFmpeg renderer named by `config`.
    pub fn from_config(config: ReelConfig) -> ReelResult<Self> {
        let scratch = expand_tilde(&config.pipeline.work_dir)?.join("scratch");
        let backends = Backends::from_config(&config, &scratch)?;
        let narrator = narrator_from_config(&config)?;
        let renderer = Arc::new(FfmpegRenderer::new(CaptionOverlay::from(&config.captions)));
        let cache = AssetCache::new(config.cache_root()?);
        Ok(Self::new(config, narrator, backends, renderer).with_cache(Some(cache)))
    }

    pub fn with_cache(mut self, cache: Option<AssetCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_safety(mut self, safety: SafetyChecker) -> Self {
        self.safety = safety;
        self
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// Draft a script from `doc`, holding the heavy permit when the narrator
    /// runs a local model.
    pub async fn draft(&self, doc: &InputDocument, cancel: &CancelToken) -> ReelResult<Script> {
        let _permit = if self.narrator.is_heavy() {
            Some(tokio::select! {
                permit = self.heavy.acquire() => permit?,
                _ = cancel.cancelled() => return Err(cancelled_error(cancel)),
            })
        } else {
            None
        };

        info!(narrator = self.narrator.name(), title = %doc.title, "drafting script");
        tokio::select! {
            script = self.narrator.draft_script(doc, doc.target_seconds) => script,
            _ = cancel.cancelled() => Err(cancelled_error(cancel)),
        }
    }

    /// Execute a whole run.
    ///
    /// Never returns an error: the report's final state is either `Done`, with
    /// the output written, or `Failed` with the fatal error kind and no output.
    pub async fn run(&self, input: RunInput, output: &Path, cancel: &CancelToken) -> RunReport {
        let mut report = RunReport::new();
        let mut work = None;
        info!(run_id = %report.run_id, output = %output.display(), "starting run");

        match self.execute(input, output, cancel, &mut report, &mut work).await {
            Ok(()) => {
                enter(&mut report, RunState::Done);
                info!(
                    run_id = %report.run_id,
                    warnings = report.warnings.len(),
                    placeholders = report.placeholder_assets,
                    "run finished"
                );
            }
            Err(e) => {
                error!(run_id = %report.run_id, kind = e.kind(), "run failed: {}", e);
                enter(&mut report, RunState::Failed(FailureReason::from(&e)));
            }
        }

        if let Some(work) = work {
            if self.config.pipeline.keep_intermediate {
                info!(path = %work.path().display(), "keeping intermediate files");
            } else {
                work.dispose();
            }
        }
        report.finished_at = Some(Utc::now());
        report
    }

    async fn execute(
        &self,
        input: RunInput,
        output: &Path,
        cancel: &CancelToken,
        report: &mut RunReport,
        work: &mut Option<WorkDir>,
    ) -> ReelResult<()> {
        cancel.checkpoint()?;
        let base = expand_tilde(&self.config.pipeline.work_dir)?;
        let dir = WorkDir::create(&base, &report.run_id.to_string())?;
        let persist = self.config.pipeline.persist_intermediate;
        *work = Some(dir.clone());

        enter(report, RunState::Scripting);
        let script = match input {
            RunInput::Script(script) => script,
            RunInput::Document(doc) => self.draft(&doc, cancel).await?,
        };
        report.target_duration = Some(script.target_duration);
        // Rejected content never reaches timing or any generator.
        for message in self.safety.check_script(&script)? {
            report.warn(RunWarning::Safety { message });
        }
        if persist {
            dir.write_script(&script)?;
        }
        cancel.checkpoint()?;

        enter(report, RunState::Timing);
        let policy = TimingPolicy::from(&self.config.timing);
        let timeline = Timeline::compute_with(&script, &policy)?;
        if let Some(deviation) = timeline.deviation() {
            report.warn(RunWarning::Deviation(deviation.clone()));
        }
        cancel.checkpoint()?;

        enter(report, RunState::Resolving);
        let resolution = self
            .resolver(dir.path().join("assets"))
            .resolve(&script, &timeline, cancel)
            .await?;
        report.placeholder_assets = resolution.assets.placeholder_count();
        for warning in resolution.warnings {
            report.warn(RunWarning::Asset(warning));
        }
        // A cancelled run still ends with a complete, degraded asset set.
        cancel.checkpoint()?;

        let planned: Vec<f64> = timeline.entries().iter().map(|e| e.duration()).collect();
        let realized = resolution.assets.realized_durations(&planned);
        let (timeline, retimed) = timeline.retime(&realized, &policy)?;
        if !retimed.is_empty() {
            info!(segments = retimed.len(), total = timeline.total(), "timeline retimed");
            if let Some(deviation) = timeline.deviation() {
                let known = report
                    .warnings
                    .iter()
                    .any(|w| matches!(w, RunWarning::Deviation(d) if d == deviation));
                if !known {
                    report.warn(RunWarning::Deviation(deviation.clone()));
                }
            }
        }
        for segment in retimed {
            report.warn(RunWarning::Retimed(segment));
        }
        if persist {
            dir.write_timeline(&timeline)?;
        }

        enter(report, RunState::Captioning);
        let captions = CaptionTrack::compile(&script, &timeline, self.config.captions.max_chars);
        if persist {
            dir.write_captions(&captions)?;
        }

        enter(report, RunState::Planning);
        let settings = PlanSettings::from_config(&self.config);
        let plan = CompositionPlan::build(&timeline, &resolution.assets, &captions, &settings)?;
        if persist {
            dir.write_plan(&plan)?;
        }
        cancel.checkpoint()?;

        enter(report, RunState::Rendering);
        let total = plan.total_duration;
        self.render(plan, resolution.assets, output).await?;
        report.output = Some(output.to_path_buf());
        report.total_duration = Some(total);
        Ok(())
    }

    fn resolver(&self, work_dir: PathBuf) -> AssetResolver {
        let assets = &self.config.assets;
        AssetResolver::new(self.backends.clone(), self.heavy.clone(), work_dir)
            .with_cache(self.cache.clone())
            .with_fetch_concurrency(assets.fetch_concurrency)
            .with_retry_backoff(Duration::from_millis(assets.retry_backoff_ms))
            .with_output_size(self.config.output.width, self.config.output.height)
    }

    /// The renderer is synchronous; run it on the blocking pool.
    async fn render(&self, plan: CompositionPlan, assets: AssetSet, output: &Path) -> ReelResult<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let renderer = Arc::clone(&self.renderer);
        let target = output.to_path_buf();
        info!(
            renderer = renderer.name(),
            frames = plan.total_frames(),
            "rendering {}",
            target.display()
        );
        tokio::task::spawn_blocking(move || renderer.render(&plan, &assets, &target))
            .await
            .map_err(|e| ReelError::Render(format!("render task failed: {}", e)))?
    }
}

fn enter(report: &mut RunReport, next: RunState) {
    if !report.state.can_transition_to(&next) {
        warn!(from = %report.state, to = %next, "unexpected state transition");
    }
    info!(from = %report.state, to = %next, "run state");
    report.stages.push(next.name().to_string());
    report.state = next;
}

fn cancelled_error(cancel: &CancelToken) -> ReelError {
    ReelError::Cancelled(cancel.reason().unwrap_or_else(|| "run cancelled".into()))
}
