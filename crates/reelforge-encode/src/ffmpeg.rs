use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use reelforge_core::{CaptionConfig, CaptionPosition, ReelError, ReelResult};
use reelforge_ir::{
    AssetSet, Caption, CaptionStyle, CompositionPlan, Motion, RenderInstruction, TerminalDirective,
};

use crate::Renderer;

/// How caption overlays are burned into the video.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionOverlay {
    pub enabled: bool,
    pub font_size: u32,
    pub font_file: Option<String>,
    pub position: CaptionPosition,
}

impl From<&CaptionConfig> for CaptionOverlay {
    fn from(config: &CaptionConfig) -> Self {
        Self {
            enabled: config.enabled,
            font_size: config.font_size,
            font_file: config.font_file.clone(),
            position: config.position,
        }
    }
}

impl Default for CaptionOverlay {
    fn default() -> Self {
        Self::from(&CaptionConfig::default())
    }
}

impl CaptionOverlay {
    fn y_expr(&self) -> &'static str {
        match self.position {
            CaptionPosition::Top => "200",
            CaptionPosition::Center => "(h-text_h)/2",
            CaptionPosition::Bottom => "h-300",
        }
    }

    /// `drawtext` filter for one caption, visible only inside its interval.
    ///
    /// Hook captions are drawn 1.3x larger with a yellow border.
    pub fn drawtext(&self, caption: &Caption) -> String {
        let (size, border, border_color) = match caption.style() {
            CaptionStyle::Hook => ((f64::from(self.font_size) * 1.3).round() as u32, 5, "yellow"),
            CaptionStyle::Normal => (self.font_size, 3, "black"),
        };

        let mut params = vec![
            format!("text='{}'", escape_drawtext(&caption.text)),
            format!("fontsize={}", size),
            "fontcolor=white".to_string(),
            format!("borderw={}", border),
            format!("bordercolor={}", border_color),
            "x=(w-text_w)/2".to_string(),
            format!("y={}", self.y_expr()),
            // Half-open like the caption interval; `between` would also show
            // the caption on the first frame of its successor.
            format!(
                "enable='gte(t,{})*lt(t,{})'",
                secs(caption.start),
                secs(caption.end)
            ),
        ];
        if let Some(font) = &self.font_file {
            params.push(format!("fontfile='{}'", escape_drawtext(font)));
        }

        format!("drawtext={}", params.join(":"))
    }
}

/// Escape text for a single-quoted `drawtext` option value.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            // A quote cannot appear inside a quoted filter argument.
            '\'' => out.push('\u{2019}'),
            _ => out.push(c),
        }
    }
    out
}

fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

/// One input file of the ffmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    Image(PathBuf),
    Audio(PathBuf),
}

impl JobInput {
    pub fn path(&self) -> &Path {
        match self {
            JobInput::Image(p) | JobInput::Audio(p) => p,
        }
    }
}

/// Inputs and filter graph of a single ffmpeg run.
#[derive(Debug, Clone)]
pub struct FfmpegJob {
    pub inputs: Vec<JobInput>,
    pub filter_complex: String,
    pub total_duration: f64,
    pub fps: f64,
}

/// Build the ffmpeg inputs and `-filter_complex` graph for a plan.
///
/// Each segment's clip is extended by the outgoing crossfade so that chaining
/// `xfade` at every segment start yields exactly the plan's total duration.
pub fn build_job(
    plan: &CompositionPlan,
    assets: &AssetSet,
    overlay: &CaptionOverlay,
) -> ReelResult<FfmpegJob> {
    let instructions = &plan.instructions;
    if instructions.is_empty() {
        return Err(ReelError::PlanInconsistency(
            "composition plan has no instructions".into(),
        ));
    }

    let settings = &plan.settings;
    let origin = instructions[0].start;
    let mut inputs = Vec::new();
    let mut filters = Vec::new();

    // Video: one zoompan clip per segment.
    for (k, instr) in instructions.iter().enumerate() {
        let outgoing = instructions
            .get(k + 1)
            .map(crossfade_into)
            .unwrap_or(0.0);
        let clip = instr.duration() + outgoing;
        let share = clip / instr.images.len().max(1) as f64;

        let mut labels = Vec::new();
        for (j, image_id) in instr.images.iter().enumerate() {
            let asset = assets.get(image_id).ok_or_else(|| missing(image_id, instr))?;
            let input = inputs.len();
            inputs.push(JobInput::Image(asset.path.clone()));

            let label = if instr.images.len() == 1 {
                format!("v{}", k)
            } else {
                format!("s{}i{}", k, j)
            };
            filters.push(format!(
                "[{}:v]{}[{}]",
                input,
                still_clip(instr.motion, share, settings.width, settings.height, settings.fps, settings.zoom_factor),
                label
            ));
            labels.push(label);
        }
        if labels.len() > 1 {
            let joined: String = labels.iter().map(|l| format!("[{}]", l)).collect();
            filters.push(format!("{}concat=n={}:v=1:a=0[v{}]", joined, labels.len(), k));
        }
    }

    let mut current = "v0".to_string();
    for (k, instr) in instructions.iter().enumerate().skip(1) {
        let fade = crossfade_into(instr);
        let out = format!("x{}", k);
        if fade > 0.0 {
            filters.push(format!(
                "[{}][v{}]xfade=transition=fade:duration={}:offset={}[{}]",
                current,
                k,
                secs(fade),
                secs(instr.start - origin),
                out
            ));
        } else {
            filters.push(format!("[{}][v{}]concat=n=2:v=1:a=0[{}]", current, k, out));
        }
        current = out;
    }

    let total = plan.total_duration;
    let mut post = Vec::new();
    if overlay.enabled {
        for instr in instructions {
            for caption in &instr.captions {
                post.push(overlay.drawtext(&shifted(caption, origin)));
            }
        }
    }
    if let TerminalDirective::FadeOut { duration } = plan.terminal {
        let d = duration.as_seconds().min(total);
        if d > 0.0 {
            post.push(format!("fade=t=out:st={}:d={}", secs(total - d), secs(d)));
        }
    }
    post.push("format=yuv420p".to_string());
    filters.push(format!("[{}]{}[vout]", current, post.join(",")));

    // Audio: each clip padded or trimmed to its interval, then concatenated.
    let mut audio_labels = String::new();
    for (k, instr) in instructions.iter().enumerate() {
        let asset = assets
            .get(&instr.audio)
            .ok_or_else(|| missing(&instr.audio, instr))?;
        let input = inputs.len();
        inputs.push(JobInput::Audio(asset.path.clone()));
        filters.push(format!(
            "[{}:a]aformat=sample_rates=44100:channel_layouts=stereo,apad,atrim=duration={},asetpts=PTS-STARTPTS[a{}]",
            input,
            secs(instr.duration()),
            k
        ));
        audio_labels.push_str(&format!("[a{}]", k));
    }
    filters.push(format!(
        "{}concat=n={}:v=0:a=1[aout]",
        audio_labels,
        instructions.len()
    ));

    Ok(FfmpegJob {
        inputs,
        filter_complex: filters.join(";"),
        total_duration: total,
        fps: settings.fps,
    })
}

fn crossfade_into(instr: &RenderInstruction) -> f64 {
    instr
        .transition_in
        .map(|t| t.duration.as_seconds())
        .unwrap_or(0.0)
}

fn shifted(caption: &Caption, origin: f64) -> Caption {
    Caption {
        start: caption.start - origin,
        end: caption.end - origin,
        ..caption.clone()
    }
}

fn missing(id: &reelforge_ir::AssetId, instr: &RenderInstruction) -> ReelError {
    ReelError::PlanInconsistency(format!(
        "asset '{}' of segment {} is not in the asset set",
        id, instr.segment_index
    ))
}

/// Scale/crop a still to twice the output size, then Ken Burns it down to
/// the output size for `seconds`.
fn still_clip(motion: Motion, seconds: f64, width: u32, height: u32, fps: f64, zoom: f64) -> String {
    let frames = ((seconds * fps).ceil() as u64).max(1);
    let delta = (zoom - 1.0).max(0.0);
    let z = match motion {
        Motion::ZoomIn => format!("min(1+{:.4}*on/{},{:.4})", delta, frames, zoom),
        Motion::ZoomOut => format!("max({:.4}-{:.4}*on/{},1)", zoom, delta, frames),
    };
    format!(
        "scale={w2}:{h2}:force_original_aspect_ratio=increase,crop={w2}:{h2},\
zoompan=z='{z}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps},\
trim=duration={dur},setpts=PTS-STARTPTS,setsar=1",
        w2 = width * 2,
        h2 = height * 2,
        z = z,
        frames = frames,
        w = width,
        h = height,
        fps = fps,
        dur = secs(seconds),
    )
}

/// Sibling path the encoder writes to before the final rename.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("reel.mp4"));
    name.push(".partial");
    output.with_file_name(name)
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("could not remove {}: {}", path.display(), e);
        }
    }
}

/// Renderer that shells out to FFmpeg for H.264/AAC encoding.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    binary: PathBuf,
    overlay: CaptionOverlay,
}

impl FfmpegRenderer {
    pub fn new(overlay: CaptionOverlay) -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            overlay,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Check if FFmpeg is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Full argument list for encoding `job` into `target`.
    pub fn args(&self, job: &FfmpegJob, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error"]
            .into_iter()
            .map(OsString::from)
            .collect();

        for input in &job.inputs {
            args.push("-i".into());
            args.push(input.path().as_os_str().to_os_string());
        }

        let fps = format!("{}", job.fps);
        let total = secs(job.total_duration);
        for arg in [
            "-filter_complex", job.filter_complex.as_str(),
            "-map", "[vout]",
            "-map", "[aout]",
            "-c:v", "libx264",
            "-pix_fmt", "yuv420p",
            "-preset", "medium",
            "-crf", "23",
            "-r", fps.as_str(),
            "-c:a", "aac",
            "-b:a", "192k",
            "-ar", "44100",
            "-movflags", "+faststart",
            "-t", total.as_str(),
            // The .partial extension hides the container from ffmpeg's guesser.
            "-f", "mp4",
        ] {
            args.push(arg.into());
        }
        args.push(target.as_os_str().to_os_string());
        args
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new(CaptionOverlay::default())
    }
}

impl Renderer for FfmpegRenderer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn render(&self, plan: &CompositionPlan, assets: &AssetSet, output: &Path) -> ReelResult<()> {
        let job = build_job(plan, assets, &self.overlay)?;

        if !self.is_available() {
            return Err(ReelError::Render(format!(
                "{} not found in PATH. Install FFmpeg: https://ffmpeg.org/download.html",
                self.binary.display()
            )));
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let partial = partial_path(output);
        let args = self.args(&job, &partial);
        tracing::debug!(inputs = job.inputs.len(), "filter graph: {}", job.filter_complex);

        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output_status = match result {
            Ok(out) => out,
            Err(e) => {
                discard(&partial);
                return Err(ReelError::Render(format!("failed to start ffmpeg: {}", e)));
            }
        };

        if !output_status.status.success() {
            discard(&partial);
            let stderr = String::from_utf8_lossy(&output_status.stderr).into_owned();
            return Err(ReelError::Render(if stderr.trim().is_empty() {
                format!("ffmpeg failed with status {}", output_status.status)
            } else {
                stderr
            }));
        }

        if let Err(e) = std::fs::rename(&partial, output) {
            discard(&partial);
            return Err(e.into());
        }

        tracing::info!(
            "Encoded {} segments to {} ({}x{} @ {}fps, {:.2}s)",
            plan.instructions.len(),
            output.display(),
            plan.settings.width,
            plan.settings.height,
            plan.settings.fps,
            plan.total_duration
        );

        Ok(())
    }
}
