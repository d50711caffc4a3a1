use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use reelforge_assets::{Backends, CancelToken};
use reelforge_core::{ImageSource, NarrationProvider, NarrationStyle, ReelConfig, SpeechEngine};
use reelforge_encode::{CaptionOverlay, FfmpegRenderer};
use reelforge_ir::{CaptionTrack, Script, Timeline, TimingPolicy};
use reelforge_pipeline::{InputDocument, Orchestrator, RunInput, RunReport, RunState};

const DEFAULT_CONFIG: &str = "reelforge.toml";

#[derive(Parser)]
#[command(
    name = "reelforge",
    version,
    about = "ReelForge: turn text into short narrated vertical videos",
    long_about = "ReelForge compiles text, a topic or a document into a captioned,\nnarrated vertical reel: script, timeline, assets, captions, render."
)]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a reel from text, a topic, or a .txt/.md file
    Generate {
        /// Input text, topic, or path to a file
        #[arg(short, long, required_unless_present = "script")]
        input: Option<String>,

        /// Use a ready script.json instead of drafting one
        #[arg(long, conflicts_with = "input")]
        script: Option<PathBuf>,

        /// Output video path (default: outputs/reel_<timestamp>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target length in seconds
        #[arg(short, long, default_value_t = 45.0)]
        length: f64,

        /// Configuration file (default: ./reelforge.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Image source: stock, web, generate
        #[arg(long)]
        image_source: Option<ImageSource>,

        /// Speech engine: piper, openai, silent
        #[arg(long)]
        speech_engine: Option<SpeechEngine>,

        #[command(flatten)]
        narration: NarrationArgs,

        /// Do not burn captions into the video
        #[arg(long)]
        no_captions: bool,

        /// Keep the work directory (and persist script/timeline/plan/captions into it)
        #[arg(long)]
        keep_intermediate: bool,

        /// Cancel the run after this many seconds
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// Draft a script without rendering
    Script {
        /// Input text, topic, or path to a file
        #[arg(short, long)]
        input: String,

        /// Where to write the script JSON
        #[arg(short, long, default_value = "script.json")]
        output: PathBuf,

        /// Target length in seconds
        #[arg(short, long, default_value_t = 45.0)]
        length: f64,

        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// Print the timeline and SubRip captions of a script
    Timeline {
        /// Path to a script JSON file
        #[arg()]
        file: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration file
    Config {
        /// Destination path
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version, encoder and backend info
    Info {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Flags shared by every command that drafts a script.
#[derive(Args, Debug, Default)]
struct NarrationArgs {
    /// Narration source: llm, template
    #[arg(long)]
    narrator: Option<NarrationProvider>,

    /// Content style: informational, explainer, news, reaction
    #[arg(long)]
    style: Option<NarrationStyle>,

    /// Research the topic on the web and draft from the facts found
    #[arg(long)]
    research: bool,
}

impl NarrationArgs {
    fn apply(self, config: &mut ReelConfig) {
        if let Some(provider) = self.narrator {
            config.narration.provider = provider;
        }
        if let Some(style) = self.style {
            config.narration.style = style;
        }
        if self.research {
            config.narration.research.enabled = true;
        }
    }
}

/// e.g. `llm (news, research)`.
fn narrator_label(config: &ReelConfig) -> String {
    let provider = format!("{:?}", config.narration.provider).to_lowercase();
    if config.narration.research.enabled {
        format!("{} ({}, research)", provider, config.narration.style)
    } else {
        format!("{} ({})", provider, config.narration.style)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            input,
            script,
            output,
            length,
            config,
            image_source,
            speech_engine,
            narration,
            no_captions,
            keep_intermediate,
            deadline,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(source) = image_source {
                config.assets.image_source = source;
            }
            if let Some(engine) = speech_engine {
                config.assets.speech_engine = engine;
            }
            narration.apply(&mut config);
            if no_captions {
                config.captions.enabled = false;
            }
            if keep_intermediate {
                config.pipeline.keep_intermediate = true;
                config.pipeline.persist_intermediate = true;
            }
            if deadline.is_some() {
                config.pipeline.deadline_seconds = deadline;
            }

            let run_input = match (input, script) {
                (_, Some(path)) => RunInput::Script(
                    Script::load(&path)
                        .with_context(|| format!("failed to load script: {}", path.display()))?,
                ),
                (Some(text), None) => RunInput::Document(InputDocument::parse(&text, length)?),
                (None, None) => anyhow::bail!("either --input or --script is required"),
            };
            let output = output.unwrap_or_else(default_output);
            cmd_generate(config, run_input, &output).await
        }
        Commands::Script {
            input,
            output,
            length,
            config,
            narration,
        } => {
            let mut config = load_config(config.as_deref())?;
            narration.apply(&mut config);
            cmd_script(config, &input, length, &output).await
        }
        Commands::Timeline { file, config } => cmd_timeline(&file, &load_config(config.as_deref())?),
        Commands::Config { path, force } => cmd_config(&path, force),
        Commands::Info { config } => cmd_info(&load_config(config.as_deref())?),
    }
}

/// An explicit path must exist; `./reelforge.toml` is only read when present.
fn load_config(path: Option<&Path>) -> Result<ReelConfig> {
    match path {
        Some(path) => ReelConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => {
            let implicit = Path::new(DEFAULT_CONFIG);
            if implicit.exists() {
                ReelConfig::load_from_file(implicit)
                    .with_context(|| format!("failed to load config: {}", implicit.display()))
            } else {
                Ok(ReelConfig::default())
            }
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("outputs").join(format!(
        "reel_{}.mp4",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Run-level cancellation: the configured deadline, or Ctrl-C.
fn cancel_token(config: &ReelConfig) -> CancelToken {
    let cancel = match config.pipeline.deadline_seconds {
        Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n   Interrupted, finishing with placeholders and stopping...");
            trigger.cancel("interrupted by user");
        }
    });
    cancel
}

async fn cmd_generate(config: ReelConfig, input: RunInput, output: &Path) -> Result<()> {
    println!("🎬 ReelForge");
    println!("   Output:    {}", output.display());
    println!(
        "   Narrator:  {}",
        match &input {
            RunInput::Script(_) => "provided script".to_string(),
            RunInput::Document(_) => narrator_label(&config),
        }
    );

    let renderer = FfmpegRenderer::new(CaptionOverlay::from(&config.captions));
    if !renderer.is_available() {
        anyhow::bail!("FFmpeg not found on PATH; install it to render reels");
    }

    let cancel = cancel_token(&config);
    let orchestrator = Orchestrator::from_config(config)?;
    println!("   Backends:  {}", orchestrator.backends().describe());
    println!();

    let report = orchestrator.run(input, output, &cancel).await;
    let report_path = output.with_extension("report.json");
    if let Err(e) = report.save(&report_path) {
        tracing::warn!("failed to write run report {}: {}", report_path.display(), e);
    }
    print_report(&report);

    match report.outcome() {
        Ok(path) => {
            println!();
            println!("✅ Reel written to {}", path.display());
            println!("   Report:    {}", report_path.display());
            Ok(())
        }
        Err(message) => Err(anyhow::anyhow!(message)).context("reel generation failed"),
    }
}

fn print_report(report: &RunReport) {
    println!("   Run:       {}", report.run_id);
    println!("   State:     {}", report.state);
    if let Some(total) = report.total_duration {
        println!("   Duration:  {:.2}s", total);
    }
    if report.placeholder_assets > 0 {
        println!("   Placeholders: {}", report.placeholder_assets);
    }
    if !report.warnings.is_empty() {
        println!("   Warnings:");
        for warning in &report.warnings {
            println!("     - {}", warning);
        }
    }
    if let RunState::Failed(reason) = &report.state {
        if !reason.flagged.is_empty() {
            println!("   Flagged:   {}", reason.flagged.join(", "));
        }
    }
}

async fn cmd_script(config: ReelConfig, input: &str, length: f64, output: &Path) -> Result<()> {
    let doc = InputDocument::parse(input, length)?;
    let cancel = cancel_token(&config);
    let orchestrator = Orchestrator::from_config(config)?;
    let script = orchestrator
        .draft(&doc, &cancel)
        .await
        .context("failed to draft script")?;

    std::fs::write(output, script.to_json_pretty()?)
        .with_context(|| format!("failed to write script: {}", output.display()))?;
    println!("📝 Script with {} segments written to {}", script.len(), output.display());
    Ok(())
}

fn cmd_timeline(file: &Path, config: &ReelConfig) -> Result<()> {
    let script = Script::load(file).with_context(|| format!("failed to load script: {}", file.display()))?;
    let timeline = Timeline::compute_with(&script, &TimingPolicy::from(&config.timing))?;

    println!("⏱  Timeline ({} segments)", timeline.len());
    for (entry, segment) in timeline.entries().iter().zip(&script.segments) {
        println!(
            "   {:>2}  [{:>7.3}, {:>7.3})  {:<9}  {}",
            entry.index,
            entry.start,
            entry.end,
            entry.kind.to_string(),
            segment.narration
        );
    }
    println!(
        "   Total {:.3}s, target {:.3}s",
        timeline.total(),
        timeline.target_duration()
    );
    if let Some(deviation) = timeline.deviation() {
        println!("   ⚠ {}", deviation);
    }
    println!();

    let captions = CaptionTrack::compile(&script, &timeline, config.captions.max_chars);
    print!("{}", captions.to_srt());
    Ok(())
}

fn cmd_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ReelConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_info(config: &ReelConfig) -> Result<()> {
    let ffmpeg = FfmpegRenderer::new(CaptionOverlay::default());
    println!("🎬 ReelForge");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!(
        "   Output:    {}x{} @ {} fps",
        config.output.width, config.output.height, config.output.fps
    );
    println!(
        "   FFmpeg:    {}",
        if ffmpeg.is_available() {
            "available ✓"
        } else {
            "NOT FOUND ✗"
        }
    );
    println!("   Narrator:  {}", narrator_label(config));

    let scratch = std::env::temp_dir().join("reelforge-info");
    match Backends::from_config(config, &scratch) {
        Ok(backends) => println!("   Backends:  {}", backends.describe()),
        Err(e) => println!("   Backends:  unavailable ({})", e),
    }
    match config.cache_root() {
        Ok(root) => println!("   Cache:     {}", root.display()),
        Err(e) => println!("   Cache:     unavailable ({})", e),
    }
    Ok(())
}
