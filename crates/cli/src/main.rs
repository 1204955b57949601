//! CLI tool for turning narrated slide decks into videos.

mod cache;
mod process;
mod render;
mod tts;
mod video;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use slidecast_beamer::BeamerParser;
use slidecast_core::types::strip_speakers;
use slidecast_core::{
    pipeline, FrameRenderer, IncludeResolver, LineMode, NarrationSegment, OverflowPolicy, Pipeline,
    PipelineOptions, Plan, ResolvedDeck, Resolution, SegmentParser, SlideRange, SourceFormat,
    VisualAligner,
};
use slidecast_slidev::SlidevParser;
use std::path::{Path, PathBuf};

use crate::cache::WorkDir;
use crate::render::{PdfRenderer, SlidevRenderer};
use crate::tts::{CommandSynthesizer, DEFAULT_TTS_COMMAND, DEFAULT_VOICE};
use crate::video::FfmpegAssembler;

/// Turn a Beamer or Slidev deck with speaker notes into a narrated video.
#[derive(Parser, Debug)]
#[command(name = "slidecast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input deck (.tex for Beamer, .md for Slidev)
    input: PathBuf,

    /// Compiled PDF for a Beamer deck (default: input with .pdf extension)
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Output video (default: <input stem>.mp4 next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output resolution: 720p, 1080p or 4k
    #[arg(short, long, default_value = "1080p")]
    resolution: Resolution,

    /// Only narrate slides in this range, e.g. 4-6, 4- or 5
    #[arg(long, conflicts_with = "max_slides")]
    range: Option<SlideRange>,

    /// Only narrate the first N slides
    #[arg(long)]
    max_slides: Option<u32>,

    /// How unprefixed note lines become segments
    #[arg(long, value_enum, default_value_t = LineModeArg::PerLine)]
    line_mode: LineModeArg,

    /// Extra names never treated as speakers (repeatable)
    #[arg(long = "ignore-speaker")]
    ignore_speaker: Vec<String>,

    /// Single-speaker mode: ignore all speaker prefixes
    #[arg(long)]
    mono: bool,

    /// What to do with narration beyond the last rendered frame
    #[arg(long, value_enum, default_value_t = OverflowArg::Clamp)]
    overflow: OverflowArg,

    /// Concurrent speech synthesis jobs
    #[arg(short, long, default_value_t = slidecast_core::pipeline::DEFAULT_SYNTHESIS_JOBS)]
    jobs: usize,

    /// TTS command; {text_file}, {output} (WAV) and {voice} are substituted
    #[arg(long, default_value = DEFAULT_TTS_COMMAND)]
    tts_command: String,

    /// Voice for a speaker, as SPEAKER=VOICE (repeatable)
    #[arg(long = "voice", value_parser = parse_voice)]
    voices: Vec<(String, String)>,

    /// Voice for the narrator and unmapped speakers
    #[arg(long, default_value = DEFAULT_VOICE)]
    default_voice: String,

    /// Keep the work directory after the run, including a failed one
    #[arg(long)]
    keep_work: bool,

    /// Discard cached audio from earlier runs
    #[arg(long)]
    fresh: bool,

    /// Print the parsed segments and frame plan as JSON and exit
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineModeArg {
    Merge,
    PerLine,
}

impl From<LineModeArg> for LineMode {
    fn from(arg: LineModeArg) -> Self {
        match arg {
            LineModeArg::Merge => LineMode::Merge,
            LineModeArg::PerLine => LineMode::PerLine,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverflowArg {
    Clamp,
    Drop,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Clamp => OverflowPolicy::ClampToLast,
            OverflowArg::Drop => OverflowPolicy::Drop,
        }
    }
}

/// JSON printed by `--dry-run`.
#[derive(Serialize)]
struct DryRun<'a> {
    source: &'a Path,
    format: SourceFormat,
    slides: u32,
    visual_steps: usize,
    range: Option<SlideRange>,
    segments: &'a [NarrationSegment],
    /// Plan assuming one rendered frame per visual step.
    plan: Plan,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let input = args
        .input
        .canonicalize()
        .with_context(|| format!("Input not found: {}", args.input.display()))?;
    let format = detect_format(&input)?;

    let deck = resolve_deck(&input, format, &args)?;
    log::info!(
        "Parsed {} slides, {} segments, {} visual steps",
        deck.slide_count(),
        deck.segments.len(),
        deck.visual_steps
    );

    let range = match (args.range, args.max_slides) {
        (Some(range), _) => Some(range),
        (None, Some(count)) => Some(SlideRange::first(count)?),
        (None, None) => None,
    };

    let options = PipelineOptions {
        resolution: args.resolution,
        range,
        jobs: args.jobs,
        aligner: VisualAligner::new().with_policy(args.overflow.into()),
    };

    if args.dry_run {
        let plan = pipeline::plan(&deck.segments, deck.visual_steps, &options)?;
        let report = DryRun {
            source: &input,
            format,
            slides: deck.slide_count(),
            visual_steps: deck.visual_steps,
            range,
            segments: &deck.segments,
            plan,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let output = get_output_path(&input, args.output.as_ref());
    let work = WorkDir::for_input(&input);
    work.prepare(args.fresh)?;

    let renderer: Box<dyn FrameRenderer> = match format {
        SourceFormat::Beamer => {
            let pdf = args.pdf.clone().unwrap_or_else(|| input.with_extension("pdf"));
            Box::new(PdfRenderer::new(pdf))
        }
        SourceFormat::Slidev => {
            let with_clicks = deck.segments.iter().any(|s| s.click_id > 0);
            Box::new(SlidevRenderer::new().with_clicks(with_clicks))
        }
    };

    let summary = work.run_then_cleanup(args.keep_work, |work| {
        let synthesizer = CommandSynthesizer::new(&args.tts_command, work.audio())?
            .with_voices(args.voices.iter().cloned())
            .with_default_voice(args.default_voice.as_str());
        let assembler = FfmpegAssembler::new(args.resolution, work.clips());

        Pipeline::new(&*renderer, &synthesizer, &assembler, options)
            .run(&input, &deck.segments, work.images(), &output)
            .with_context(|| format!("Failed to build {}", output.display()))
    })?;

    log::info!(
        "Wrote {} ({} frames, {} narrated segments, {} silent frames)",
        output.display(),
        summary.frames,
        summary.synthesized,
        summary.silent_frames
    );

    Ok(())
}

/// Pick the source dialect from the file extension.
fn detect_format(input: &Path) -> Result<SourceFormat> {
    input
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Could not detect deck format of {} (expected .tex or .md)",
                input.display()
            )
        })
}

/// Parse the deck and every file it includes.
fn resolve_deck(input: &Path, format: SourceFormat, args: &Args) -> Result<ResolvedDeck> {
    let parser = SegmentParser::new()
        .with_line_mode(args.line_mode.into())
        .with_ignored_speakers(args.ignore_speaker.iter().cloned());

    let mut deck = match format {
        SourceFormat::Beamer => {
            log::debug!("Parsing as Beamer");
            IncludeResolver::new(BeamerParser::new(), parser).resolve(input, 1)
        }
        SourceFormat::Slidev => {
            log::debug!("Parsing as Slidev");
            IncludeResolver::new(SlidevParser::new(), parser).resolve(input, 1)
        }
    }
    .with_context(|| format!("Failed to parse {}", input.display()))?;

    if args.mono {
        strip_speakers(&mut deck.segments);
    }

    Ok(deck)
}

/// Parse `SPEAKER=VOICE`.
fn parse_voice(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((speaker, voice)) if !speaker.trim().is_empty() && !voice.trim().is_empty() => {
            Ok((speaker.trim().to_string(), voice.trim().to_string()))
        }
        _ => Err(format!("expected SPEAKER=VOICE, got '{}'", value)),
    }
}

/// Determine the output path for a deck.
fn get_output_path(input: &Path, output: Option<&PathBuf>) -> PathBuf {
    match output {
        Some(path) => path.clone(),
        None => input.with_extension("mp4"),
    }
}
