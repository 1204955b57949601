//! Collaborator interfaces and run orchestration.
//!
//! Rendering and assembly run synchronously, one at a time. Speech synthesis
//! is independent per segment and runs on a bounded worker pool; results are
//! keyed by segment index so completion order does not matter.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::align::{AudioVisualMap, VisualAligner};
use crate::range::{RangeFilter, SlideRange};
use crate::types::{NarrationSegment, Resolution};
use crate::{Error, Result};

/// Hold time for a segment with no text.
pub const SILENT_SEGMENT_HOLD: Duration = Duration::from_millis(500);

/// Hold time for a frame with no segments at all.
pub const EMPTY_FRAME_HOLD: Duration = Duration::from_secs(2);

/// Default number of concurrent synthesis workers.
pub const DEFAULT_SYNTHESIS_JOBS: usize = 4;

/// Renders a deck source to an ordered list of frame images.
pub trait FrameRenderer {
    fn render(&self, source: &Path, resolution: Resolution, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Turns one segment's text into an audio file.
///
/// Must be idempotent per `index`: the same index always maps to the same
/// file, and an existing file is reused.
pub trait SpeechSynthesizer: Sync {
    fn synthesize(&self, text: &str, speaker: Option<&str>, index: usize) -> Result<PathBuf>;
}

/// One piece of a frame's soundtrack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioClip {
    Speech(PathBuf),
    Silence(Duration),
}

/// Builds the output video from frames and their soundtracks.
///
/// `audio[i]` belongs to `frames[i]`; an empty list is a silent hold.
pub trait VideoAssembler {
    fn assemble(&self, frames: &[PathBuf], audio: &[Vec<AudioClip>], output: &Path) -> Result<()>;
}

/// Which rendered frames are used and what plays on each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Global indices of the rendered frames used, in output order.
    pub frames: Vec<usize>,
    /// Output frame index to segment indices.
    pub map: AudioVisualMap,
}

/// Counts reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub synthesized: usize,
    pub silent_frames: usize,
}

/// Options shared by planning and running.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub resolution: Resolution,
    pub range: Option<SlideRange>,
    pub jobs: usize,
    pub aligner: VisualAligner,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            range: None,
            jobs: DEFAULT_SYNTHESIS_JOBS,
            aligner: VisualAligner::new(),
        }
    }
}

/// Drives the external collaborators over a resolved segment list.
pub struct Pipeline<'a> {
    renderer: &'a dyn FrameRenderer,
    synthesizer: &'a dyn SpeechSynthesizer,
    assembler: &'a dyn VideoAssembler,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        renderer: &'a dyn FrameRenderer,
        synthesizer: &'a dyn SpeechSynthesizer,
        assembler: &'a dyn VideoAssembler,
        options: PipelineOptions,
    ) -> Self {
        Self {
            renderer,
            synthesizer,
            assembler,
            options,
        }
    }

    /// Align segments to `frame_count` rendered frames, applying the slide
    /// range if one is set.
    pub fn plan(&self, segments: &[NarrationSegment], frame_count: usize) -> Result<Plan> {
        plan(segments, frame_count, &self.options)
    }

    /// Render, align, synthesize and assemble.
    pub fn run(
        &self,
        source: &Path,
        segments: &[NarrationSegment],
        frames_dir: &Path,
        output: &Path,
    ) -> Result<RunSummary> {
        log::info!("Rendering frames ({})", self.options.resolution);
        let rendered = self
            .renderer
            .render(source, self.options.resolution, frames_dir)?;
        if rendered.is_empty() {
            return Err(Error::NoFrames);
        }
        log::info!("Rendered {} frames for {} segments", rendered.len(), segments.len());

        let plan = self.plan(segments, rendered.len())?;
        let frames: Vec<PathBuf> = plan
            .frames
            .iter()
            .filter_map(|&g| rendered.get(g).cloned())
            .collect();

        let audio_files = self.synthesize_all(segments, &plan.map)?;

        let audio: Vec<Vec<AudioClip>> = plan
            .map
            .frames()
            .iter()
            .map(|indices| {
                indices
                    .iter()
                    .map(|i| match audio_files.get(i) {
                        Some(path) => AudioClip::Speech(path.clone()),
                        None => AudioClip::Silence(SILENT_SEGMENT_HOLD),
                    })
                    .collect()
            })
            .collect();

        log::info!("Assembling {}", output.display());
        self.assembler.assemble(&frames, &audio, output)?;

        Ok(RunSummary {
            frames: frames.len(),
            synthesized: audio_files.len(),
            silent_frames: plan.map.silent_frame_count(),
        })
    }

    /// Synthesize every spoken segment referenced by the map.
    fn synthesize_all(
        &self,
        segments: &[NarrationSegment],
        map: &AudioVisualMap,
    ) -> Result<HashMap<usize, PathBuf>> {
        let spoken: Vec<usize> = map
            .frames()
            .iter()
            .flatten()
            .copied()
            .filter(|&i| segments.get(i).is_some_and(|s| !s.is_silent()))
            .collect();

        let jobs = self.options.jobs.max(1);
        log::info!("Synthesizing {} segments with {} workers", spoken.len(), jobs);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::SynthesisError(format!("Failed to start worker pool: {}", e)))?;

        let synthesizer = self.synthesizer;
        let results: Result<Vec<(usize, PathBuf)>> = pool.install(|| {
            spoken
                .par_iter()
                .map(|&i| {
                    let segment = &segments[i];
                    synthesizer
                        .synthesize(&segment.text, segment.speaker.as_deref(), i)
                        .map(|path| (i, path))
                })
                .collect()
        });

        Ok(results?.into_iter().collect())
    }
}

/// Build a plan without running any collaborator.
pub fn plan(segments: &[NarrationSegment], frame_count: usize, options: &PipelineOptions) -> Result<Plan> {
    match &options.range {
        Some(range) => {
            let selection = RangeFilter::new(options.aligner.clone()).filter(segments, range, frame_count)?;
            Ok(Plan {
                map: selection.audio_visual_map(),
                frames: selection.frames,
            })
        }
        None => Ok(Plan {
            frames: (0..frame_count).collect(),
            map: options.aligner.align(segments, frame_count),
        }),
    }
}
