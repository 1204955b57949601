//! Slide-range filtering.
//!
//! Restricts an aligned deck to a window of logical slide ids. Frame indices
//! are first computed over the whole deck (global), then the frames the
//! window touches are renumbered contiguously (local). Re-running the
//! aligner on a truncated list would shift every frame after the cut.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::align::{AudioVisualMap, VisualAligner};
use crate::types::NarrationSegment;
use crate::{Error, Result};

/// An inclusive window of logical slide ids. `end: None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl SlideRange {
    /// Create a validated range.
    pub fn new(start: u32, end: Option<u32>) -> Result<Self> {
        if start == 0 {
            return Err(Error::InvalidRange("slide ids start at 1".to_string()));
        }
        if let Some(end) = end {
            if end < start {
                return Err(Error::InvalidRange(format!("{}-{} is empty", start, end)));
            }
        }
        Ok(Self { start, end })
    }

    /// The first `count` slides.
    pub fn first(count: u32) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidRange("slide count must be at least 1".to_string()));
        }
        Self::new(1, Some(count))
    }

    /// Whether a slide id falls in the window.
    pub fn contains(&self, slide_id: u32) -> bool {
        slide_id >= self.start && self.end.map_or(true, |end| slide_id <= end)
    }
}

impl FromStr for SlideRange {
    type Err = Error;

    /// Parse `4-6`, `4-`, `-6` or `5`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse = |part: &str| -> Result<u32> {
            part.trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidRange(format!("'{}' is not a slide number", part.trim())))
        };

        match s.split_once('-') {
            Some((start, end)) => {
                let start = if start.trim().is_empty() { 1 } else { parse(start)? };
                let end = if end.trim().is_empty() { None } else { Some(parse(end)?) };
                Self::new(start, end)
            }
            None => {
                let slide = parse(s)?;
                Self::new(slide, Some(slide))
            }
        }
    }
}

impl fmt::Display for SlideRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// A segment kept by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSegment {
    /// Index into the unfiltered segment list.
    pub segment: usize,
    /// Local frame index, or `None` if the aligner dropped the segment.
    pub frame: Option<usize>,
}

/// The result of filtering to a slide window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSelection {
    /// Kept segments in spoken order.
    pub segments: Vec<SelectedSegment>,
    /// Global frame indices needed, ascending. Position is the local index.
    pub frames: Vec<usize>,
}

impl RangeSelection {
    /// Translate a global frame index to its local index.
    pub fn local_frame(&self, global: usize) -> Option<usize> {
        self.frames.binary_search(&global).ok()
    }

    /// Translate a local frame index back to the global one.
    pub fn global_frame(&self, local: usize) -> Option<usize> {
        self.frames.get(local).copied()
    }

    /// Local frame index to the segment indices (into the unfiltered list)
    /// that play during it.
    pub fn audio_visual_map(&self) -> AudioVisualMap {
        let mut frames = vec![Vec::new(); self.frames.len()];
        for selected in &self.segments {
            if let Some(slot) = selected.frame.and_then(|f| frames.get_mut(f)) {
                slot.push(selected.segment);
            }
        }
        AudioVisualMap::from_frames(frames)
    }
}

/// Filters an aligned deck to a slide window.
#[derive(Debug, Clone, Default)]
pub struct RangeFilter {
    aligner: VisualAligner,
}

impl RangeFilter {
    /// Create a filter that aligns with `aligner`.
    pub fn new(aligner: VisualAligner) -> Self {
        Self { aligner }
    }

    /// Keep the segments whose slide id is in `range`.
    ///
    /// When the window reaches the last slide, rendered frames after the
    /// last narrated one are kept too, so the full range reproduces the
    /// unfiltered alignment.
    pub fn filter(
        &self,
        segments: &[NarrationSegment],
        range: &SlideRange,
        frame_count: usize,
    ) -> Result<RangeSelection> {
        let global = self.aligner.assign(segments, frame_count);

        let selected: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| range.contains(s.slide_id))
            .map(|(i, _)| i)
            .collect();

        if selected.is_empty() {
            return Err(Error::NoContentInRange(range.to_string()));
        }

        let mut needed: BTreeSet<usize> = selected.iter().filter_map(|&i| global[i]).collect();

        let last_slide = segments.iter().map(|s| s.slide_id).max().unwrap_or(0);
        if range.contains(last_slide) {
            if let Some(&last_narrated) = needed.iter().next_back() {
                needed.extend(last_narrated + 1..frame_count);
            }
        }

        let frames: Vec<usize> = needed.into_iter().collect();
        let selection_segments = selected
            .into_iter()
            .map(|i| SelectedSegment {
                segment: i,
                frame: global[i].and_then(|g| frames.binary_search(&g).ok()),
            })
            .collect();

        log::info!(
            "Slide range {}: {} frames of {} selected",
            range,
            frames.len(),
            frame_count
        );

        Ok(RangeSelection {
            segments: selection_segments,
            frames,
        })
    }
}
