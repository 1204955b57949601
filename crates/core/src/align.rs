//! Segment-to-frame alignment.
//!
//! Walks the flattened segment list with a visual cursor that advances on
//! every segment opening a new visual state, and assigns each segment to a
//! rendered frame.

use serde::{Deserialize, Serialize};

use crate::types::NarrationSegment;

/// What to do with segments whose visual step has no rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Attach them to the last frame so no narration is lost.
    #[default]
    ClampToLast,
    /// Leave them unassigned.
    Drop,
}

/// Frame index to the ordered segment indices played during that frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioVisualMap {
    frames: Vec<Vec<usize>>,
}

impl AudioVisualMap {
    /// Build a map from per-segment frame assignments.
    pub fn from_assignments(assignments: &[Option<usize>], frame_count: usize) -> Self {
        let mut frames = vec![Vec::new(); frame_count];
        for (segment, frame) in assignments.iter().enumerate() {
            if let Some(slot) = frame.and_then(|f| frames.get_mut(f)) {
                slot.push(segment);
            }
        }
        Self { frames }
    }

    /// Build a map directly from frame lists.
    pub fn from_frames(frames: Vec<Vec<usize>>) -> Self {
        Self { frames }
    }

    /// Number of frames, including silent ones.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// All frames in order.
    pub fn frames(&self) -> &[Vec<usize>] {
        &self.frames
    }

    /// Segment indices for one frame. Out-of-range frames are empty.
    pub fn segment_indices(&self, frame: usize) -> &[usize] {
        self.frames.get(frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Segments for one frame, resolved against the segment list the map
    /// was built from.
    pub fn segments<'a>(
        &'a self,
        frame: usize,
        all: &'a [NarrationSegment],
    ) -> impl Iterator<Item = &'a NarrationSegment> + 'a {
        self.segment_indices(frame)
            .iter()
            .filter_map(move |&i| all.get(i))
    }

    /// Number of frames with no segments.
    pub fn silent_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_empty()).count()
    }
}

/// Aligns narration segments to rendered frames.
#[derive(Debug, Clone, Default)]
pub struct VisualAligner {
    policy: OverflowPolicy,
}

impl VisualAligner {
    /// Create an aligner with the clamp-to-last overflow policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overflow policy.
    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configured overflow policy.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Assign every segment a frame index, or `None` when it was dropped.
    pub fn assign(&self, segments: &[NarrationSegment], frame_count: usize) -> Vec<Option<usize>> {
        if frame_count == 0 {
            if !segments.is_empty() {
                log::warn!("No rendered frames; {} segments cannot be placed", segments.len());
            }
            return vec![None; segments.len()];
        }

        let last = frame_count - 1;
        let mut cursor: Option<usize> = None;
        let mut overflowed = 0usize;

        let assignments: Vec<Option<usize>> = segments
            .iter()
            .map(|segment| {
                if segment.starts_new_visual {
                    cursor = Some(cursor.map_or(0, |c| c + 1));
                }
                let step = cursor.unwrap_or(0);

                if step <= last {
                    return Some(step);
                }

                if segment.starts_new_visual {
                    overflowed += 1;
                    log::warn!(
                        "Slide {} click {}: visual step {} has no rendered frame ({} frames), {}",
                        segment.slide_id,
                        segment.click_id,
                        step + 1,
                        frame_count,
                        match self.policy {
                            OverflowPolicy::ClampToLast => "attaching to last frame",
                            OverflowPolicy::Drop => "dropping its narration",
                        }
                    );
                }

                match self.policy {
                    OverflowPolicy::ClampToLast => Some(last),
                    OverflowPolicy::Drop => None,
                }
            })
            .collect();

        let steps = cursor.map_or(0, |c| c + 1);
        if overflowed > 0 {
            log::warn!("{} visual steps for {} rendered frames", steps, frame_count);
        } else if steps < frame_count {
            log::debug!("{} trailing frames have no narration", frame_count - steps);
        }

        assignments
    }

    /// Build the frame-to-segments map.
    pub fn align(&self, segments: &[NarrationSegment], frame_count: usize) -> AudioVisualMap {
        AudioVisualMap::from_assignments(&self.assign(segments, frame_count), frame_count)
    }
}
