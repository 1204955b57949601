//! Domain types for narration segments and deck sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One unit of narration, in spoken order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationSegment {
    /// Spoken content. Empty means a silent hold.
    pub text: String,

    /// Speaker name. `None` is the default narrator voice.
    pub speaker: Option<String>,

    /// True for the first segment of a new visual state.
    pub starts_new_visual: bool,

    /// 1-based logical slide number across the fully resolved deck.
    pub slide_id: u32,

    /// 0-based click index within the slide.
    pub click_id: u32,
}

impl NarrationSegment {
    /// Create a segment that continues the current visual state.
    pub fn new(text: impl Into<String>, speaker: Option<String>, slide_id: u32, click_id: u32) -> Self {
        Self {
            text: text.into(),
            speaker,
            starts_new_visual: false,
            slide_id,
            click_id,
        }
    }

    /// Create a silent hold that opens a new visual state.
    pub fn silent_hold(slide_id: u32, click_id: u32) -> Self {
        Self {
            text: String::new(),
            speaker: None,
            starts_new_visual: true,
            slide_id,
            click_id,
        }
    }

    /// Mark this segment as opening a new visual state.
    pub fn opening_visual(mut self) -> Self {
        self.starts_new_visual = true;
        self
    }

    /// Whether this segment has nothing to say.
    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Count the distinct visual states in a segment sequence.
pub fn visual_step_count(segments: &[NarrationSegment]) -> usize {
    segments.iter().filter(|s| s.starts_new_visual).count()
}

/// Drop all speaker attributions, collapsing the deck to a single narrator.
pub fn strip_speakers(segments: &mut [NarrationSegment]) {
    for segment in segments {
        segment.speaker = None;
    }
}

/// The dialect of a deck source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// LaTeX Beamer with `\note{}` annotations.
    Beamer,
    /// Slidev Markdown with `<!-- -->` presenter notes.
    Slidev,
}

impl SourceFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "tex" => Some(Self::Beamer),
            "md" | "markdown" => Some(Self::Slidev),
            _ => None,
        }
    }
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    Hd720,
    #[default]
    Hd1080,
    Uhd4k,
}

impl Resolution {
    /// Pixel dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Hd720 => (1280, 720),
            Self::Hd1080 => (1920, 1080),
            Self::Uhd4k => (3840, 2160),
        }
    }

    /// Target video bitrate for ffmpeg.
    pub fn video_bitrate(&self) -> &'static str {
        match self {
            Self::Uhd4k => "50000k",
            _ => "8000k",
        }
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "720p" => Ok(Self::Hd720),
            "1080p" => Ok(Self::Hd1080),
            "4k" | "2160p" => Ok(Self::Uhd4k),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown resolution '{}', expected 720p, 1080p or 4k",
                other
            ))),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
            Self::Uhd4k => "4k",
        };
        f.write_str(label)
    }
}
