//! Core narration model for slide decks: note extraction, segment parsing,
//! include resolution, frame alignment, and run orchestration.

pub mod align;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod range;
pub mod resolve;
pub mod segment;
pub mod types;

pub use align::{AudioVisualMap, OverflowPolicy, VisualAligner};
pub use error::{Error, Result};
pub use extract::{BlockSyntax, NoteBlock, NoteExtractor};
pub use normalize::{Markup, TextNormalizer};
pub use pipeline::{
    AudioClip, FrameRenderer, Pipeline, PipelineOptions, Plan, RunSummary, SpeechSynthesizer,
    VideoAssembler,
};
pub use range::{RangeFilter, RangeSelection, SelectedSegment, SlideRange};
pub use resolve::{Dialect, IncludeResolver, ResolvedDeck, Unit};
pub use segment::{LineMode, SegmentParser, SlideCursor};
pub use types::{NarrationSegment, Resolution, SourceFormat};
