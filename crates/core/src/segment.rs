//! Narration segment parsing.
//!
//! Turns one annotation payload into ordered, speaker-tagged segments. Click
//! markers (`[click]`, `[click:3]`) split the payload into visual states; a
//! leading `Name: ` on a line switches the speaker.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::NarrationSegment;

/// Default click marker: `[click]` or `[click:N]`.
static CLICK_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[click(?::\s*(\d+))?\]").unwrap());

/// A speaker prefix: a letter, then letters, spaces or dots, then a colon
/// followed by whitespace or end of line.
static SPEAKER_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z .]*?)\s*:(?:\s+(.*))?$").unwrap());

/// Names longer than this are treated as prose, not speakers.
const MAX_SPEAKER_WORDS: usize = 3;
const MAX_SPEAKER_CHARS: usize = 32;

/// Largest forward jump an explicit `[click:N]` may make. Larger jumps are
/// treated as a plain `[click]`.
const MAX_CLICK_GAP: u32 = 64;

/// Labels that look like `Word: text` but are structural, not people.
const DEFAULT_IGNORED_SPEAKERS: &[&str] = &["Section", "Slide", "Frame", "Note", "Narrator"];

/// How unprefixed lines within a click chunk become segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Unprefixed lines are appended to the current speaker's segment.
    Merge,
    /// Every non-empty line is its own segment, sharing the current speaker.
    #[default]
    PerLine,
}

/// Running position within one logical slide.
///
/// Threaded through consecutive payloads of the same slide so that a second
/// `\note{}` on a frame continues at the next click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideCursor {
    pub slide_id: u32,
    pub next_click: u32,
}

impl SlideCursor {
    /// Cursor at the first click of a slide.
    pub fn new(slide_id: u32) -> Self {
        Self {
            slide_id,
            next_click: 0,
        }
    }
}

/// Parser for annotation payloads.
#[derive(Debug, Clone)]
pub struct SegmentParser {
    line_mode: LineMode,
    ignored_speakers: HashSet<String>,
    click_marker: Regex,
}

impl Default for SegmentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentParser {
    /// Create a parser with the default click marker and ignore-list.
    pub fn new() -> Self {
        Self {
            line_mode: LineMode::default(),
            ignored_speakers: DEFAULT_IGNORED_SPEAKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            click_marker: CLICK_MARKER_REGEX.clone(),
        }
    }

    /// Set how unprefixed lines are grouped.
    pub fn with_line_mode(mut self, mode: LineMode) -> Self {
        self.line_mode = mode;
        self
    }

    /// Add names that must never be detected as speakers.
    pub fn with_ignored_speakers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_speakers
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Use a custom click marker. Capture group 1, if present and matched,
    /// carries an explicit click index.
    pub fn with_click_marker(mut self, marker: Regex) -> Self {
        self.click_marker = marker;
        self
    }

    /// Whether the text contains at least one click marker.
    pub fn has_click_markers(&self, text: &str) -> bool {
        self.click_marker.is_match(text)
    }

    /// Parse a standalone payload as click 0 of `slide_id`.
    pub fn parse(&self, payload: &str, slide_id: u32) -> Vec<NarrationSegment> {
        self.parse_at(payload, SlideCursor::new(slide_id)).0
    }

    /// Parse a payload starting at `cursor`, returning the segments and the
    /// cursor for the next payload of the same slide.
    ///
    /// A payload with no spoken text yields no segments and leaves the
    /// cursor unchanged.
    pub fn parse_at(&self, payload: &str, cursor: SlideCursor) -> (Vec<NarrationSegment>, SlideCursor) {
        if self.click_marker.replace_all(payload, "").trim().is_empty() {
            return (Vec::new(), cursor);
        }

        let slide_id = cursor.slide_id;
        let mut segments = Vec::new();
        let mut speaker: Option<String> = None;
        let mut click = cursor.next_click;
        let mut chunk_start = 0;

        for marker in self.click_marker.captures_iter(payload) {
            // Group 0 always participates in a match.
            let Some(whole) = marker.get(0) else { continue };

            let chunk = &payload[chunk_start..whole.start()];
            segments.extend(self.parse_chunk(chunk, &mut speaker, slide_id, click));
            chunk_start = whole.end();

            let explicit = marker.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            let next_click = click.saturating_add(1);
            click = match explicit {
                Some(target) if target > click && target - click <= MAX_CLICK_GAP => {
                    for skipped in next_click..target {
                        segments.push(NarrationSegment::silent_hold(slide_id, skipped));
                    }
                    target
                }
                Some(target) if target > click => {
                    log::warn!(
                        "Slide {}: click index {} jumps more than {} past {}, using {}",
                        slide_id,
                        target,
                        MAX_CLICK_GAP,
                        click,
                        next_click
                    );
                    next_click
                }
                Some(target) => {
                    log::warn!(
                        "Slide {}: click index {} does not advance past {}, using {}",
                        slide_id,
                        target,
                        click,
                        next_click
                    );
                    next_click
                }
                None => next_click,
            };
        }

        let tail = &payload[chunk_start..];
        segments.extend(self.parse_chunk(tail, &mut speaker, slide_id, click));

        let next = SlideCursor {
            slide_id,
            next_click: click.saturating_add(1),
        };
        (segments, next)
    }

    /// Parse one click-delimited chunk. The first segment opens the visual
    /// state; an empty chunk becomes a silent hold.
    fn parse_chunk(
        &self,
        chunk: &str,
        speaker: &mut Option<String>,
        slide_id: u32,
        click_id: u32,
    ) -> Vec<NarrationSegment> {
        let mut segments = Vec::new();
        let mut buffer = String::new();

        for line in chunk.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.detect_speaker(line) {
                Some((name, rest)) => {
                    flush(&mut buffer, speaker, slide_id, click_id, &mut segments);
                    *speaker = Some(name);
                    match self.line_mode {
                        LineMode::Merge => buffer.push_str(rest),
                        LineMode::PerLine if !rest.is_empty() => segments.push(
                            NarrationSegment::new(rest, speaker.clone(), slide_id, click_id),
                        ),
                        LineMode::PerLine => {}
                    }
                }
                None => match self.line_mode {
                    LineMode::Merge => {
                        if !buffer.is_empty() {
                            buffer.push(' ');
                        }
                        buffer.push_str(line);
                    }
                    LineMode::PerLine => segments.push(NarrationSegment::new(
                        line,
                        speaker.clone(),
                        slide_id,
                        click_id,
                    )),
                },
            }
        }
        flush(&mut buffer, speaker, slide_id, click_id, &mut segments);

        match segments.first_mut() {
            Some(first) => first.starts_new_visual = true,
            None => segments.push(NarrationSegment::silent_hold(slide_id, click_id)),
        }

        segments
    }

    /// Split a `Name: text` line into speaker and text.
    fn detect_speaker<'a>(&self, line: &'a str) -> Option<(String, &'a str)> {
        let caps = SPEAKER_PREFIX_REGEX.captures(line)?;
        let name = caps.get(1)?.as_str().trim();

        if name.split_whitespace().count() > MAX_SPEAKER_WORDS
            || name.len() > MAX_SPEAKER_CHARS
            || self.ignored_speakers.contains(name)
        {
            return None;
        }

        let rest = caps.get(2).map_or("", |m| m.as_str().trim());
        Some((name.to_string(), rest))
    }
}

fn flush(
    buffer: &mut String,
    speaker: &Option<String>,
    slide_id: u32,
    click_id: u32,
    segments: &mut Vec<NarrationSegment>,
) {
    if !buffer.trim().is_empty() {
        segments.push(NarrationSegment::new(
            buffer.trim(),
            speaker.clone(),
            slide_id,
            click_id,
        ));
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::visual_step_count;

    fn summary(segments: &[NarrationSegment]) -> Vec<(&str, Option<&str>, bool, u32)> {
        segments
            .iter()
            .map(|s| (s.text.as_str(), s.speaker.as_deref(), s.starts_new_visual, s.click_id))
            .collect()
    }

    #[test]
    fn test_click_and_speaker_example() {
        let parser = SegmentParser::new();
        let segments =
            parser.parse("Intro text. [click] Sarah: Second point. [click] James: Third.", 1);

        assert_eq!(
            summary(&segments),
            vec![
                ("Intro text.", None, true, 0),
                ("Second point.", Some("Sarah"), true, 1),
                ("Third.", Some("James"), true, 2),
            ]
        );
        assert_eq!(visual_step_count(&segments), 3);
    }

    #[test]
    fn test_no_click_markers_single_visual() {
        let parser = SegmentParser::new();
        let segments = parser.parse("Line one.\nLine two.\nLine three.", 4);

        assert_eq!(segments.len(), 3);
        assert_eq!(visual_step_count(&segments), 1);
        assert!(segments[0].starts_new_visual);
        assert!(segments.iter().all(|s| s.slide_id == 4 && s.click_id == 0));
    }

    #[test]
    fn test_k_bare_markers_give_k_plus_one_visuals() {
        let parser = SegmentParser::new();
        for k in 0..5 {
            let payload = (0..=k)
                .map(|i| format!("Part {}.", i))
                .collect::<Vec<_>>()
                .join(" [click] ");
            let segments = parser.parse(&payload, 1);
            assert_eq!(visual_step_count(&segments), k + 1);
        }
    }

    #[test]
    fn test_speaker_continues_across_lines_in_merge_mode() {
        let parser = SegmentParser::new().with_line_mode(LineMode::Merge);
        let segments = parser.parse("Sarah: Hello there.\nHow are you?\nJames: Fine.", 1);

        assert_eq!(
            summary(&segments),
            vec![
                ("Hello there. How are you?", Some("Sarah"), true, 0),
                ("Fine.", Some("James"), false, 0),
            ]
        );
    }

    #[test]
    fn test_per_line_mode_shares_speaker() {
        let parser = SegmentParser::new().with_line_mode(LineMode::PerLine);
        let segments = parser.parse("Sarah: Hello there.\nHow are you?", 1);

        assert_eq!(
            summary(&segments),
            vec![
                ("Hello there.", Some("Sarah"), true, 0),
                ("How are you?", Some("Sarah"), false, 0),
            ]
        );
    }

    #[test]
    fn test_speaker_carries_across_clicks() {
        let parser = SegmentParser::new();
        let segments = parser.parse("Sarah: First. [click] Still me.", 1);
        assert_eq!(segments[1].speaker.as_deref(), Some("Sarah"));
        assert!(segments[1].starts_new_visual);
    }

    #[test]
    fn test_ignored_speakers_are_text() {
        let parser = SegmentParser::new().with_ignored_speakers(["Summary"]);
        let segments = parser.parse("Note: this is a label.\nSummary: also a label.", 1);

        assert_eq!(segments[0].speaker, None);
        assert_eq!(segments[0].text, "Note: this is a label.");
        assert_eq!(segments[1].speaker, None);
    }

    #[test]
    fn test_dotted_speaker_name() {
        let parser = SegmentParser::new();
        let segments = parser.parse("Dr. James: Welcome.", 1);
        assert_eq!(segments[0].speaker.as_deref(), Some("Dr. James"));
        assert_eq!(segments[0].text, "Welcome.");
    }

    #[test]
    fn test_long_prefix_is_prose() {
        let parser = SegmentParser::new();
        let segments = parser.parse("The key idea here is simple: reuse.", 1);
        assert_eq!(segments[0].speaker, None);
    }

    #[test]
    fn test_empty_payload_yields_nothing() {
        let parser = SegmentParser::new();
        let cursor = SlideCursor::new(2);
        let (segments, next) = parser.parse_at("  \n [click] \n", cursor);
        assert!(segments.is_empty());
        assert_eq!(next, cursor);
    }

    #[test]
    fn test_leading_marker_gives_silent_first_state() {
        let parser = SegmentParser::new();
        let segments = parser.parse("[click] After the click.", 1);

        assert_eq!(
            summary(&segments),
            vec![("", None, true, 0), ("After the click.", None, true, 1)]
        );
    }

    #[test]
    fn test_explicit_click_index_fills_gaps() {
        let parser = SegmentParser::new();
        let segments = parser.parse("Start. [click:3] Jumped.", 1);

        assert_eq!(
            summary(&segments),
            vec![
                ("Start.", None, true, 0),
                ("", None, true, 1),
                ("", None, true, 2),
                ("Jumped.", None, true, 3),
            ]
        );
    }

    #[test]
    fn test_explicit_click_index_gap_is_capped() {
        let parser = SegmentParser::new();
        let segments = parser.parse("Hi [click:50000000] Bye", 1);
        assert_eq!(
            summary(&segments),
            vec![("Hi", None, true, 0), ("Bye", None, true, 1)]
        );

        let segments = parser.parse("Gap [click:64] End", 1);
        assert_eq!(segments.len(), 65);
        assert_eq!(segments.last().map(|s| s.click_id), Some(64));
    }

    #[test]
    fn test_click_index_at_u32_max_does_not_overflow() {
        let parser = SegmentParser::new();
        let (segments, cursor) = parser.parse_at(
            "A [click] B [click] C",
            SlideCursor { slide_id: 1, next_click: u32::MAX - 1 },
        );
        let clicks: Vec<u32> = segments.iter().map(|s| s.click_id).collect();
        assert_eq!(clicks, vec![u32::MAX - 1, u32::MAX, u32::MAX]);
        assert_eq!(cursor.next_click, u32::MAX);
    }

    #[test]
    fn test_explicit_click_index_never_goes_back() {
        let parser = SegmentParser::new();
        let segments = parser.parse("A [click] B [click:1] C", 1);
        let clicks: Vec<u32> = segments.iter().map(|s| s.click_id).collect();
        assert_eq!(clicks, vec![0, 1, 2]);
    }

    #[test]
    fn test_cursor_threads_between_payloads() {
        let parser = SegmentParser::new();
        let (first, cursor) = parser.parse_at("One. [click] Two.", SlideCursor::new(5));
        let (second, cursor) = parser.parse_at("Three.", cursor);

        assert_eq!(first.last().unwrap().click_id, 1);
        assert_eq!(second[0].click_id, 2);
        assert!(second[0].starts_new_visual);
        assert_eq!(cursor.next_click, 3);
    }

    #[test]
    fn test_has_click_markers() {
        let parser = SegmentParser::new();
        assert!(parser.has_click_markers("a [CLICK] b"));
        assert!(parser.has_click_markers("a [click:2] b"));
        assert!(!parser.has_click_markers("a click b"));
    }
}
