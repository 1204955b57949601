//! Beamer source parser implementation.

use regex::Regex;
use slidecast_core::{Dialect, Markup, NoteBlock, NoteExtractor, TextNormalizer, Unit};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Start of a frame environment.
static FRAME_BEGIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\s*\{frame\}").unwrap());

/// End of a frame environment.
static FRAME_END_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\end\s*\{frame\}").unwrap());

/// `\input{file}` or `\include{file}`.
static INCLUDE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:input|include)\s*\{([^{}]+)\}").unwrap());

#[derive(Debug)]
enum Event {
    FrameBegin,
    FrameEnd,
    Include(String),
    Note(NoteBlock),
}

/// Parser for Beamer `.tex` sources.
#[derive(Debug, Clone)]
pub struct BeamerParser {
    notes: NoteExtractor,
    normalizer: TextNormalizer,
}

impl BeamerParser {
    /// Create a new Beamer parser.
    pub fn new() -> Self {
        Self {
            notes: NoteExtractor::braced("\\note").with_comment_prefix("%"),
            normalizer: TextNormalizer::new().with_markup(Markup::Latex),
        }
    }

    /// Collect structural events in document order.
    fn events(&self, source: &str) -> Vec<(usize, Event)> {
        let masked = mask_comments(source);
        let mut events: Vec<(usize, Event)> = Vec::new();

        events.extend(FRAME_BEGIN_REGEX.find_iter(&masked).map(|m| (m.start(), Event::FrameBegin)));
        events.extend(FRAME_END_REGEX.find_iter(&masked).map(|m| (m.start(), Event::FrameEnd)));
        events.extend(INCLUDE_REGEX.captures_iter(&masked).filter_map(|caps| {
            let whole = caps.get(0)?;
            let reference = caps.get(1)?.as_str().trim().to_string();
            Some((whole.start(), Event::Include(reference)))
        }));
        events.extend(
            self.notes
                .extract(source)
                .into_iter()
                .map(|block| (block.offset, Event::Note(block))),
        );

        events.sort_by_key(|(offset, _)| *offset);
        events
    }
}

impl Default for BeamerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for BeamerParser {
    fn split_units(&self, source: &str) -> Vec<Unit> {
        let mut units = Vec::new();
        let mut open_frame: Option<(usize, Vec<NoteBlock>)> = None;
        let mut last_frame: Option<usize> = None;

        for (offset, event) in self.events(source) {
            let line = line_at(source, offset);
            match event {
                Event::FrameBegin => {
                    if let Some((start, payloads)) = open_frame.take() {
                        log::warn!("Line {}: frame opened at line {} was never closed", line, start);
                        last_frame = Some(units.len());
                        units.push(Unit::Slide { payloads, line: start });
                    }
                    open_frame = Some((line, Vec::new()));
                }
                Event::FrameEnd => match open_frame.take() {
                    Some((start, payloads)) => {
                        last_frame = Some(units.len());
                        units.push(Unit::Slide { payloads, line: start });
                    }
                    None => log::debug!("Line {}: \\end{{frame}} without a matching begin", line),
                },
                Event::Include(reference) => {
                    if open_frame.is_some() {
                        log::debug!("Line {}: ignoring {} inside a frame", line, reference);
                    } else {
                        units.push(Unit::Include { reference, line });
                    }
                }
                Event::Note(block) => {
                    if let Some((_, payloads)) = open_frame.as_mut() {
                        payloads.push(block);
                    } else if let Some(Unit::Slide { payloads, .. }) =
                        last_frame.and_then(|i| units.get_mut(i))
                    {
                        payloads.push(block);
                    } else {
                        units.push(Unit::Slide {
                            line: block.line,
                            payloads: vec![block],
                        });
                    }
                }
            }
        }

        if let Some((start, payloads)) = open_frame {
            log::warn!("Line {}: frame is not closed before end of file", start);
            units.push(Unit::Slide { payloads, line: start });
        }

        units
    }

    /// `\input{chapter}` refers to `chapter.tex` when that file exists.
    fn resolve_reference(&self, base_dir: &Path, reference: &str) -> PathBuf {
        let path = base_dir.join(reference);
        if path.extension().is_none() {
            let tex = path.with_extension("tex");
            if tex.exists() {
                return tex;
            }
        }
        path
    }

    fn clean_payload(&self, payload: &str) -> String {
        self.normalizer.normalize(payload)
    }
}

/// Blank out `%` comments, keeping byte offsets and line breaks intact.
fn mask_comments(source: &str) -> String {
    let mut masked = String::with_capacity(source.len());
    let mut in_comment = false;
    let mut escaped = false;

    for c in source.chars() {
        if c == '\n' {
            in_comment = false;
            escaped = false;
            masked.push(c);
            continue;
        }
        if !in_comment && !escaped && c == '%' {
            in_comment = true;
        }
        if in_comment {
            masked.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            masked.push(c);
        }
        escaped = !escaped && c == '\\';
    }

    masked
}

/// 1-based line number of a byte offset.
fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
