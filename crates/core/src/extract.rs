//! Annotation block extraction.
//!
//! Finds narration payloads in raw source text, in document order. Braced
//! blocks (`\note{...}`) are read with an explicit depth counter so nested
//! groups such as `\textbf{...}` stay inside the payload.

/// How an annotation block is delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSyntax {
    /// A command marker followed by a balanced `{...}` group. Overlay
    /// specifications (`<2->`) and options (`[item]`) between the marker and
    /// the opening brace are skipped.
    Braced { marker: String },
    /// A block delimited by fixed open and close tokens, e.g. `<!--` / `-->`.
    Fenced { open: String, close: String },
}

/// One extracted annotation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteBlock {
    /// 1-based line of the opening marker.
    pub line: usize,
    /// Byte offset of the opening marker.
    pub offset: usize,
    /// Trimmed payload text.
    pub payload: String,
}

/// Extracts annotation payloads from source text.
#[derive(Debug, Clone)]
pub struct NoteExtractor {
    syntax: BlockSyntax,
    /// Markers preceded by this token on the same line are commented out.
    comment_prefix: Option<String>,
}

impl NoteExtractor {
    /// Extractor for `marker{...}` blocks.
    pub fn braced(marker: impl Into<String>) -> Self {
        Self {
            syntax: BlockSyntax::Braced {
                marker: marker.into(),
            },
            comment_prefix: None,
        }
    }

    /// Extractor for `open ... close` blocks.
    pub fn fenced(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            syntax: BlockSyntax::Fenced {
                open: open.into(),
                close: close.into(),
            },
            comment_prefix: None,
        }
    }

    /// Skip blocks whose marker follows this comment token on its line.
    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = Some(prefix.into());
        self
    }

    /// Extract all non-empty blocks in document order.
    pub fn extract(&self, source: &str) -> Vec<NoteBlock> {
        let (open, close) = match &self.syntax {
            BlockSyntax::Braced { marker } => (marker.as_str(), None),
            BlockSyntax::Fenced { open, close } => (open.as_str(), Some(close.as_str())),
        };

        let mut blocks = Vec::new();
        if open.is_empty() {
            return blocks;
        }

        let mut cursor = 0;
        let mut line = 1;
        let mut line_cursor = 0;

        while let Some(found) = source[cursor..].find(open) {
            let start = cursor + found;
            let after_open = start + open.len();
            line += source[line_cursor..start].matches('\n').count();
            line_cursor = start;

            if self.is_commented(source, start) {
                cursor = after_open;
                continue;
            }

            let (payload, end, closed) = match close {
                None => match skip_to_open_brace(&source[after_open..]) {
                    Some(offset) => read_balanced(source, after_open + offset),
                    None => {
                        cursor = after_open;
                        continue;
                    }
                },
                Some(close) => read_fenced(source, after_open, close),
            };

            if !closed {
                log::warn!("Unterminated annotation block at line {}", line);
            }

            let payload = payload.trim();
            if !payload.is_empty() {
                blocks.push(NoteBlock {
                    line,
                    offset: start,
                    payload: payload.to_string(),
                });
            }

            cursor = end;
        }

        blocks
    }

    /// Extract payload strings only.
    pub fn extract_payloads(&self, source: &str) -> Vec<String> {
        self.extract(source).into_iter().map(|b| b.payload).collect()
    }

    fn is_commented(&self, source: &str, marker_start: usize) -> bool {
        let Some(prefix) = self.comment_prefix.as_deref() else {
            return false;
        };
        let line_start = source[..marker_start].rfind('\n').map_or(0, |i| i + 1);
        let before = &source[line_start..marker_start];

        // A prefix after an odd run of backslashes is escaped; `\\%` is a
        // line break followed by a real comment.
        before.match_indices(prefix).any(|(i, _)| {
            let backslashes = before[..i].bytes().rev().take_while(|&b| b == b'\\').count();
            backslashes % 2 == 0
        })
    }
}

/// Skip overlay specs and options after a braced marker.
///
/// Returns the offset just past the opening brace, or `None` if the marker is
/// not followed by a group (e.g. `\notesize` when looking for `\note`).
fn skip_to_open_brace(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices().peekable();

    if let Some(&(_, c)) = chars.peek() {
        if c.is_alphabetic() {
            return None;
        }
    }

    while let Some((i, c)) = chars.next() {
        match c {
            '{' => return Some(i + 1),
            '<' | '[' => {
                let closing = if c == '<' { '>' } else { ']' };
                chars.by_ref().find(|&(_, ch)| ch == closing)?;
            }
            c if c.is_whitespace() => {}
            _ => return None,
        }
    }

    None
}

/// Read a balanced group starting right after its opening brace.
///
/// Returns the payload, the byte offset just past the closing brace, and
/// whether the group was closed. An unterminated group consumes the rest of
/// the input.
fn read_balanced(source: &str, body_start: usize) -> (&str, usize, bool) {
    let body = &source[body_start..];
    let mut depth = 1usize;
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            // Escaped characters, including \{ and \}, never change depth.
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (&body[..i], body_start + i + 1, true);
                }
            }
            _ => {}
        }
    }

    (body, source.len(), false)
}

fn read_fenced<'a>(source: &'a str, body_start: usize, close: &str) -> (&'a str, usize, bool) {
    let body = &source[body_start..];
    match body.find(close) {
        Some(i) => (&body[..i], body_start + i + close.len(), true),
        None => (body, source.len(), false),
    }
}
