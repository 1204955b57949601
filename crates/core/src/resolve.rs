//! Recursive include resolution.
//!
//! Expands cross-file references depth-first, assigning one continuous run
//! of logical slide ids across every contributing file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::NoteBlock;
use crate::segment::{SegmentParser, SlideCursor};
use crate::types::{visual_step_count, NarrationSegment};
use crate::{Error, Result};

/// A top-level structural unit of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A reference to another source file. Contributes no slide itself.
    Include { reference: String, line: usize },
    /// A content slide with its annotation payloads (possibly none).
    Slide { payloads: Vec<NoteBlock>, line: usize },
    /// Configuration with no visible content.
    Metadata { line: usize },
}

/// A source format: how a file splits into units and where references point.
pub trait Dialect {
    /// Split source text into ordered top-level units.
    fn split_units(&self, source: &str) -> Vec<Unit>;

    /// Resolve a reference relative to the directory of the including file.
    fn resolve_reference(&self, base_dir: &Path, reference: &str) -> PathBuf {
        base_dir.join(reference)
    }

    /// Prepare a payload for segment parsing.
    fn clean_payload(&self, payload: &str) -> String {
        payload.to_string()
    }
}

/// The flattened result of resolving one or more decks.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDeck {
    /// All segments in spoken order.
    pub segments: Vec<NarrationSegment>,
    /// Number of distinct visual states.
    pub visual_steps: usize,
    /// First slide id not used by this deck.
    pub next_slide_id: u32,
}

impl ResolvedDeck {
    /// Number of logical slides in this deck.
    pub fn slide_count(&self) -> u32 {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => last.slide_id - first.slide_id + 1,
            _ => 0,
        }
    }
}

/// Resolves a root file and everything it includes.
#[derive(Debug, Clone)]
pub struct IncludeResolver<D> {
    dialect: D,
    parser: SegmentParser,
}

impl<D: Dialect> IncludeResolver<D> {
    /// Create a resolver for a dialect.
    pub fn new(dialect: D, parser: SegmentParser) -> Self {
        Self { dialect, parser }
    }

    /// Resolve `root` with its first slide numbered `start_slide_id`.
    ///
    /// A missing or unreadable root is fatal; missing or cyclic includes are
    /// skipped with a warning.
    pub fn resolve(&self, root: &Path, start_slide_id: u32) -> Result<ResolvedDeck> {
        let root = root
            .canonicalize()
            .map_err(|_| Error::SourceNotFound(root.to_path_buf()))?;
        if !root.is_file() {
            return Err(Error::SourceNotFound(root));
        }

        let mut on_path = HashSet::new();
        let mut segments = Vec::new();
        let next_slide_id = self.resolve_file(&root, start_slide_id, &mut on_path, &mut segments)?;

        Ok(ResolvedDeck {
            visual_steps: visual_step_count(&segments),
            segments,
            next_slide_id,
        })
    }

    /// Resolve several top-level decks into one continuous numbering.
    pub fn resolve_all<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ResolvedDeck> {
        let mut combined = ResolvedDeck {
            next_slide_id: 1,
            ..Default::default()
        };

        for root in roots {
            let deck = self.resolve(root.as_ref(), combined.next_slide_id)?;
            combined.segments.extend(deck.segments);
            combined.visual_steps += deck.visual_steps;
            combined.next_slide_id = deck.next_slide_id;
        }

        Ok(combined)
    }

    /// Resolve one file in place, returning the next free slide id.
    fn resolve_file(
        &self,
        path: &Path,
        first_slide_id: u32,
        on_path: &mut HashSet<PathBuf>,
        out: &mut Vec<NarrationSegment>,
    ) -> Result<u32> {
        let source = fs::read_to_string(path)?;
        log::debug!("Parsing {}", path.display());

        on_path.insert(path.to_path_buf());
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut slide_id = first_slide_id;

        for unit in self.dialect.split_units(&source) {
            match unit {
                Unit::Include { reference, line } => {
                    let target = self.dialect.resolve_reference(base_dir, &reference);
                    slide_id = self.resolve_include(path, line, &target, slide_id, on_path, out);
                }
                Unit::Slide { payloads, line } => {
                    self.emit_slide(path, line, slide_id, &payloads, out);
                    slide_id += 1;
                }
                Unit::Metadata { line } => {
                    log::debug!("{}:{}: skipping metadata block", path.display(), line);
                }
            }
        }

        on_path.remove(path);
        Ok(slide_id)
    }

    fn resolve_include(
        &self,
        from: &Path,
        line: usize,
        target: &Path,
        slide_id: u32,
        on_path: &mut HashSet<PathBuf>,
        out: &mut Vec<NarrationSegment>,
    ) -> u32 {
        let canonical = match target.canonicalize() {
            Ok(path) if path.is_file() => path,
            _ => {
                log::warn!(
                    "{}:{}: included file not found: {}",
                    from.display(),
                    line,
                    target.display()
                );
                return slide_id;
            }
        };

        if on_path.contains(&canonical) {
            log::warn!(
                "{}:{}: include cycle detected, skipping {}",
                from.display(),
                line,
                canonical.display()
            );
            return slide_id;
        }

        log::debug!("{}:{}: including {} at slide {}", from.display(), line, canonical.display(), slide_id);
        match self.resolve_file(&canonical, slide_id, on_path, out) {
            Ok(next) => next,
            Err(e) => {
                log::warn!(
                    "{}:{}: failed to read included file {}: {}",
                    from.display(),
                    line,
                    canonical.display(),
                    e
                );
                slide_id
            }
        }
    }

    /// Append the segments of one slide. A slide without spoken notes
    /// becomes a single silent hold.
    fn emit_slide(
        &self,
        path: &Path,
        line: usize,
        slide_id: u32,
        payloads: &[NoteBlock],
        out: &mut Vec<NarrationSegment>,
    ) {
        let before = out.len();
        let mut cursor = SlideCursor::new(slide_id);

        for block in payloads {
            let cleaned = self.dialect.clean_payload(&block.payload);
            let (segments, next) = self.parser.parse_at(&cleaned, cursor);
            if segments.is_empty() {
                log::debug!(
                    "{}:{}: empty note on slide {}",
                    path.display(),
                    block.line,
                    slide_id
                );
            }
            out.extend(segments);
            cursor = next;
        }

        if out.len() == before {
            log::debug!("{}:{}: slide {} has no narration, holding silently", path.display(), line, slide_id);
            out.push(NarrationSegment::silent_hold(slide_id, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// One unit per line: `include <path>`, `meta`, or `slide <note>|<note>`.
    struct LineDialect;

    impl Dialect for LineDialect {
        fn split_units(&self, source: &str) -> Vec<Unit> {
            source
                .lines()
                .enumerate()
                .filter_map(|(i, line)| {
                    let line_no = i + 1;
                    if let Some(reference) = line.strip_prefix("include ") {
                        Some(Unit::Include {
                            reference: reference.trim().to_string(),
                            line: line_no,
                        })
                    } else if line.trim() == "meta" {
                        Some(Unit::Metadata { line: line_no })
                    } else if let Some(notes) = line.strip_prefix("slide") {
                        let payloads = notes
                            .split('|')
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(|n| NoteBlock {
                                line: line_no,
                                offset: 0,
                                payload: n.to_string(),
                            })
                            .collect();
                        Some(Unit::Slide {
                            payloads,
                            line: line_no,
                        })
                    } else {
                        None
                    }
                })
                .collect()
        }
    }

    fn resolver() -> IncludeResolver<LineDialect> {
        IncludeResolver::new(LineDialect, SegmentParser::new())
    }

    fn slide_ids(deck: &ResolvedDeck) -> Vec<u32> {
        let mut ids: Vec<u32> = deck.segments.iter().map(|s| s.slide_id).collect();
        ids.dedup();
        ids
    }

    #[test]
    fn test_includes_get_continuous_slide_ids() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("parts")).unwrap();
        fs::write(
            dir.path().join("main.txt"),
            "meta\nslide Opening.\ninclude parts/a.txt\nslide Middle.\ninclude parts/b.txt\n",
        )
        .unwrap();
        fs::write(dir.path().join("parts/a.txt"), "slide A1.\nslide A2.\n").unwrap();
        fs::write(dir.path().join("parts/b.txt"), "include c.txt\nslide B1.\n").unwrap();
        fs::write(dir.path().join("parts/c.txt"), "slide C1.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 1).unwrap();

        assert_eq!(slide_ids(&deck), vec![1, 2, 3, 4, 5, 6]);
        let texts: Vec<&str> = deck.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Opening.", "A1.", "A2.", "Middle.", "C1.", "B1."]);
        assert_eq!(deck.next_slide_id, 7);
        assert_eq!(deck.visual_steps, 6);
        assert_eq!(deck.slide_count(), 6);
    }

    #[test]
    fn test_cycle_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "slide A.\ninclude b.txt\n").unwrap();
        fs::write(dir.path().join("b.txt"), "slide B.\ninclude a.txt\nslide B2.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("a.txt"), 1).unwrap();

        let texts: Vec<&str> = deck.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["A.", "B.", "B2."]);
        assert_eq!(slide_ids(&deck), vec![1, 2, 3]);
    }

    #[test]
    fn test_same_file_twice_without_cycle() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "include shared.txt\ninclude shared.txt\n").unwrap();
        fs::write(dir.path().join("shared.txt"), "slide Shared.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 1).unwrap();
        assert_eq!(slide_ids(&deck), vec![1, 2]);
    }

    #[test]
    fn test_missing_include_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "slide One.\ninclude gone.txt\nslide Two.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 1).unwrap();
        assert_eq!(slide_ids(&deck), vec![1, 2]);
        assert_eq!(deck.segments[1].text, "Two.");
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = resolver().resolve(&dir.path().join("nope.txt"), 1).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_slide_without_notes_is_silent_hold() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "slide\nslide Spoken.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 1).unwrap();
        assert_eq!(deck.segments.len(), 2);
        assert!(deck.segments[0].is_silent());
        assert!(deck.segments[0].starts_new_visual);
        assert_eq!(deck.segments[0].slide_id, 1);
    }

    #[test]
    fn test_multiple_payloads_continue_clicks() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "slide First. [click] Second. | Third.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 1).unwrap();
        let clicks: Vec<u32> = deck.segments.iter().map(|s| s.click_id).collect();
        assert_eq!(clicks, vec![0, 1, 2]);
        assert_eq!(deck.visual_steps, 3);
        assert!(deck.segments.iter().all(|s| s.slide_id == 1));
    }

    #[test]
    fn test_resolve_all_chains_numbering() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "slide A.\nslide B.\n").unwrap();
        fs::write(dir.path().join("two.txt"), "slide C.\n").unwrap();

        let deck = resolver()
            .resolve_all(&[dir.path().join("one.txt"), dir.path().join("two.txt")])
            .unwrap();
        assert_eq!(slide_ids(&deck), vec![1, 2, 3]);
        assert_eq!(deck.next_slide_id, 4);
    }

    #[test]
    fn test_start_slide_id_offsets_numbering() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "slide A.\nslide B.\n").unwrap();

        let deck = resolver().resolve(&dir.path().join("main.txt"), 10).unwrap();
        assert_eq!(slide_ids(&deck), vec![10, 11]);
        assert_eq!(deck.next_slide_id, 12);
    }
}
