//! Slidev source parser implementation.

use regex::Regex;
use slidecast_core::{Dialect, Markup, NoteBlock, NoteExtractor, TextNormalizer, Unit};
use std::sync::LazyLock;

/// A top-level YAML `key: value` line.
static FRONTMATTER_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*:(\s|$)").unwrap());

/// `src:` frontmatter importing another Markdown file.
static SRC_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^src:\s*(.*?)\s*$").unwrap());

/// One `---`-delimited part of a Slidev file.
#[derive(Debug, Clone, Copy)]
struct Section<'a> {
    /// 1-based line of the first line of the section.
    line: usize,
    text: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
enum SectionKind {
    Empty,
    Include(String),
    Metadata,
    Content,
}

/// Parser for Slidev `.md` sources.
#[derive(Debug, Clone)]
pub struct SlidevParser {
    notes: NoteExtractor,
    normalizer: TextNormalizer,
}

impl SlidevParser {
    /// Create a new Slidev parser.
    pub fn new() -> Self {
        Self {
            notes: NoteExtractor::fenced("<!--", "-->"),
            normalizer: TextNormalizer::new().with_markup(Markup::Markdown),
        }
    }

    /// The presenter notes of a section: its last HTML comment.
    fn section_notes(&self, section: &Section<'_>) -> Option<NoteBlock> {
        self.notes.extract(section.text).pop().map(|block| NoteBlock {
            line: section.line + block.line - 1,
            ..block
        })
    }
}

impl Default for SlidevParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for SlidevParser {
    fn split_units(&self, source: &str) -> Vec<Unit> {
        let mut units = Vec::new();
        // The section after `src:` frontmatter is the imported slide's body.
        let mut in_src_body = false;
        // Line of frontmatter still waiting for its slide body.
        let mut open_frontmatter: Option<usize> = None;

        for section in split_sections(source) {
            let kind = classify(section.text);

            if let Some(line) = open_frontmatter.take() {
                if !matches!(kind, SectionKind::Content) {
                    units.push(Unit::Slide {
                        payloads: Vec::new(),
                        line,
                    });
                }
            }

            if in_src_body {
                in_src_body = false;
                if matches!(kind, SectionKind::Empty | SectionKind::Content) {
                    if self.section_notes(&section).is_some() {
                        log::warn!(
                            "Line {}: notes on a slide imported with src: are ignored",
                            section.line
                        );
                    }
                    continue;
                }
            }

            match kind {
                SectionKind::Empty => {}
                SectionKind::Include(reference) => {
                    if self.section_notes(&section).is_some() {
                        log::warn!(
                            "Line {}: notes on a slide imported with src: are ignored",
                            section.line
                        );
                    }
                    units.push(Unit::Include {
                        reference,
                        line: section.line,
                    });
                    in_src_body = true;
                }
                SectionKind::Metadata => {
                    units.push(Unit::Metadata { line: section.line });
                    open_frontmatter = Some(section.line);
                }
                SectionKind::Content => units.push(Unit::Slide {
                    payloads: self.section_notes(&section).into_iter().collect(),
                    line: section.line,
                }),
            }
        }

        if let Some(line) = open_frontmatter {
            units.push(Unit::Slide {
                payloads: Vec::new(),
                line,
            });
        }

        units
    }

    fn clean_payload(&self, payload: &str) -> String {
        self.normalizer.normalize(payload)
    }
}

/// Split on `---` lines outside fenced code blocks.
fn split_sections(source: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut start_line = 1;
    let mut offset = 0;
    let mut in_fence = false;

    for (i, line) in source.split_inclusive('\n').enumerate() {
        let content = line.trim_end();
        let trimmed = content.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && content == "---" {
            sections.push(Section {
                line: start_line,
                text: &source[start..offset],
            });
            start = offset + line.len();
            start_line = i + 2;
        }

        offset += line.len();
    }

    sections.push(Section {
        line: start_line,
        text: &source[start..],
    });
    sections
}

/// Decide what a section is. Only sections made purely of top-level
/// `key: value` lines are metadata; anything with notes, headings, prose or
/// markup is a slide.
fn classify(text: &str) -> SectionKind {
    if text.trim().is_empty() {
        return SectionKind::Empty;
    }

    let top_level: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with(char::is_whitespace))
        .collect();

    let is_frontmatter = !text.contains("<!--")
        && !top_level.is_empty()
        && top_level.iter().all(|line| FRONTMATTER_KEY_REGEX.is_match(line));

    if !is_frontmatter {
        return SectionKind::Content;
    }

    let src = top_level
        .iter()
        .find_map(|line| SRC_REGEX.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
        .filter(|value| !value.is_empty());

    match src {
        Some(value) => SectionKind::Include(strip_fragment(value)),
        None => SectionKind::Metadata,
    }
}

/// Drop a `#2-5` slide selector from an import path; the whole file is used.
fn strip_fragment(reference: &str) -> String {
    match reference.split_once('#') {
        Some((path, fragment)) => {
            log::warn!(
                "Slide selection #{} in {} is not supported, importing every slide",
                fragment,
                reference
            );
            path.to_string()
        }
        None => reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecast_core::{IncludeResolver, SegmentParser};
    use std::fs;
    use tempfile::tempdir;

    fn kinds(units: &[Unit]) -> Vec<String> {
        units
            .iter()
            .map(|u| match u {
                Unit::Include { reference, .. } => format!("include {}", reference),
                Unit::Slide { payloads, .. } => match payloads.first() {
                    Some(block) => format!("slide {}", block.payload),
                    None => "slide".to_string(),
                },
                Unit::Metadata { .. } => "meta".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_headmatter_and_slide_frontmatter() {
        let src = "---\ntheme: seriph\ntitle: Demo\n---\n\n# Welcome\n\n<!-- Hello there. -->\n\n---\nlayout: center\nclass: text-center\n---\n\n# Second\n";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(
            kinds(&units),
            vec!["meta", "slide Hello there.", "meta", "slide"]
        );
    }

    #[test]
    fn test_separator_inside_code_fence_is_ignored() {
        let src = "# One\n\n```yaml\n---\nkey: value\n---\n```\n\n---\n\n# Two";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(kinds(&units), vec!["slide", "slide"]);
    }

    #[test]
    fn test_last_comment_is_the_notes() {
        let src = "# Title\n<!-- layout hint -->\n\nText\n\n<!--\nSarah: Real notes.\n-->\n";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(kinds(&units), vec!["slide Sarah: Real notes."]);
        match &units[0] {
            Unit::Slide { payloads, .. } => assert_eq!(payloads[0].line, 6),
            other => panic!("unexpected unit {:?}", other),
        }
    }

    #[test]
    fn test_comment_only_and_heading_sections_are_slides() {
        let src = "<!-- just notes -->\n---\n# Heading only\n---\nSarah: hello\n";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(kinds(&units), vec!["slide just notes", "slide", "meta", "slide"]);
    }

    #[test]
    fn test_frontmatter_with_empty_body_is_a_slide() {
        let src = "# One\n<!-- First. -->\n---\nlayout: image\nimage: ./pic.png\n---\n\n---\n# Three\n<!-- Third. -->\n";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(
            kinds(&units),
            vec!["slide First.", "meta", "slide", "slide Third."]
        );

        let units = SlidevParser::new().split_units("# One\n---\nlayout: end\n");
        assert_eq!(kinds(&units), vec!["slide", "meta", "slide"]);
    }

    #[test]
    fn test_indented_yaml_is_metadata() {
        let src = "---\ntransition: slide-left\nfonts:\n  sans: Robin\n  mono: Fira\n---\n# Deck";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(kinds(&units), vec!["meta", "slide"]);
    }

    #[test]
    fn test_src_import_with_fragment() {
        let src = "# Intro\n\n---\nsrc: ./pages/part.md#2-3\n---\n\n<!-- ignored notes -->\n\n---\n\n# Outro";
        let units = SlidevParser::new().split_units(src);
        assert_eq!(
            kinds(&units),
            vec!["slide", "include ./pages/part.md", "slide"]
        );
    }

    #[test]
    fn test_quoted_src_value() {
        assert_eq!(
            classify("src: \"./a.md\"\nhide: false"),
            SectionKind::Include("./a.md".to_string())
        );
        assert_eq!(classify("src:"), SectionKind::Metadata);
    }

    #[test]
    fn test_section_lines() {
        let sections = split_sections("a\n---\nb\nc\n---\nd");
        let lines: Vec<(usize, &str)> = sections.iter().map(|s| (s.line, s.text)).collect();
        assert_eq!(lines, vec![(1, "a\n"), (3, "b\nc\n"), (6, "d")]);
    }

    #[test]
    fn test_clean_payload_strips_markdown() {
        let cleaned = SlidevParser::new().clean_payload("Sarah: This is **bold**.\n[click]\nJames: See `code`.");
        assert_eq!(cleaned, "Sarah: This is bold.\n[click]\nJames: See code.");
    }

    #[test]
    fn test_resolves_src_imports() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("pages")).unwrap();
        fs::write(
            dir.path().join("slides.md"),
            "---\ntheme: default\n---\n# One\n<!-- First. -->\n---\nsrc: ./pages/middle.md\n---\n\n---\n# Four\n<!-- Fourth. [click] Sarah: Again. -->\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("pages/middle.md"),
            "# Two\n<!-- Second. -->\n---\n# Three\n",
        )
        .unwrap();

        let resolver = IncludeResolver::new(SlidevParser::new(), SegmentParser::new());
        let deck = resolver.resolve(&dir.path().join("slides.md"), 1).unwrap();

        let summary: Vec<(&str, u32, u32)> = deck
            .segments
            .iter()
            .map(|s| (s.text.as_str(), s.slide_id, s.click_id))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("First.", 1, 0),
                ("Second.", 2, 0),
                ("", 3, 0),
                ("Fourth.", 4, 0),
                ("Again.", 4, 1),
            ]
        );
        assert_eq!(deck.visual_steps, 5);
    }

    #[test]
    fn test_frontmatter_only_slide_keeps_numbering() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("slides.md"),
            "# One\n<!-- First. -->\n---\nlayout: image\nimage: ./pic.png\n---\n\n---\n# Three\n<!-- Third. -->\n",
        )
        .unwrap();

        let resolver = IncludeResolver::new(SlidevParser::new(), SegmentParser::new());
        let deck = resolver.resolve(&dir.path().join("slides.md"), 1).unwrap();

        let summary: Vec<(&str, u32)> = deck
            .segments
            .iter()
            .map(|s| (s.text.as_str(), s.slide_id))
            .collect();
        assert_eq!(summary, vec![("First.", 1), ("", 2), ("Third.", 3)]);
        assert_eq!(deck.visual_steps, 3);
    }
}
