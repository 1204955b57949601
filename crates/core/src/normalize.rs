//! Text normalization for narration.
//!
//! Cleans annotation payloads before segment parsing: Unicode NFC, optional
//! removal of LaTeX or Markdown markup, whitespace collapsing. Line breaks
//! and click markers are preserved because the segment parser depends on
//! them.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Formatting commands whose argument is spoken as plain text.
static LATEX_FORMAT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(?:textbf|textit|textsl|textsc|textrm|textsf|texttt|emph|underline|alert|structure|text|mathrm|mathbf|mathit)\s*(?:<[^>]*>)?\{([^{}]*)\}",
    )
    .unwrap()
});

/// Inline math `$...$`.
static LATEX_MATH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([^$]*)\$").unwrap());

/// Any remaining command, with optional star and `[options]`.
static LATEX_COMMAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+\*?(?:\[[^\]]*\])?").unwrap());

/// Markdown emphasis and inline code markers.
static MARKDOWN_EMPHASIS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__|\*|`").unwrap());

/// Markdown links `[label](url)`, spoken as the label.
static MARKDOWN_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());

/// Placeholder for an escaped dollar while math delimiters are removed.
const DOLLAR_PLACEHOLDER: char = '\u{E000}';

/// Nested formatting commands are unwrapped at most this many levels deep.
const MAX_UNWRAP_PASSES: usize = 8;

/// Markup flavour to strip from narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    Latex,
    Markdown,
}

/// Text normalizer for narration payloads.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    markup: Markup,
}

impl TextNormalizer {
    /// Create a normalizer that leaves markup untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip the given markup flavour.
    pub fn with_markup(mut self, markup: Markup) -> Self {
        self.markup = markup;
        self
    }

    /// Normalize a payload, keeping line structure.
    pub fn normalize(&self, text: &str) -> String {
        let mut result: String = text.replace("\r\n", "\n").replace('\r', "\n").nfc().collect();

        result = match self.markup {
            Markup::None => result,
            Markup::Latex => strip_latex(&result),
            Markup::Markdown => strip_markdown(&result),
        };

        result
            .lines()
            .map(|line| WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ").trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reduce LaTeX markup to speakable text.
fn strip_latex(text: &str) -> String {
    // Explicit line breaks become real ones so speaker prefixes still start a line.
    let mut result = text.replace("\\\\", "\n");

    for _ in 0..MAX_UNWRAP_PASSES {
        let unwrapped = LATEX_FORMAT_REGEX.replace_all(&result, "$1").to_string();
        if unwrapped == result {
            break;
        }
        result = unwrapped;
    }

    result = result.replace("\\$", &DOLLAR_PLACEHOLDER.to_string());
    result = LATEX_MATH_REGEX.replace_all(&result, "$1").to_string();
    result = result.replace(DOLLAR_PLACEHOLDER, "$");

    for (escaped, plain) in [
        ("\\%", "%"),
        ("\\&", "&"),
        ("\\#", "#"),
        ("\\_", "_"),
        ("\\{", "("),
        ("\\}", ")"),
        ("\\ldots", "..."),
        ("\\dots", "..."),
        ("---", " - "),
        ("--", " - "),
        ("~", " "),
    ] {
        result = result.replace(escaped, plain);
    }

    result = LATEX_COMMAND_REGEX.replace_all(&result, "").to_string();
    result.retain(|c| c != '{' && c != '}');
    result
}

/// Reduce Markdown markup to speakable text.
fn strip_markdown(text: &str) -> String {
    let result = MARKDOWN_LINK_REGEX.replace_all(text, "$1");
    MARKDOWN_EMPHASIS_REGEX.replace_all(&result, "").to_string()
}
