//! Slidev Markdown source dialect.
//!
//! Slides are `---`-separated sections; presenter notes are the last HTML
//! comment of a section, and `src:` frontmatter imports slides from another
//! Markdown file.

pub mod parser;

pub use parser::SlidevParser;
