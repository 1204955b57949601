//! Error types for narrated deck processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Recoverable conditions (missing includes, include cycles,
/// frame overflow, empty notes) are logged as warnings instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The root source file does not exist.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized source format: {0}")]
    UnsupportedFormat(String),

    /// A slide range string could not be parsed.
    #[error("Invalid slide range: {0}")]
    InvalidRange(String),

    /// The requested slide window contains no narration.
    #[error("No content in slide range {0}")]
    NoContentInRange(String),

    /// The renderer produced no frames.
    #[error("Renderer produced no frames")]
    NoFrames,

    /// Frame rendering failed.
    #[error("Render error: {0}")]
    RenderError(String),

    /// Speech synthesis failed.
    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    /// Video assembly failed.
    #[error("Assembly error: {0}")]
    AssemblyError(String),
}
