//! LaTeX Beamer source dialect.
//!
//! Each `frame` environment is one logical slide; `\note{...}` blocks carry
//! the narration and `\input{...}` / `\include{...}` outside frames pull in
//! further slides.

pub mod parser;

pub use parser::BeamerParser;
