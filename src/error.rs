//! User-visible error surface.
//!
//! Two taxonomies share it: `ParseError` (compile time, never catchable by
//! `cleanup`) and the runtime's `RuntimeError` (carries a class instance that
//! `cleanup` handlers match against).

use thiserror::Error;

use crate::excerpt;
use crate::token::Span;

pub use crate::runtime::error::RuntimeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A scan or parse failure with the offending location.
///
/// `source` is the file path when `file` is set, otherwise the raw source
/// text; rendering pulls the excerpt from whichever it is.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub file: bool,
    pub source: String,
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn render(&self) -> String {
        let (clip, filename) = if self.file {
            (excerpt::from_file(&self.source, self.span), self.source.as_str())
        } else {
            (excerpt::from_str(&self.source, self.span), "~")
        };
        format!(
            "Parse Error: {}\n{}\n{}:{}:{}",
            self.message, clip, filename, self.span.start_line, self.span.start_col
        )
    }
}
