//! File-format parsers: byte streams in, plain UTF-8 text plus metadata and
//! warnings out. Parsers never fail outright on unparseable content — they
//! return empty content with a warning, letting the ingestion pipeline
//! decide (via "no extractable content") whether that is fatal for a
//! document.

mod pdf;
mod registry;
mod text;

pub use pdf::PdfParser;
pub use registry::ParserRegistry;
pub use text::TextParser;

use std::collections::HashMap;

/// Result of parsing one file: extracted text, metadata to carry forward
/// onto every chunk, and any non-fatal warnings collected along the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
  pub content: String,
  pub metadata: HashMap<String, String>,
  pub warnings: Vec<String>,
}

impl ParsedDocument {
  pub fn empty_with_warning(warning: impl Into<String>) -> Self {
    Self {
      content: String::new(),
      metadata: HashMap::new(),
      warnings: vec![warning.into()],
    }
  }
}

/// A file-format parser. Implementations never panic or propagate an error
/// for unparseable bytes; they report the problem as a warning instead.
pub trait Parser: Send + Sync {
  /// Lower-case extensions (without the leading dot) this parser handles.
  fn supported_extensions(&self) -> &[&str];

  fn parse(&self, bytes: &[u8], file_name: &str) -> ParsedDocument;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_with_warning_has_no_content() {
    let doc = ParsedDocument::empty_with_warning("boom");
    assert!(doc.content.is_empty());
    assert_eq!(doc.warnings, vec!["boom".to_string()]);
  }
}
