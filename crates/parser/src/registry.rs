//! Selects a parser by file extension (case-insensitive). Unknown or
//! intentionally unsupported extensions fall through to an empty
//! document carrying a warning rather than erroring.

use crate::{ParsedDocument, Parser, PdfParser, TextParser};

/// Extensions recognized but never routed to a real parser: Office and
/// other exotic formats are out of scope, represented here only so the
/// ingestion pipeline reports a clear reason instead of a silent miss.
const UNSUPPORTED_EXTENSIONS: &[&str] = &["docx", "pptx", "xlsx", "doc", "ppt", "xls"];

pub struct ParserRegistry {
  parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
  pub fn new() -> Self {
    Self {
      parsers: vec![Box::new(TextParser), Box::new(PdfParser)],
    }
  }

  pub fn parse(&self, bytes: &[u8], file_name: &str) -> ParsedDocument {
    let Some(extension) = extension_of(file_name) else {
      return ParsedDocument::empty_with_warning(format!("no file extension to select a parser for '{file_name}'"));
    };

    if let Some(parser) = self.parsers.iter().find(|p| p.supported_extensions().contains(&extension.as_str())) {
      return parser.parse(bytes, file_name);
    }

    if UNSUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
      return ParsedDocument::empty_with_warning(format!("unsupported file type: '.{extension}'"));
    }

    ParsedDocument::empty_with_warning(format!("unsupported file type: '.{extension}'"))
  }
}

impl Default for ParserRegistry {
  fn default() -> Self {
    Self::new()
  }
}

fn extension_of(file_name: &str) -> Option<String> {
  file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn routes_txt_to_text_parser() {
    let registry = ParserRegistry::new();
    let doc = registry.parse(b"hello", "notes.TXT");
    assert_eq!(doc.content, "hello");
    assert!(doc.warnings.is_empty());
  }

  #[test]
  fn unknown_extension_yields_warning() {
    let registry = ParserRegistry::new();
    let doc = registry.parse(b"binary junk", "archive.zip");
    assert!(doc.content.is_empty());
    assert!(!doc.warnings.is_empty());
  }

  #[test]
  fn office_format_reports_unsupported_file_type() {
    let registry = ParserRegistry::new();
    let doc = registry.parse(b"junk", "report.docx");
    assert!(doc.content.is_empty());
    assert!(doc.warnings[0].contains("unsupported file type"));
  }

  #[test]
  fn missing_extension_yields_warning() {
    let registry = ParserRegistry::new();
    let doc = registry.parse(b"junk", "README");
    assert!(doc.content.is_empty());
    assert!(!doc.warnings.is_empty());
  }
}
