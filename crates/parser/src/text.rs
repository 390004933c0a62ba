//! Plain-text/Markdown parser: UTF-8 lossy decode, no structural hints
//! inserted, no warnings on well-formed input.

use std::collections::HashMap;

use crate::{ParsedDocument, Parser};

pub struct TextParser;

impl Parser for TextParser {
  fn supported_extensions(&self) -> &[&str] {
    &["txt", "md", "markdown"]
  }

  fn parse(&self, bytes: &[u8], _file_name: &str) -> ParsedDocument {
    match std::str::from_utf8(bytes) {
      Ok(content) => ParsedDocument {
        content: content.to_string(),
        metadata: HashMap::new(),
        warnings: Vec::new(),
      },
      Err(_) => {
        let lossy = String::from_utf8_lossy(bytes).into_owned();
        ParsedDocument {
          content: lossy,
          metadata: HashMap::new(),
          warnings: vec!["file contained invalid UTF-8; decoded lossily".to_string()],
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn well_formed_utf8_has_no_warnings() {
    let parser = TextParser;
    let doc = parser.parse(b"hello world", "notes.txt");
    assert_eq!(doc.content, "hello world");
    assert!(doc.warnings.is_empty());
  }

  #[test]
  fn invalid_utf8_decodes_lossily_with_warning() {
    let parser = TextParser;
    let doc = parser.parse(&[0x68, 0x69, 0xff, 0xfe], "notes.txt");
    assert!(!doc.warnings.is_empty());
    assert!(doc.content.starts_with("hi"));
  }
}
