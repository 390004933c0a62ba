//! Minimal PDF text-extraction parser. Inserts a `--- Page N ---` marker
//! between pages (detected via the form-feed separators `pdf_extract`
//! emits) to aid later chunking; warns rather than failing on an
//! encrypted or otherwise unreadable stream.

use std::collections::HashMap;

use crate::{ParsedDocument, Parser};

pub struct PdfParser;

impl Parser for PdfParser {
  fn supported_extensions(&self) -> &[&str] {
    &["pdf"]
  }

  fn parse(&self, bytes: &[u8], file_name: &str) -> ParsedDocument {
    match pdf_extract::extract_text_from_mem(bytes) {
      Ok(raw) => {
        let content = insert_page_markers(&raw);
        ParsedDocument {
          content,
          metadata: HashMap::new(),
          warnings: Vec::new(),
        }
      }
      Err(err) => {
        tracing::warn!(file_name, error = %err, "failed to extract text from PDF");
        ParsedDocument::empty_with_warning(format!("unreadable or encrypted PDF stream: {err}"))
      }
    }
  }
}

/// `pdf_extract` separates pages with form-feed (`\x0c`) characters.
/// Replace each separator with a human-readable page marker.
fn insert_page_markers(raw: &str) -> String {
  let pages: Vec<&str> = raw.split('\x0c').collect();
  if pages.len() <= 1 {
    return raw.trim().to_string();
  }

  pages
    .into_iter()
    .enumerate()
    .map(|(i, page)| format!("--- Page {} ---\n{}", i + 1, page.trim()))
    .collect::<Vec<_>>()
    .join("\n\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_page_has_no_marker() {
    assert_eq!(insert_page_markers("hello world"), "hello world");
  }

  #[test]
  fn multi_page_gets_markers() {
    let raw = "page one\x0cpage two";
    let marked = insert_page_markers(raw);
    assert!(marked.contains("--- Page 1 ---"));
    assert!(marked.contains("--- Page 2 ---"));
  }

  #[test]
  fn invalid_pdf_bytes_yield_warning_not_panic() {
    let parser = PdfParser;
    let doc = parser.parse(b"not a real pdf", "broken.pdf");
    assert!(doc.content.is_empty());
    assert!(!doc.warnings.is_empty());
  }
}
