//! Natural-boundary snapping shared by the FixedSize and Recursive chunkers.

/// Search backward from `tentative_end` within `window` characters for a
/// natural break point, preferring (in order): paragraph break, single
/// newline, sentence end, any whitespace. Falls back to `tentative_end`
/// itself if nothing is found.
pub(crate) fn snap_to_boundary(chars: &[char], tentative_end: usize, window: usize) -> usize {
  let search_floor = tentative_end.saturating_sub(window);

  if let Some(pos) = find_paragraph_break(chars, search_floor, tentative_end) {
    return pos;
  }
  if let Some(pos) = find_newline(chars, search_floor, tentative_end) {
    return pos;
  }
  if let Some(pos) = find_sentence_end(chars, search_floor, tentative_end) {
    return pos;
  }
  if let Some(pos) = find_whitespace(chars, search_floor, tentative_end) {
    return pos;
  }
  tentative_end
}

fn find_paragraph_break(chars: &[char], floor: usize, end: usize) -> Option<usize> {
  for i in (floor..end).rev() {
    if i + 1 < chars.len() && chars[i] == '\n' && chars[i + 1] == '\n' {
      return Some(i + 2);
    }
  }
  None
}

fn find_newline(chars: &[char], floor: usize, end: usize) -> Option<usize> {
  for i in (floor..end).rev() {
    if chars[i] == '\n' {
      return Some(i + 1);
    }
  }
  None
}

fn find_sentence_end(chars: &[char], floor: usize, end: usize) -> Option<usize> {
  for i in (floor..end).rev() {
    if chars[i] == '.' && chars.get(i + 1).is_some_and(|c| c.is_whitespace()) {
      return Some(i + 1);
    }
  }
  None
}

fn find_whitespace(chars: &[char], floor: usize, end: usize) -> Option<usize> {
  for i in (floor..end).rev() {
    if chars[i].is_whitespace() {
      return Some(i + 1);
    }
  }
  None
}

/// Window size used when snapping a chunk end to a natural boundary:
/// `min(100, span/4)` characters, per the fixed-size chunking contract.
pub(crate) fn boundary_window(span: usize) -> usize {
  100.min(span / 4).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snaps_to_paragraph_break_first() {
    let text: Vec<char> = "abc\n\ndef ghi".chars().collect();
    let snapped = snap_to_boundary(&text, 10, 10);
    assert_eq!(snapped, 5);
  }

  #[test]
  fn snaps_to_whitespace_when_nothing_else_found() {
    let text: Vec<char> = "abcdefgh ijk".chars().collect();
    let snapped = snap_to_boundary(&text, 10, 10);
    assert_eq!(snapped, 9);
  }

  #[test]
  fn falls_back_to_tentative_end() {
    let text: Vec<char> = "abcdefghijk".chars().collect();
    let snapped = snap_to_boundary(&text, 8, 3);
    assert_eq!(snapped, 8);
  }
}
