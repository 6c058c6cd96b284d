//! Deterministic title suffixing for canonical-path collisions.
//!
//! When the store rejects a title because another document of the same owner
//! already occupies `owner/category/slug`, the caller walks [`SuffixedTitles`]
//! until a placement succeeds:
//!
//! ```text
//! "Post"     → "Post", "Post (1)", "Post (2)", …
//! "Post (4)" → "Post (4)", "Post (5)", "Post (6)", …
//! ```
//!
//! The sequence only ends once the `u64` counter is exhausted.

/// Iterator over candidate titles, starting with the title as given.
#[derive(Debug, Clone)]
pub struct SuffixedTitles {
  stem:  String,
  state: SuffixState,
}

#[derive(Debug, Clone)]
enum SuffixState {
  /// The caller's title has not been tried yet; `first` is the counter that
  /// follows it.
  Given { title: String, first: Option<u64> },
  Counter(u64),
  Exhausted,
}

impl SuffixedTitles {
  pub fn new(title: &str) -> Self {
    let (stem, first) = match split_suffix(title) {
      Some((stem, n)) => (stem, n.checked_add(1)),
      None => (title, Some(1)),
    };
    Self {
      stem:  stem.to_owned(),
      state: SuffixState::Given { title: title.to_owned(), first },
    }
  }
}

impl Iterator for SuffixedTitles {
  type Item = String;

  fn next(&mut self) -> Option<String> {
    match std::mem::replace(&mut self.state, SuffixState::Exhausted) {
      SuffixState::Given { title, first } => {
        if let Some(n) = first {
          self.state = SuffixState::Counter(n);
        }
        Some(title)
      }
      SuffixState::Counter(n) => {
        if let Some(next) = n.checked_add(1) {
          self.state = SuffixState::Counter(next);
        }
        Some(format!("{} ({n})", self.stem))
      }
      SuffixState::Exhausted => None,
    }
  }
}

/// Split a trailing ` (n)` suffix (`n ≥ 1`, no leading zeros) off `title`.
pub fn split_suffix(title: &str) -> Option<(&str, u64)> {
  let inner = title.strip_suffix(')')?;
  let open = inner.rfind(" (")?;
  let digits = &inner[open + 2..];
  if digits.is_empty()
    || !digits.bytes().all(|b| b.is_ascii_digit())
    || digits.starts_with('0')
  {
    return None;
  }
  let n = digits.parse().ok()?;
  Some((&title[..open], n))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn first_n(title: &str, n: usize) -> Vec<String> {
    SuffixedTitles::new(title).take(n).collect()
  }

  #[test]
  fn plain_title_gains_counter() {
    assert_eq!(first_n("Post", 3), ["Post", "Post (1)", "Post (2)"]);
  }

  #[test]
  fn existing_suffix_is_incremented() {
    assert_eq!(first_n("Post (4)", 3), ["Post (4)", "Post (5)", "Post (6)"]);
  }

  #[test]
  fn malformed_suffixes_are_part_of_the_stem() {
    assert_eq!(first_n("Post (0)", 2), ["Post (0)", "Post (0) (1)"]);
    assert_eq!(first_n("Post (x)", 2), ["Post (x)", "Post (x) (1)"]);
    assert_eq!(first_n("Post(3)", 2), ["Post(3)", "Post(3) (1)"]);
  }

  #[test]
  fn exhausted_counter_terminates() {
    let max = format!("T ({})", u64::MAX);
    assert_eq!(first_n(&max, 5), [max.clone()]);

    let near = format!("T ({})", u64::MAX - 1);
    let all: Vec<String> = SuffixedTitles::new(&near).collect();
    assert_eq!(all, [near.clone(), format!("T ({})", u64::MAX)]);
  }

  #[test]
  fn split_suffix_parses_trailing_counter_only() {
    assert_eq!(split_suffix("A (12)"), Some(("A", 12)));
    assert_eq!(split_suffix("A (1) b"), None);
    assert_eq!(split_suffix("A ()"), None);
  }
}
