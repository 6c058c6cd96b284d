//! Slug codec: free text → filesystem- and URL-safe path segment.
//!
//! Non-ASCII text is kept as-is (no percent-encoding), so on-disk file names
//! and displayed URL paths stay readable.

/// Returned for blank input and for input that would otherwise produce a
/// relative path component (`.`, `..`).
pub const FALLBACK_SLUG: &str = "untitled";

/// Category used when a document has none.
pub const DEFAULT_CATEGORY: &str = "default";

/// Characters that are illegal or meaningful in file names on common
/// filesystems.
const HOSTILE: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Convert `text` into a path segment.
///
/// Applied in order: trim, lowercase, spaces and hostile characters become
/// hyphens, runs of hyphens collapse to one. Total and idempotent:
/// `slugify(&slugify(t)) == slugify(t)` for every `t`.
pub fn slugify(text: &str) -> String {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return FALLBACK_SLUG.to_owned();
  }

  let mut slug = String::with_capacity(trimmed.len());
  let mut prev_hyphen = false;
  for ch in trimmed.chars() {
    if ch == ' ' || ch == '-' || HOSTILE.contains(&ch) {
      if !prev_hyphen {
        slug.push('-');
      }
      prev_hyphen = true;
    } else {
      slug.extend(ch.to_lowercase());
      prev_hyphen = false;
    }
  }

  if slug.chars().all(|c| c == '.') {
    return FALLBACK_SLUG.to_owned();
  }
  slug
}

/// Slug of a category, substituting [`DEFAULT_CATEGORY`] for a blank one.
pub fn category_slug(category: &str) -> String {
  if category.trim().is_empty() {
    slugify(DEFAULT_CATEGORY)
  } else {
    slugify(category)
  }
}

/// Relative canonical path (no leading slash, no extension):
/// `owner/category-slug/title-slug`.
pub fn canonical_stem(owner: &str, category: &str, title: &str) -> String {
  format!("{owner}/{}/{}", category_slug(category), slugify(title))
}

/// Public URL path for a canonical stem: `/owner/category/title.html`.
pub fn url_path(stem: &str) -> String { format!("/{stem}.html") }
