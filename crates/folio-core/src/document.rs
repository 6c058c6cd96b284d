//! Document: the unit of published content.
//!
//! Documents are owned by the document store. The publishing engine reads
//! them, rewrites a narrow set of fields (title, category, body) and derives
//! every published artifact from them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Upper bound on identifier length accepted by [`Cid::parse`].
pub const CID_MAX_LEN: usize = 64;

/// Stable, opaque document identifier.
///
/// Independent of the document's title and category, so it survives renames.
/// Restricted to ASCII alphanumerics, `-` and `_` so it can be embedded in
/// `cite://` links and HTML attributes without escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
  pub fn parse(s: &str) -> Result<Self> {
    let valid = !s.is_empty()
      && s.len() <= CID_MAX_LEN
      && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidCid(s.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Cid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Cid {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Cid {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Cid> for String {
  fn from(cid: Cid) -> Self { cid.0 }
}

impl AsRef<str> for Cid {
  fn as_ref(&self) -> &str { &self.0 }
}

// ─── Owner ───────────────────────────────────────────────────────────────────

/// Upper bound on owner name length accepted by [`Owner::validate_name`].
pub const OWNER_NAME_MAX_LEN: usize = 64;

/// The account that owns documents. `name` is the first path segment of every
/// document the owner publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
  pub owner_id: i64,
  pub name:     String,
}

impl Owner {
  /// Owner names are used verbatim as a path segment, so they are limited to
  /// ASCII alphanumerics, `-` and `_`.
  pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
      && name.len() <= OWNER_NAME_MAX_LEN
      && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid { Ok(()) } else { Err(Error::InvalidOwnerName(name.to_owned())) }
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A document as read from the store, joined with its owner's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub cid:        Cid,
  pub owner_id:   i64,
  pub owner:      String,
  pub title:      String,
  pub category:   String,
  /// Markdown source.
  pub body:       String,
  pub summary:    String,
  pub is_public:  bool,
  pub updated_at: DateTime<Utc>,
}

/// Input for creating a document. Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDocument {
  pub title:     String,
  pub category:  String,
  pub body:      String,
  pub summary:   String,
  pub is_public: bool,
}

impl NewDocument {
  pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      category: category.into(),
      ..Self::default()
    }
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = body.into();
    self
  }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
  pub title:    Option<String>,
  pub category: Option<String>,
  pub body:     Option<String>,
  pub summary:  Option<String>,
}

impl DocumentPatch {
  /// Whether applying the patch can move the document to a new canonical path.
  pub fn moves_path(&self) -> bool { self.title.is_some() || self.category.is_some() }
}

// ─── Placement ───────────────────────────────────────────────────────────────

/// Outcome of a write that claims a canonical (owner, category, title) slot.
///
/// The store enforces slot uniqueness; a taken slot is an expected outcome
/// rather than an error, so callers can retry with a suffixed title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement<T> {
  Placed(T),
  Collision,
}

impl<T> Placement<T> {
  pub fn placed(self) -> Option<T> {
    match self {
      Self::Placed(t) => Some(t),
      Self::Collision => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn owner_names_are_single_safe_segments() {
    for name in ["alice", "bob_2", "x-y"] {
      assert!(Owner::validate_name(name).is_ok(), "{name:?}");
    }
    for name in ["", "a/b", "..", "c#", "100%", "who?", "al ice", "ünï"] {
      assert!(matches!(Owner::validate_name(name), Err(Error::InvalidOwnerName(_))), "{name:?}");
    }
    assert!(Owner::validate_name(&"a".repeat(OWNER_NAME_MAX_LEN + 1)).is_err());
  }

  #[test]
  fn cid_accepts_generated_tokens() {
    let cid = Cid::parse("aZ09bY18cX2").unwrap();
    assert_eq!(cid.as_str(), "aZ09bY18cX2");
    assert_eq!(cid.to_string(), "aZ09bY18cX2");
  }

  #[test]
  fn cid_rejects_path_and_markup_characters() {
    for bad in ["", "a/b", "a b", "<x>", "..", "a\"b"] {
      assert!(Cid::parse(bad).is_err(), "{bad:?} should be rejected");
    }
    assert!(Cid::parse(&"a".repeat(CID_MAX_LEN + 1)).is_err());
  }

  #[test]
  fn patch_moves_path_only_for_title_or_category() {
    assert!(!DocumentPatch { body: Some("x".into()), ..Default::default() }.moves_path());
    assert!(DocumentPatch { title: Some("x".into()), ..Default::default() }.moves_path());
    assert!(DocumentPatch { category: Some("x".into()), ..Default::default() }.moves_path());
  }
}
