//! Collision-resolving document writes.
//!
//! The store rejects a title whose slug slot is already taken by the same
//! owner. These helpers walk [`SuffixedTitles`] until a write lands, so two
//! documents titled "Post" become `post.html` and `post-(1).html`.

use folio_core::{
  collision::SuffixedTitles,
  document::{Cid, Document, DocumentPatch, NewDocument, Placement},
  slug::FALLBACK_SLUG,
  store::DocumentStore,
};
use tracing::debug;

use crate::{Error, Result};

fn base_title(title: &str) -> &str {
  if title.trim().is_empty() { FALLBACK_SLUG } else { title }
}

/// Create a document, suffixing the title on collision.
pub async fn create_document<S: DocumentStore>(
  store: &S,
  owner_id: i64,
  input: NewDocument,
) -> Result<Document> {
  for title in SuffixedTitles::new(base_title(&input.title)) {
    let attempt = NewDocument { title, ..input.clone() };
    match store.create_document(owner_id, attempt).await.map_err(Error::store)? {
      Placement::Placed(doc) => return Ok(doc),
      Placement::Collision => debug!(owner_id, "title slot taken; trying next suffix"),
    }
  }
  Err(Error::Collision(input.title))
}

/// Apply `patch`, suffixing the resulting title on collision.
///
/// When only the category changes, the current title is the base of the
/// suffix sequence.
pub async fn update_document<S: DocumentStore>(
  store: &S,
  cid: &Cid,
  patch: DocumentPatch,
) -> Result<Document> {
  let current = store
    .get_fields(cid)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::DocumentNotFound(cid.to_string()))?;

  if !patch.moves_path() {
    return match store.update_document(cid, patch).await.map_err(Error::store)? {
      Placement::Placed(doc) => Ok(doc),
      Placement::Collision => Err(Error::Collision(current.title)),
    };
  }

  let title = patch.title.clone().unwrap_or(current.title);
  for candidate in SuffixedTitles::new(base_title(&title)) {
    let attempt = DocumentPatch { title: Some(candidate), ..patch.clone() };
    match store.update_document(cid, attempt).await.map_err(Error::store)? {
      Placement::Placed(doc) => return Ok(doc),
      Placement::Collision => debug!(cid = %cid, "title slot taken; trying next suffix"),
    }
  }
  Err(Error::Collision(title))
}
