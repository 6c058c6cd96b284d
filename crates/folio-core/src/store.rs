//! Storage traits consumed by the publishing engine.
//!
//! Implemented by storage backends (e.g. `folio-store-sqlite`). The engine in
//! `folio-sync` depends on these abstractions, never on a concrete backend.

use std::{collections::BTreeSet, future::Future};

use crate::document::{Cid, Document, DocumentPatch, NewDocument, Placement};

/// Shared error type for a backend implementing both [`DocumentStore`] and
/// [`PathStore`].
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Record access to documents and the reference graph between them.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait DocumentStore: Backend {
  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every document currently in the store, with its owner's name. The
  /// reconciliation loop fingerprints these against its last snapshot.
  fn list_changed_candidates(
    &self,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Fetch one document. Returns `None` if it does not exist.
  fn get_fields<'a>(
    &'a self,
    cid: &'a Cid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// All documents of the named owner, newest first.
  fn list_owner_documents<'a>(
    &'a self,
    owner: &'a str,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// All public documents, newest first.
  fn list_public_documents(
    &self,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  // ── Renderer side effects ─────────────────────────────────────────────

  /// Replace every literal occurrence of `old` with `new` in the document's
  /// body. Returns `true` if the body changed. Does not touch `updated_at`.
  fn mutate_body<'a>(
    &'a self,
    cid: &'a Cid,
    old: &'a str,
    new: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Atomically replace the outgoing reference edges of `source`.
  fn replace_reference_edges<'a>(
    &'a self,
    source: &'a Cid,
    targets: &'a BTreeSet<Cid>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Documents holding an edge that points at `target` (one hop).
  fn referencing<'a>(
    &'a self,
    target: &'a Cid,
  ) -> impl Future<Output = Result<Vec<Cid>, Self::Error>> + Send + 'a;

  // ── Direct mutations ──────────────────────────────────────────────────

  /// Create a document for `owner_id`. Returns [`Placement::Collision`] if the
  /// owner already has a document with the same category and title slugs.
  fn create_document(
    &self,
    owner_id: i64,
    input: NewDocument,
  ) -> impl Future<Output = Result<Placement<Document>, Self::Error>> + Send + '_;

  /// Apply `patch`, bumping `updated_at`. Returns [`Placement::Collision`] if
  /// the new title/category slot is taken by another document.
  fn update_document<'a>(
    &'a self,
    cid: &'a Cid,
    patch: DocumentPatch,
  ) -> impl Future<Output = Result<Placement<Document>, Self::Error>> + Send + 'a;

  /// Change the visibility flag. Returns `false` if the document is missing.
  fn set_public<'a>(
    &'a self,
    cid: &'a Cid,
    is_public: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete a document and its outgoing edges. Returns `false` if missing.
  fn delete_document<'a>(
    &'a self,
    cid: &'a Cid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Path mappings ───────────────────────────────────────────────────────────

/// Persistent CID ↔ URL path table behind the path registry.
///
/// URL paths are stored absolute with extension: `/owner/category/title.html`.
pub trait PathStore: Backend {
  /// Insert or overwrite the mapping for `cid`.
  fn upsert_mapping<'a>(
    &'a self,
    cid: &'a Cid,
    url_path: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn path_for_cid<'a>(
    &'a self,
    cid: &'a Cid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// The CID most recently assigned `url_path`, if any.
  fn cid_for_path<'a>(
    &'a self,
    url_path: &'a str,
  ) -> impl Future<Output = Result<Option<Cid>, Self::Error>> + Send + 'a;

  /// Remove the mapping for `cid`, returning the path it held.
  fn remove_mapping<'a>(
    &'a self,
    cid: &'a Cid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
