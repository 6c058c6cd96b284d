//! [`SyncEngine`]: the object handed to every trigger.
//!
//! Owns the path registry, renderer, and materializer, and exposes the
//! operations the request layer calls. The reconciliation loop and the
//! immediate publish path share the primitives in `publish.rs`.

use std::sync::Arc;

use folio_core::{
  document::{Cid, Document, DocumentPatch, NewDocument},
  slug::{canonical_stem, url_path},
  store::{DocumentStore, PathStore},
};
use tracing::{info, warn};

use crate::{
  Error, MarkdownRenderer, PathRegistry, Renderer, Result, SiteConfig,
  editor,
  materialize::{Materializer, WriteOutcome},
  render::IndexEntry,
};

pub struct SyncEngine<S, R = MarkdownRenderer> {
  pub(crate) store:        Arc<S>,
  pub(crate) registry:     PathRegistry<S>,
  pub(crate) renderer:     R,
  pub(crate) materializer: Materializer,
  pub(crate) config:       SiteConfig,
}

impl<S, R> SyncEngine<S, R>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  pub fn new(store: Arc<S>, renderer: R, config: SiteConfig) -> Self {
    Self {
      registry: PathRegistry::new(store.clone(), config.origin.clone()),
      materializer: Materializer::new(&config.output_dir),
      store,
      renderer,
      config,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn registry(&self) -> &PathRegistry<S> { &self.registry }

  pub fn config(&self) -> &SiteConfig { &self.config }

  // ─── Immediate publish path ───────────────────────────────────────────────

  /// Publish one document right away, bypassing the poll interval.
  ///
  /// Cleans the previously published file if the path moved, registers the
  /// new path, renders, and refreshes the owner index and public listing.
  /// A document that no longer exists is retired instead. Returns the URL
  /// path the document is now published at.
  pub async fn publish_now(&self, cid: &Cid) -> Result<Option<String>> {
    let Some(doc) = self.store.get_fields(cid).await.map_err(Error::store)? else {
      self.retire(cid).await?;
      return Ok(None);
    };

    if let Some(old) = self.registry.resolve(cid).await? {
      let new = url_path(&canonical_stem(&doc.owner, &doc.category, &doc.title));
      if old != new {
        self.remove_stale(cid, &old).await?;
      }
    }
    let path = self.register(&doc).await?;
    self.materialize(&doc, &path).await?;
    self.rebuild_owner_index(&doc.owner).await?;
    self.rebuild_listing().await?;

    info!(cid = %cid, path = %path, "published");
    Ok(Some(path))
  }

  /// Remove a document's mapping and published file, then refresh its
  /// owner's index and the public listing. Returns the released URL path.
  pub async fn retire(&self, cid: &Cid) -> Result<Option<String>> {
    let released = self.unpublish(cid, None).await?.path;

    if let Some(owner) = released.as_deref().and_then(owner_of) {
      self.rebuild_owner_index(owner).await?;
    }
    self.rebuild_listing().await?;

    info!(cid = %cid, path = ?released, "retired");
    Ok(released)
  }

  /// Current URL path of `cid`.
  pub async fn resolve_path(&self, cid: &Cid) -> Result<Option<String>> {
    self.registry.resolve(cid).await
  }

  /// CID behind an absolute URL of this site. `None` for URLs of any other
  /// origin.
  pub async fn resolve_cid(&self, url: &str) -> Result<Option<Cid>> {
    self.registry.resolve_external(url).await
  }

  pub fn public_url(&self, url_path: &str) -> String { self.config.origin.public_url(url_path) }

  // ─── Output tree ──────────────────────────────────────────────────────────

  /// Wipe (if configured), recreate, and seed the output directory with
  /// assets. Run once before the first reconciliation cycle.
  pub async fn prepare_output(&self) -> Result<usize> {
    self
      .materializer
      .prepare(self.config.clean_output_on_start, self.config.assets_dir.as_deref())
      .await
  }

  /// Regenerate `/{owner}/index.html` from the store.
  pub async fn rebuild_owner_index(&self, owner: &str) -> Result<WriteOutcome> {
    let docs = self
      .store
      .list_owner_documents(owner)
      .await
      .map_err(Error::store)?;
    let entries = self.index_entries(docs).await?;
    let html = self.renderer.render_owner_index(owner, &entries);
    self
      .materializer
      .write_page(&format!("{owner}/index.html"), &html)
      .await
  }

  /// Regenerate the index of every owner in `owners`. All owners are
  /// attempted; the first failure is returned.
  pub async fn rebuild_indexes<'a>(
    &self,
    owners: impl IntoIterator<Item = &'a str>,
  ) -> Result<()> {
    let mut first_err = None;
    for owner in owners {
      if let Err(e) = self.rebuild_owner_index(owner).await {
        warn!(owner, error = %e, "owner index rebuild failed");
        first_err.get_or_insert(e);
      }
    }
    first_err.map_or(Ok(()), Err)
  }

  /// Regenerate the public listing from every public document.
  pub async fn rebuild_listing(&self) -> Result<WriteOutcome> {
    let docs = self.store.list_public_documents().await.map_err(Error::store)?;
    let entries = self.index_entries(docs).await?;
    let html = self.renderer.render_listing(&entries);
    self
      .materializer
      .write_page(&self.config.listing_path, &html)
      .await
  }

  /// Documents without a registered path are left out.
  async fn index_entries(&self, docs: Vec<Document>) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::with_capacity(docs.len());
    for doc in docs {
      if let Some(path) = self.registry.resolve(&doc.cid).await? {
        entries.push(IndexEntry::new(doc, path));
      }
    }
    Ok(entries)
  }

  // ─── Direct mutations ─────────────────────────────────────────────────────

  /// Create a document, suffixing its title until the slot is free, and
  /// publish it.
  pub async fn create(&self, owner_id: i64, input: NewDocument) -> Result<Document> {
    let doc = editor::create_document(&*self.store, owner_id, input).await?;
    self.publish_after_mutation(&doc.cid).await;
    Ok(doc)
  }

  pub async fn update(&self, cid: &Cid, patch: DocumentPatch) -> Result<Document> {
    let doc = editor::update_document(&*self.store, cid, patch).await?;
    self.publish_after_mutation(cid).await;
    Ok(doc)
  }

  pub async fn set_public(&self, cid: &Cid, is_public: bool) -> Result<()> {
    if !self.store.set_public(cid, is_public).await.map_err(Error::store)? {
      return Err(Error::DocumentNotFound(cid.to_string()));
    }
    self.publish_after_mutation(cid).await;
    Ok(())
  }

  pub async fn delete(&self, cid: &Cid) -> Result<()> {
    if !self.store.delete_document(cid).await.map_err(Error::store)? {
      return Err(Error::DocumentNotFound(cid.to_string()));
    }
    if let Err(e) = self.retire(cid).await {
      warn!(cid = %cid, error = %e, "retire failed; left to reconciliation");
    }
    Ok(())
  }

  /// The mutation is already committed, so a publish failure is only
  /// logged. The next reconciliation cycle sees the changed signature and
  /// retries.
  async fn publish_after_mutation(&self, cid: &Cid) {
    if let Err(e) = self.publish_now(cid).await {
      warn!(cid = %cid, error = %e, "immediate publish failed; left to reconciliation");
    }
  }
}

/// Owner segment of a URL path (`/alice/blog/post.html` → `alice`).
fn owner_of(url_path: &str) -> Option<&str> {
  url_path
    .trim_start_matches('/')
    .split('/')
    .next()
    .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn owner_is_the_first_segment() {
    assert_eq!(owner_of("/alice/blog/post.html"), Some("alice"));
    assert_eq!(owner_of("bob/x.html"), Some("bob"));
    assert_eq!(owner_of("/"), None);
  }
}
