//! Primitives shared by the reconciliation loop and the immediate publish
//! path. Both triggers go through these and nothing else, so they produce
//! identical output.

use folio_core::{
  document::{Cid, Document},
  store::{DocumentStore, PathStore},
};
use tracing::{debug, info};

use crate::{
  Error, Renderer, Result, SyncEngine,
  links::resolve_links,
  materialize::WriteOutcome,
};

/// Result of [`SyncEngine::unpublish`].
#[derive(Debug, Default)]
pub(crate) struct Unpublished {
  /// Path the document was published at, if known.
  pub path:    Option<String>,
  /// Whether a file was actually deleted.
  pub removed: bool,
}

impl<S, R> SyncEngine<S, R>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  /// Delete the file at `url_path` unless the path now belongs to a
  /// different document. Returns whether a file was deleted.
  pub(crate) async fn remove_stale(&self, cid: &Cid, url_path: &str) -> Result<bool> {
    match self.registry.resolve_reverse(url_path).await? {
      Some(holder) if &holder != cid => {
        debug!(cid = %cid, path = url_path, holder = %holder, "stale path reassigned; kept");
        Ok(false)
      }
      _ => self.materializer.remove_page(url_path).await,
    }
  }

  /// Record the canonical path of `doc`; returns its URL path.
  pub(crate) async fn register(&self, doc: &Document) -> Result<String> {
    let stem = self
      .registry
      .assign(&doc.cid, &doc.owner, &doc.category, &doc.title)
      .await?;
    Ok(folio_core::slug::url_path(&stem))
  }

  /// Render `doc` at `url_path` and write the page.
  ///
  /// Resolving links may rewrite external URLs in the body into `cite://`
  /// links; those rewrites and the document's full outgoing edge set are
  /// persisted before the page is written.
  pub(crate) async fn materialize(&self, doc: &Document, url_path: &str) -> Result<WriteOutcome> {
    let links = self.renderer.discover_links(&doc.body);
    let resolved = resolve_links(&self.registry, &links).await?;
    let html = self.renderer.render_document(doc, url_path, &resolved.table);

    for (old, new) in &resolved.mutations {
      let changed = self
        .store
        .mutate_body(&doc.cid, old, new)
        .await
        .map_err(Error::store)?;
      if changed {
        info!(cid = %doc.cid, from = %old, to = %new, "rewrote link to canonical form");
      }
    }
    self
      .store
      .replace_reference_edges(&doc.cid, &resolved.edges)
      .await
      .map_err(Error::store)?;

    self.materializer.write_page(url_path, &html).await
  }

  /// Release the mapping of `cid` and delete its file. `known_path` is used
  /// when the registry holds no mapping.
  pub(crate) async fn unpublish(&self, cid: &Cid, known_path: Option<&str>) -> Result<Unpublished> {
    let path = self
      .registry
      .release(cid)
      .await?
      .or_else(|| known_path.map(str::to_owned));
    let removed = match &path {
      Some(path) => self.remove_stale(cid, path).await?,
      None => false,
    };
    Ok(Unpublished { path, removed })
  }
}
