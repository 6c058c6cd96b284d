//! Path registry: the canonical CID ↔ public path mapping.
//!
//! Forward lookups are served from an in-process cache backed by the
//! [`PathStore`]; reverse lookups always hit the store so a reassigned path
//! never resolves to a stale CID.

use std::{collections::HashMap, sync::Arc};

use folio_core::{
  document::Cid,
  slug::{canonical_stem, url_path},
  store::PathStore,
};
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

use crate::{Error, Origin, Result};

pub struct PathRegistry<P> {
  store:  Arc<P>,
  origin: Origin,
  /// CID → URL path (`/owner/category/title.html`).
  cache:  RwLock<HashMap<Cid, String>>,
}

impl<P: PathStore> PathRegistry<P> {
  pub fn new(store: Arc<P>, origin: Origin) -> Self {
    Self { store, origin, cache: RwLock::new(HashMap::new()) }
  }

  /// Compute and persist the canonical path for `cid`, returning the stem
  /// (`owner/category-slug/title-slug`, no extension).
  ///
  /// Unconditional and idempotent. Collisions between different documents
  /// are prevented upstream by the document store's uniqueness constraint.
  pub async fn assign(
    &self,
    cid: &Cid,
    owner: &str,
    category: &str,
    title: &str,
  ) -> Result<String> {
    let stem = canonical_stem(owner, category, title);
    let path = url_path(&stem);
    self.store.upsert_mapping(cid, &path).await.map_err(Error::store)?;
    self.cache.write().insert(cid.clone(), path);
    Ok(stem)
  }

  /// Current URL path of `cid`.
  pub async fn resolve(&self, cid: &Cid) -> Result<Option<String>> {
    if let Some(path) = self.cache.read().get(cid) {
      return Ok(Some(path.clone()));
    }
    let path = self.store.path_for_cid(cid).await.map_err(Error::store)?;
    if let Some(path) = &path {
      self.cache.write().insert(cid.clone(), path.clone());
    }
    Ok(path)
  }

  /// CID currently holding `url_path`. Never cached.
  pub async fn resolve_reverse(&self, url_path: &str) -> Result<Option<Cid>> {
    self.store.cid_for_path(url_path).await.map_err(Error::store)
  }

  /// Resolve an absolute URL supplied from outside (e.g. pasted into a
  /// document) to the CID it points at.
  ///
  /// URLs for another host, another port, a non-HTTP scheme, or that fail to
  /// parse resolve to `None`.
  pub async fn resolve_external(&self, raw: &str) -> Result<Option<Cid>> {
    let Some(path) = self.site_path(raw) else {
      return Ok(None);
    };
    let cid = self.resolve_reverse(&path).await?;
    debug!(url = raw, path = %path, cid = ?cid, "resolved external url");
    Ok(cid)
  }

  /// Remove the mapping for `cid`, returning the URL path it held.
  pub async fn release(&self, cid: &Cid) -> Result<Option<String>> {
    let cached = self.cache.write().remove(cid);
    let stored = self.store.remove_mapping(cid).await.map_err(Error::store)?;
    Ok(stored.or(cached))
  }

  pub fn origin(&self) -> &Origin { &self.origin }

  /// Decoded site path of `raw` if it belongs to this site's origin.
  fn site_path(&self, raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
      return None;
    }
    if url.port_or_known_default() != Some(self.origin.port) {
      return None;
    }
    if !self.origin.accepts_host(url.host_str()?) {
      return None;
    }
    // Slugs keep non-ASCII text, while browsers percent-encode it.
    let path = percent_decode_str(url.path()).decode_utf8().ok()?;
    Some(path.into_owned())
  }
}

#[cfg(test)]
mod tests {
  use folio_store_sqlite::SqliteStore;

  use super::*;

  async fn registry() -> PathRegistry<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    PathRegistry::new(Arc::new(store), Origin::new("127.0.0.1", 8080))
  }

  fn cid(s: &str) -> Cid { Cid::parse(s).unwrap() }

  #[tokio::test]
  async fn assign_returns_stem_and_resolves_both_ways() {
    let reg = registry().await;
    let a = cid("a");

    let stem = reg.assign(&a, "alice", "Default", "Intro").await.unwrap();
    assert_eq!(stem, "alice/default/intro");
    assert_eq!(reg.resolve(&a).await.unwrap().as_deref(), Some("/alice/default/intro.html"));
    assert_eq!(reg.resolve_reverse("/alice/default/intro.html").await.unwrap(), Some(a.clone()));

    // Idempotent.
    assert_eq!(reg.assign(&a, "alice", "Default", "Intro").await.unwrap(), stem);
  }

  #[tokio::test]
  async fn resolve_falls_back_to_store() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let a = cid("a");
    PathRegistry::new(store.clone(), Origin::new("127.0.0.1", 8080))
      .assign(&a, "alice", "c", "t")
      .await
      .unwrap();

    let fresh = PathRegistry::new(store, Origin::new("127.0.0.1", 8080));
    assert_eq!(fresh.resolve(&a).await.unwrap().as_deref(), Some("/alice/c/t.html"));
  }

  #[tokio::test]
  async fn external_urls_outside_the_origin_are_absent() {
    let reg = registry().await;
    let a = cid("a");
    reg.assign(&a, "alice", "c", "t").await.unwrap();

    for url in [
      "http://127.0.0.1:8080/alice/c/t.html",
      "http://localhost:8080/alice/c/t.html",
      "https://127.0.0.1:8080/alice/c/t.html?x=1#frag",
    ] {
      assert_eq!(reg.resolve_external(url).await.unwrap(), Some(a.clone()), "{url}");
    }
    for url in [
      "http://127.0.0.1:9090/alice/c/t.html",
      "http://127.0.0.1/alice/c/t.html",
      "http://evil.example:8080/alice/c/t.html",
      "ftp://127.0.0.1:8080/alice/c/t.html",
      "/alice/c/t.html",
      "not a url",
      "http://127.0.0.1:8080/alice/c/missing.html",
    ] {
      assert_eq!(reg.resolve_external(url).await.unwrap(), None, "{url}");
    }
  }

  #[tokio::test]
  async fn percent_encoded_paths_match_unicode_slugs() {
    let reg = registry().await;
    let a = cid("a");
    reg.assign(&a, "alice", "笔记", "你好 世界").await.unwrap();
    let url = "http://127.0.0.1:8080/alice/%E7%AC%94%E8%AE%B0/%E4%BD%A0%E5%A5%BD-%E4%B8%96%E7%95%8C.html";
    assert_eq!(reg.resolve_external(url).await.unwrap(), Some(a));
  }

  #[tokio::test]
  async fn release_removes_cache_and_store_entries() {
    let reg = registry().await;
    let a = cid("a");
    reg.assign(&a, "alice", "c", "t").await.unwrap();

    assert_eq!(reg.release(&a).await.unwrap().as_deref(), Some("/alice/c/t.html"));
    assert!(reg.resolve(&a).await.unwrap().is_none());
    assert!(reg.resolve_reverse("/alice/c/t.html").await.unwrap().is_none());
    assert!(reg.release(&a).await.unwrap().is_none());
  }
}
