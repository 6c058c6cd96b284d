//! Folio server: configuration and the top-level HTTP application.
//!
//! The binary in `main.rs` loads a [`ServerConfig`], opens the store, starts
//! the reconciliation service and serves [`app`].

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use folio_core::store::{DocumentStore, PathStore};
use folio_sync::{Origin, Renderer, SiteConfig, SyncEngine};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FOLIO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// Root of the generated site.
  pub output_dir:            PathBuf,
  /// Copied into `output_dir` when the service starts.
  #[serde(default)]
  pub assets_dir:            Option<PathBuf>,
  #[serde(default = "default_listing_path")]
  pub listing_path:          String,
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs:    u64,
  #[serde(default = "default_true")]
  pub clean_output_on_start: bool,
  /// Host names besides `host` under which the site is reachable.
  #[serde(default)]
  pub extra_hosts:           Vec<String>,
}

fn default_listing_path() -> String { "index.html".to_owned() }

fn default_poll_interval_secs() -> u64 { 3 }

fn default_true() -> bool { true }

impl ServerConfig {
  /// The engine's view of this configuration. Relative paths are taken as
  /// given; the caller expands `~` beforehand.
  pub fn site_config(&self) -> SiteConfig {
    let mut origin = Origin::new(self.host.clone(), self.port);
    origin.extra_hosts = self.extra_hosts.clone();

    let mut site = SiteConfig::new(self.output_dir.clone(), origin);
    site.assets_dir = self.assets_dir.clone();
    site.listing_path = self.listing_path.clone();
    site.clean_output_on_start = self.clean_output_on_start;
    site
  }

  pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs.max(1)) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The JSON API under `/api`; every other path is served from the generated
/// site in the engine's output directory.
pub fn app<S, R>(engine: Arc<SyncEngine<S, R>>) -> Router
where
  S: DocumentStore + PathStore + 'static,
  R: Renderer + 'static,
{
  let site = ServeDir::new(&engine.config().output_dir);
  Router::new()
    .nest("/api", folio_api::api_router(engine))
    .fallback_service(site)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use folio_core::document::NewDocument;
  use folio_store_sqlite::SqliteStore;
  use folio_sync::MarkdownRenderer;
  use tower::ServiceExt as _;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn defaults_fill_optional_fields() {
    let cfg = parse(
      r#"
        host       = "127.0.0.1"
        port       = 8080
        store_path = "folio.db"
        output_dir = "public"
      "#,
    );
    assert_eq!(cfg.listing_path, "index.html");
    assert_eq!(cfg.poll_interval(), Duration::from_secs(3));
    assert!(cfg.clean_output_on_start);
    assert!(cfg.assets_dir.is_none());

    let site = cfg.site_config();
    assert_eq!(site.origin.public_url("/a.html"), "http://127.0.0.1:8080/a.html");
    assert_eq!(site.output_dir, PathBuf::from("public"));
  }

  #[test]
  fn extra_hosts_reach_the_origin() {
    let cfg = parse(
      r#"
        host        = "0.0.0.0"
        port        = 80
        store_path  = "folio.db"
        output_dir  = "public"
        extra_hosts = ["blog.example.org"]
        poll_interval_secs = 0
      "#,
    );
    let site = cfg.site_config();
    assert!(site.origin.accepts_host("blog.example.org"));
    assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
  }

  #[tokio::test]
  async fn serves_api_and_generated_pages() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let alice = store.add_owner("alice").await.unwrap();
    let site = SiteConfig::new(dir.path().to_path_buf(), Origin::new("127.0.0.1", 8080));
    let engine = Arc::new(SyncEngine::new(store, MarkdownRenderer::default(), site));
    let doc = engine
      .create(alice.owner_id, NewDocument::new("Hello", "Blog").with_body("hi"))
      .await
      .unwrap();

    let resp = app(engine.clone())
      .oneshot(Request::get("/alice/blog/hello.html").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains(doc.cid.as_str()));

    let resp = app(engine)
      .oneshot(Request::get(format!("/api/paths/{}", doc.cid)).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["path"], "/alice/blog/hello.html");
  }
}
