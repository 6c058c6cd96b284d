//! JSON REST API for Folio.
//!
//! Exposes an axum [`Router`] backed by a [`SyncEngine`]. Every mutating
//! route publishes immediately; the reconciliation loop only has to catch
//! what these routes miss. Auth and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", folio_api::api_router(engine.clone()))
//! ```

pub mod documents;
pub mod error;
pub mod publish;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post, put},
};
use folio_core::{
  document::Cid,
  store::{DocumentStore, PathStore},
};
use folio_sync::{Renderer, SyncEngine};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, R>(engine: Arc<SyncEngine<S, R>>) -> Router<()>
where
  S: DocumentStore + PathStore + 'static,
  R: Renderer + 'static,
{
  Router::new()
    // Publishing
    .route("/publish/{cid}", post(publish::publish_one::<S, R>))
    .route("/published/{cid}", delete(publish::retire_one::<S, R>))
    .route("/paths/{cid}", get(publish::path_of::<S, R>))
    .route("/resolve", get(publish::resolve::<S, R>))
    // Documents
    .route("/documents", post(documents::create::<S, R>))
    .route(
      "/documents/{cid}",
      patch(documents::update::<S, R>).delete(documents::remove::<S, R>),
    )
    .route("/documents/{cid}/visibility", put(documents::visibility::<S, R>))
    .with_state(engine)
}

/// Parse a CID taken from the request path.
pub(crate) fn parse_cid(raw: &str) -> Result<Cid, ApiError> {
  Cid::parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid cid {raw:?}")))
}
