//! Handlers for the publishing endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/publish/:cid` | Publish now; 404 (and retired) if the document is gone |
//! | `DELETE` | `/published/:cid` | Remove the page and mapping; the document is kept |
//! | `GET`    | `/paths/:cid` | 404 if the CID has no path |
//! | `GET`    | `/resolve?url=<url>` | 404 for URLs of other origins or unknown paths |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use folio_core::{
  document::Cid,
  store::{DocumentStore, PathStore},
};
use folio_sync::{Renderer, SyncEngine};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, parse_cid};

/// Where a document lives on the site.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Published {
  pub cid:  Cid,
  /// URL path, e.g. `/alice/blog/post.html`.
  pub path: String,
  /// Absolute public URL of `path`.
  pub url:  String,
}

impl Published {
  pub(crate) fn new<S, R>(engine: &SyncEngine<S, R>, cid: Cid, path: String) -> Self
  where
    S: DocumentStore + PathStore,
    R: Renderer,
  {
    let url = engine.public_url(&path);
    Self { cid, path, url }
  }
}

// ─── Publish ──────────────────────────────────────────────────────────────────

/// `POST /publish/:cid`
pub async fn publish_one<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
) -> Result<Json<Published>, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  let path = engine
    .publish_now(&cid)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("document {cid} not found")))?;
  Ok(Json(Published::new(&engine, cid, path)))
}

// ─── Retire ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Retired {
  pub cid:  Cid,
  /// The released path, if the document was published.
  pub path: Option<String>,
}

/// `DELETE /published/:cid`
pub async fn retire_one<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
) -> Result<Json<Retired>, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  let path = engine.retire(&cid).await?;
  Ok(Json(Retired { cid, path }))
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

/// `GET /paths/:cid`
pub async fn path_of<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
) -> Result<Json<Published>, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  let path = engine
    .resolve_path(&cid)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no path for {cid}")))?;
  Ok(Json(Published::new(&engine, cid, path)))
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
  pub url: String,
}

/// `GET /resolve?url=<absolute url>`
pub async fn resolve<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Query(params): Query<ResolveParams>,
) -> Result<Json<Published>, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let not_found = || ApiError::NotFound(format!("{} is not a page of this site", params.url));
  let cid = engine.resolve_cid(&params.url).await?.ok_or_else(not_found)?;
  let path = engine.resolve_path(&cid).await?.ok_or_else(not_found)?;
  Ok(Json(Published::new(&engine, cid, path)))
}
