//! Handlers for `/documents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/documents` | Body: `{"owner_id":1,"title":"Post","category":"Blog",...}` |
//! | `PATCH`  | `/documents/:cid` | Body: any subset of `title`, `category`, `body`, `summary` |
//! | `PUT`    | `/documents/:cid/visibility` | Body: `{"is_public":true}` |
//! | `DELETE` | `/documents/:cid` | 204; the page is retired |
//!
//! A taken title is suffixed (`Post (1)`, `Post (2)`, ...) rather than
//! rejected, so the returned title may differ from the requested one.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use folio_core::{
  document::{Document, DocumentPatch, NewDocument},
  store::{DocumentStore, PathStore},
};
use folio_sync::{Renderer, SyncEngine};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, parse_cid};

/// A document together with the path it was published at.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentView {
  #[serde(flatten)]
  pub document: Document,
  pub path:     Option<String>,
}

async fn view<S, R>(engine: &SyncEngine<S, R>, document: Document) -> Result<DocumentView, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let path = engine.resolve_path(&document.cid).await?;
  Ok(DocumentView { document, path })
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner_id: i64,
  #[serde(flatten)]
  pub document: NewDocument,
}

/// `POST /documents`
pub async fn create<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let doc = engine.create(body.owner_id, body.document).await?;
  Ok((StatusCode::CREATED, Json(view(&engine, doc).await?)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /documents/:cid`
pub async fn update<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
  Json(patch): Json<DocumentPatch>,
) -> Result<Json<DocumentView>, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  let doc = engine.update(&cid, patch).await?;
  Ok(Json(view(&engine, doc).await?))
}

// ─── Visibility ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VisibilityBody {
  pub is_public: bool,
}

/// `PUT /documents/:cid/visibility`
pub async fn visibility<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
  Json(body): Json<VisibilityBody>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  engine.set_public(&cid, body.is_public).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /documents/:cid`
pub async fn remove<S, R>(
  State(engine): State<Arc<SyncEngine<S, R>>>,
  Path(cid): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  let cid = parse_cid(&cid)?;
  engine.delete(&cid).await?;
  Ok(StatusCode::NO_CONTENT)
}
