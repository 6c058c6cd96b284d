//! Error type for `folio-sync`.
//!
//! Every variant is scoped to one task: the reconciliation loop logs it and
//! retries the task on the next cycle. A link to a CID without a path is not
//! an error; it renders as [`ORPHAN_HREF`](crate::links::ORPHAN_HREF).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The document or path store failed; retried next cycle.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("filesystem error at {path:?}: {source}")]
  Filesystem {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Refused to touch a path outside the output directory.
  #[error("unsafe output path: {0:?}")]
  UnsafePath(String),

  /// Every suffixed variant of the title was taken.
  #[error("no free canonical path for title {0:?}")]
  Collision(String),

  #[error("document not found: {0}")]
  DocumentNotFound(String),
}

impl Error {
  pub(crate) fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub(crate) fn fs(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Filesystem { path, source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
