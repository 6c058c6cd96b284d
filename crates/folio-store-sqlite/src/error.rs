//! Error type for `folio-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] folio_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("owner not found: {0}")]
  OwnerNotFound(i64),

  #[error("owner name already taken: {0:?}")]
  OwnerExists(String),

  #[error("document not found: {0}")]
  DocumentNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
