//! Error types for `folio-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid document id: {0:?}")]
  InvalidCid(String),

  #[error("invalid owner name: {0:?}")]
  InvalidOwnerName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
