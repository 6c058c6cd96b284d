//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so lexical order equals chronological order. CIDs are stored verbatim.

use chrono::{DateTime, SecondsFormat, Utc};
use folio_core::document::{Cid, Document};
use rand_core::{OsRng, RngCore as _};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Cid ─────────────────────────────────────────────────────────────────────

/// Length of generated document identifiers.
pub const CID_LEN: usize = 11;

const CID_ALPHABET: &[u8; 62] =
  b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Draw a random alphanumeric identifier from the OS RNG.
///
/// Bytes ≥ 248 are rejected so every symbol is equally likely (248 = 4 × 62).
pub fn generate_cid() -> Result<Cid> {
  let mut out = String::with_capacity(CID_LEN);
  let mut buf = [0u8; 32];
  while out.len() < CID_LEN {
    OsRng.fill_bytes(&mut buf);
    for b in buf {
      if b < 248 && out.len() < CID_LEN {
        out.push(char::from(CID_ALPHABET[usize::from(b % 62)]));
      }
    }
  }
  Ok(Cid::parse(&out)?)
}

pub fn decode_cid(s: &str) -> Result<Cid> { Ok(Cid::parse(s)?) }

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Column list matching [`RawDocument::from_row`].
pub const DOCUMENT_COLUMNS: &str = "d.cid, d.owner_id, o.name, d.title, d.category,
  d.body, d.summary, d.is_public, d.updated_at";

/// A `documents ⋈ owners` row as read from SQLite.
pub struct RawDocument {
  pub cid:        String,
  pub owner_id:   i64,
  pub owner:      String,
  pub title:      String,
  pub category:   String,
  pub body:       String,
  pub summary:    String,
  pub is_public:  bool,
  pub updated_at: String,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cid:        row.get(0)?,
      owner_id:   row.get(1)?,
      owner:      row.get(2)?,
      title:      row.get(3)?,
      category:   row.get(4)?,
      body:       row.get(5)?,
      summary:    row.get(6)?,
      is_public:  row.get(7)?,
      updated_at: row.get(8)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      cid:        decode_cid(&self.cid)?,
      owner_id:   self.owner_id,
      owner:      self.owner,
      title:      self.title,
      category:   self.category,
      body:       self.body,
      summary:    self.summary,
      is_public:  self.is_public,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
