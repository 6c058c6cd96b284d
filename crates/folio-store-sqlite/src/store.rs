//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`] and
//! [`PathStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use folio_core::{
  document::{Cid, Document, DocumentPatch, NewDocument, Owner, Placement},
  slug::{category_slug, slugify},
  store::{Backend, DocumentStore, PathStore},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{DOCUMENT_COLUMNS, RawDocument, decode_cid, encode_dt, generate_cid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Document, reference and path-mapping storage backed by one SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Whether `err` is the `(owner, category_slug, title_slug)` uniqueness
/// constraint firing.
fn is_slot_collision(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn read_document(
  conn: &rusqlite::Connection,
  cid: &str,
) -> rusqlite::Result<Option<RawDocument>> {
  conn
    .query_row(
      &format!(
        "SELECT {DOCUMENT_COLUMNS}
         FROM documents d JOIN owners o ON o.owner_id = d.owner_id
         WHERE d.cid = ?1"
      ),
      rusqlite::params![cid],
      RawDocument::from_row,
    )
    .optional()
}

fn read_documents(
  conn: &rusqlite::Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawDocument>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {DOCUMENT_COLUMNS}
     FROM documents d JOIN owners o ON o.owner_id = d.owner_id
     {filter}
     ORDER BY d.updated_at DESC, d.cid"
  ))?;
  stmt
    .query_map(params, RawDocument::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()
}

/// Result of a write closure that may hit the slot constraint or a missing
/// row.
enum Write {
  Done(RawDocument),
  Collision,
  Missing,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Register an owner. Owner names become the first segment of published
  /// paths and must be unique.
  pub async fn add_owner(&self, name: &str) -> Result<Owner> {
    Owner::validate_name(name)?;
    let name_owned = name.to_owned();
    let at_str     = encode_dt(Utc::now());

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO owners (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![name_owned, at_str],
        ) {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_slot_collision(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let owner_id = id.ok_or_else(|| Error::OwnerExists(name.to_owned()))?;
    Ok(Owner { owner_id, name: name.to_owned() })
  }

  fn finish_write(cid: &Cid, write: Write) -> Result<Placement<Document>> {
    match write {
      Write::Done(raw) => Ok(Placement::Placed(raw.into_document()?)),
      Write::Collision => Ok(Placement::Collision),
      Write::Missing => Err(Error::DocumentNotFound(cid.to_string())),
    }
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;
}

impl DocumentStore for SqliteStore {
  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list_changed_candidates(&self) -> Result<Vec<Document>> {
    let raws = self
      .conn
      .call(|conn| Ok(read_documents(conn, "", rusqlite::params![])?))
      .await?;
    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn get_fields(&self, cid: &Cid) -> Result<Option<Document>> {
    let cid_str = cid.to_string();
    let raw = self
      .conn
      .call(move |conn| Ok(read_document(conn, &cid_str)?))
      .await?;
    raw.map(RawDocument::into_document).transpose()
  }

  async fn list_owner_documents(&self, owner: &str) -> Result<Vec<Document>> {
    let owner = owner.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        Ok(read_documents(conn, "WHERE o.name = ?1", rusqlite::params![owner])?)
      })
      .await?;
    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn list_public_documents(&self) -> Result<Vec<Document>> {
    let raws = self
      .conn
      .call(|conn| Ok(read_documents(conn, "WHERE d.is_public = 1", rusqlite::params![])?))
      .await?;
    raws.into_iter().map(RawDocument::into_document).collect()
  }

  // ── Renderer side effects ─────────────────────────────────────────────────

  async fn mutate_body(&self, cid: &Cid, old: &str, new: &str) -> Result<bool> {
    if old.is_empty() || old == new {
      return Ok(false);
    }
    let cid_str = cid.to_string();
    let old     = old.to_owned();
    let new     = new.to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let body: Option<String> = tx
          .query_row(
            "SELECT body FROM documents WHERE cid = ?1",
            rusqlite::params![cid_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(body) = body else {
          return Ok(false);
        };
        let rewritten = body.replace(&old, &new);
        if rewritten == body {
          return Ok(false);
        }
        tx.execute(
          "UPDATE documents SET body = ?1 WHERE cid = ?2",
          rusqlite::params![rewritten, cid_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(changed)
  }

  async fn replace_reference_edges(
    &self,
    source:  &Cid,
    targets: &BTreeSet<Cid>,
  ) -> Result<()> {
    let source_str = source.to_string();
    let targets: Vec<String> = targets.iter().map(Cid::to_string).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM doc_references WHERE source_cid = ?1",
          rusqlite::params![source_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO doc_references (source_cid, target_cid) VALUES (?1, ?2)",
          )?;
          for target in &targets {
            stmt.execute(rusqlite::params![source_str, target])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn referencing(&self, target: &Cid) -> Result<Vec<Cid>> {
    let target_str = target.to_string();
    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_cid FROM doc_references WHERE target_cid = ?1 ORDER BY source_cid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![target_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.iter().map(|s| decode_cid(s)).collect()
  }

  // ── Direct mutations ──────────────────────────────────────────────────────

  async fn create_document(
    &self,
    owner_id: i64,
    input:    NewDocument,
  ) -> Result<Placement<Document>> {
    let cid           = generate_cid()?;
    let cid_str       = cid.to_string();
    let title_slug    = slugify(&input.title);
    let category_slug = category_slug(&input.category);
    let at_str        = encode_dt(Utc::now());

    let write = self
      .conn
      .call(move |conn| {
        let owner_exists = conn
          .query_row(
            "SELECT 1 FROM owners WHERE owner_id = ?1",
            rusqlite::params![owner_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !owner_exists {
          return Ok(Write::Missing);
        }

        let inserted = conn.execute(
          "INSERT INTO documents (
             cid, owner_id, title, title_slug, category, category_slug,
             body, summary, is_public, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            cid_str,
            owner_id,
            input.title,
            title_slug,
            input.category,
            category_slug,
            input.body,
            input.summary,
            input.is_public,
            at_str,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_slot_collision(&e) => return Ok(Write::Collision),
          Err(e) => return Err(e.into()),
        }
        Ok(match read_document(conn, &cid_str)? {
          Some(raw) => Write::Done(raw),
          None => Write::Missing,
        })
      })
      .await?;

    match write {
      Write::Missing => Err(Error::OwnerNotFound(owner_id)),
      other => Self::finish_write(&cid, other),
    }
  }

  async fn update_document(
    &self,
    cid:   &Cid,
    patch: DocumentPatch,
  ) -> Result<Placement<Document>> {
    let cid_str = cid.to_string();
    let at_str  = encode_dt(Utc::now());

    let write = self
      .conn
      .call(move |conn| {
        let Some(current) = read_document(conn, &cid_str)? else {
          return Ok(Write::Missing);
        };

        let title    = patch.title.unwrap_or(current.title);
        let category = patch.category.unwrap_or(current.category);
        let body     = patch.body.unwrap_or(current.body);
        let summary  = patch.summary.unwrap_or(current.summary);

        let updated = conn.execute(
          "UPDATE documents SET
             title = ?1, title_slug = ?2, category = ?3, category_slug = ?4,
             body = ?5, summary = ?6, updated_at = ?7
           WHERE cid = ?8",
          rusqlite::params![
            title,
            slugify(&title),
            category,
            category_slug(&category),
            body,
            summary,
            at_str,
            cid_str,
          ],
        );
        match updated {
          Ok(_) => {}
          Err(e) if is_slot_collision(&e) => return Ok(Write::Collision),
          Err(e) => return Err(e.into()),
        }
        Ok(match read_document(conn, &cid_str)? {
          Some(raw) => Write::Done(raw),
          None => Write::Missing,
        })
      })
      .await?;

    Self::finish_write(cid, write)
  }

  async fn set_public(&self, cid: &Cid, is_public: bool) -> Result<bool> {
    let cid_str = cid.to_string();
    let at_str  = encode_dt(Utc::now());
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE documents SET is_public = ?1, updated_at = ?2 WHERE cid = ?3",
          rusqlite::params![is_public, at_str, cid_str],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn delete_document(&self, cid: &Cid) -> Result<bool> {
    let cid_str = cid.to_string();
    let n = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM doc_references WHERE source_cid = ?1",
          rusqlite::params![cid_str],
        )?;
        let n = tx.execute("DELETE FROM documents WHERE cid = ?1", rusqlite::params![cid_str])?;
        tx.commit()?;
        Ok(n)
      })
      .await?;
    Ok(n > 0)
  }
}

// ─── PathStore impl ──────────────────────────────────────────────────────────

impl PathStore for SqliteStore {
  async fn upsert_mapping(&self, cid: &Cid, url_path: &str) -> Result<()> {
    let cid_str  = cid.to_string();
    let url_path = url_path.to_owned();

    self
      .conn
      .call(move |conn| {
        // Re-assigning the same path keeps its sequence number so an
        // idempotent assign does not reorder reverse lookups.
        conn.execute(
          "INSERT INTO url_mappings (cid, url_path, assigned_seq)
           VALUES (?1, ?2, (SELECT COALESCE(MAX(assigned_seq), 0) + 1 FROM url_mappings))
           ON CONFLICT (cid) DO UPDATE SET
             url_path     = excluded.url_path,
             assigned_seq = CASE WHEN url_mappings.url_path = excluded.url_path
                                 THEN url_mappings.assigned_seq
                                 ELSE excluded.assigned_seq END",
          rusqlite::params![cid_str, url_path],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn path_for_cid(&self, cid: &Cid) -> Result<Option<String>> {
    let cid_str = cid.to_string();
    let path = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT url_path FROM url_mappings WHERE cid = ?1",
              rusqlite::params![cid_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(path)
  }

  async fn cid_for_path(&self, url_path: &str) -> Result<Option<Cid>> {
    let url_path = url_path.to_owned();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT cid FROM url_mappings WHERE url_path = ?1
               ORDER BY assigned_seq DESC LIMIT 1",
              rusqlite::params![url_path],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.as_deref().map(decode_cid).transpose()
  }

  async fn remove_mapping(&self, cid: &Cid) -> Result<Option<String>> {
    let cid_str = cid.to_string();
    let path = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let path: Option<String> = tx
          .query_row(
            "SELECT url_path FROM url_mappings WHERE cid = ?1",
            rusqlite::params![cid_str],
            |r| r.get(0),
          )
          .optional()?;
        tx.execute("DELETE FROM url_mappings WHERE cid = ?1", rusqlite::params![cid_str])?;
        tx.commit()?;
        Ok(path)
      })
      .await?;
    Ok(path)
  }
}
