//! SQL schema for the Folio SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS owners (
    owner_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- The slug columns mirror title/category and carry the canonical-path
-- uniqueness constraint; writers get a collision instead of two documents
-- sharing one published file.
CREATE TABLE IF NOT EXISTS documents (
    cid            TEXT PRIMARY KEY,
    owner_id       INTEGER NOT NULL REFERENCES owners(owner_id),
    title          TEXT NOT NULL,
    title_slug     TEXT NOT NULL,
    category       TEXT NOT NULL,
    category_slug  TEXT NOT NULL,
    body           TEXT NOT NULL DEFAULT '',
    summary        TEXT NOT NULL DEFAULT '',
    is_public      INTEGER NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL,   -- RFC 3339 UTC, fixed precision
    UNIQUE (owner_id, category_slug, title_slug)
);

-- Mappings outlive their documents until the engine releases them, so there
-- is no foreign key. url_path is not unique: a released path may briefly be
-- held by both the old and the new owner, and lookups take the latest.
CREATE TABLE IF NOT EXISTS url_mappings (
    cid           TEXT PRIMARY KEY,
    url_path      TEXT NOT NULL,
    assigned_seq  INTEGER NOT NULL
);

-- Edges may point at deleted documents; those render as orphan links.
CREATE TABLE IF NOT EXISTS doc_references (
    source_cid  TEXT NOT NULL,
    target_cid  TEXT NOT NULL,
    PRIMARY KEY (source_cid, target_cid)
);

CREATE INDEX IF NOT EXISTS documents_owner_idx   ON documents(owner_id);
CREATE INDEX IF NOT EXISTS documents_updated_idx ON documents(updated_at);
CREATE INDEX IF NOT EXISTS url_mappings_path_idx ON url_mappings(url_path);
CREATE INDEX IF NOT EXISTS doc_references_target ON doc_references(target_cid);

PRAGMA user_version = 1;
";
