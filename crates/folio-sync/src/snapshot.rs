//! Change detection: document signatures, the last-seen snapshot, and the
//! diff that turns a store listing into publishing tasks.

use std::collections::{BTreeMap, HashMap};

use folio_core::{
  document::{Cid, Document},
  slug::{canonical_stem, url_path},
};
use sha2::{Digest, Sha256};

/// SHA-256 over every mutable field of `doc`, hex encoded.
///
/// Fields are length-prefixed so no two different documents can produce the
/// same byte stream.
pub fn signature(doc: &Document) -> String {
  let mut hasher = Sha256::new();
  for field in [
    doc.cid.as_str(),
    doc.owner.as_str(),
    doc.title.as_str(),
    doc.category.as_str(),
    doc.body.as_str(),
    doc.summary.as_str(),
  ] {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
  }
  hasher.update(doc.owner_id.to_le_bytes());
  hasher.update([u8::from(doc.is_public)]);
  hasher.update(doc.updated_at.timestamp_micros().to_le_bytes());
  hex::encode(hasher.finalize())
}

/// What the reconciler remembers about a document between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
  pub signature: String,
  pub owner:     String,
  pub title:     String,
  pub category:  String,
}

impl SnapshotEntry {
  pub fn of(doc: &Document) -> Self {
    Self {
      signature: signature(doc),
      owner:     doc.owner.clone(),
      title:     doc.title.clone(),
      category:  doc.category.clone(),
    }
  }

  /// URL path this entry was published at.
  pub fn url_path(&self) -> String {
    url_path(&canonical_stem(&self.owner, &self.category, &self.title))
  }

  /// Whether `doc` lives at a different canonical path than this entry.
  /// Title edits that keep the slug (e.g. case changes) do not move it.
  pub fn moved(&self, doc: &Document) -> bool {
    self.url_path() != url_path(&canonical_stem(&doc.owner, &doc.category, &doc.title))
  }
}

/// CID → last committed [`SnapshotEntry`]. Owned by the reconciler alone.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  entries: HashMap<Cid, SnapshotEntry>,
}

impl Snapshot {
  pub fn get(&self, cid: &Cid) -> Option<&SnapshotEntry> { self.entries.get(cid) }

  pub fn insert(&mut self, cid: Cid, entry: SnapshotEntry) { self.entries.insert(cid, entry); }

  pub fn remove(&mut self, cid: &Cid) -> Option<SnapshotEntry> { self.entries.remove(cid) }

  pub fn contains(&self, cid: &Cid) -> bool { self.entries.contains_key(cid) }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&Cid, &SnapshotEntry)> { self.entries.iter() }
}

/// One unit of publishing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
  /// Never seen before.
  Create(Document),
  /// Seen before with a different signature, or pulled in by a cascade.
  /// `moved_from` is the URL path published last time, set when the
  /// canonical path changed.
  Update {
    doc:        Document,
    moved_from: Option<String>,
  },
  /// Seen before, gone from the store.
  Delete { cid: Cid, owner: String },
}

impl Task {
  pub fn cid(&self) -> &Cid {
    match self {
      Self::Create(doc) | Self::Update { doc, .. } => &doc.cid,
      Self::Delete { cid, .. } => cid,
    }
  }

  pub fn owner(&self) -> &str {
    match self {
      Self::Create(doc) | Self::Update { doc, .. } => &doc.owner,
      Self::Delete { owner, .. } => owner,
    }
  }

  pub fn document(&self) -> Option<&Document> {
    match self {
      Self::Create(doc) | Self::Update { doc, .. } => Some(doc),
      Self::Delete { .. } => None,
    }
  }
}

/// Result of comparing a store listing with the last snapshot.
#[derive(Debug, Default)]
pub struct ChangeSet {
  /// Creates and updates, oldest `updated_at` first.
  pub publish:   Vec<Task>,
  pub delete:    Vec<Task>,
  /// Documents whose signature did not change; cascade candidates.
  pub unchanged: BTreeMap<Cid, Document>,
  /// Entries for every document in the listing.
  pub fresh:     Snapshot,
}

impl ChangeSet {
  /// CIDs of updates that moved to a new canonical path.
  pub fn moved(&self) -> impl Iterator<Item = &Cid> {
    self.publish.iter().filter_map(|task| match task {
      Task::Update { doc, moved_from: Some(_) } => Some(&doc.cid),
      _ => None,
    })
  }

  /// Move an unchanged document into the publish set without re-deriving its
  /// path. Returns `false` if `cid` is not an unchanged document.
  pub fn cascade(&mut self, cid: &Cid) -> bool {
    match self.unchanged.remove(cid) {
      Some(doc) => {
        self.publish.push(Task::Update { doc, moved_from: None });
        true
      }
      None => false,
    }
  }
}

pub fn diff(prev: &Snapshot, docs: Vec<Document>) -> ChangeSet {
  let mut set = ChangeSet::default();

  for doc in docs {
    let entry = SnapshotEntry::of(&doc);
    let cid = doc.cid.clone();
    match prev.get(&cid) {
      Some(old) if old.signature == entry.signature => {
        set.unchanged.insert(cid.clone(), doc);
      }
      Some(old) => {
        let moved_from = old.moved(&doc).then(|| old.url_path());
        set.publish.push(Task::Update { doc, moved_from });
      }
      None => set.publish.push(Task::Create(doc)),
    }
    set.fresh.insert(cid, entry);
  }

  for (cid, old) in prev.iter() {
    if !set.fresh.contains(cid) {
      set.delete.push(Task::Delete { cid: cid.clone(), owner: old.owner.clone() });
    }
  }

  set.publish.sort_by(|a, b| {
    let key = |t: &Task| t.document().map(|d| (d.updated_at, d.cid.clone()));
    key(a).cmp(&key(b))
  });
  set.delete.sort_by(|a, b| a.cid().cmp(b.cid()));
  set
}
