//! The reconciliation loop: one full pass of the store against the last
//! snapshot.
//!
//! Per cycle: diff, cascade lookup, pre-clean of moved paths, register every
//! path, materialize, delete, refresh indexes, commit the snapshot. A failed
//! task is logged and keeps its previous snapshot entry, so the next cycle
//! sees it as changed again; the rest of the cycle carries on.

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  mem,
  sync::Arc,
};

use folio_core::{
  document::Cid,
  store::{DocumentStore, PathStore},
};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Renderer, Result, SyncEngine,
  materialize::WriteOutcome,
  snapshot::{Snapshot, Task, diff},
};

/// Counters for one [`Reconciler::scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
  /// Document pages written.
  pub written:         usize,
  /// Document pages re-rendered to identical bytes.
  pub unchanged:       usize,
  /// Pages deleted (moved or removed documents).
  pub removed:         usize,
  /// Index and listing pages written.
  pub indexes_written: usize,
  /// Tasks that failed and will be retried.
  pub failed:          usize,
  /// Referencing documents re-rendered because a target moved.
  pub cascaded:        usize,
}

impl CycleReport {
  /// Whether the cycle changed nothing on disk.
  pub fn is_noop(&self) -> bool {
    self.written == 0 && self.removed == 0 && self.indexes_written == 0
  }
}

pub struct Reconciler<S, R> {
  engine:        Arc<SyncEngine<S, R>>,
  snapshot:      Snapshot,
  /// Owners whose index failed to rebuild; retried next cycle.
  stale_owners:  BTreeSet<String>,
  listing_stale: bool,
}

impl<S, R> Reconciler<S, R>
where
  S: DocumentStore + PathStore,
  R: Renderer,
{
  /// Starts from an empty snapshot, so the first scan publishes everything.
  pub fn new(engine: Arc<SyncEngine<S, R>>) -> Self {
    Self {
      engine,
      snapshot: Snapshot::default(),
      stale_owners: BTreeSet::new(),
      listing_stale: false,
    }
  }

  pub fn snapshot(&self) -> &Snapshot { &self.snapshot }

  pub fn engine(&self) -> &Arc<SyncEngine<S, R>> { &self.engine }

  /// Run one cycle.
  ///
  /// Only a failure to list the store fails the whole cycle; the snapshot is
  /// then left untouched. Every other failure is scoped to one task.
  pub async fn scan(&mut self) -> Result<CycleReport> {
    let engine = self.engine.clone();
    let docs = match engine.store.list_changed_candidates().await {
      Ok(docs) => docs,
      Err(e) => {
        let e = Error::store(e);
        error!(error = %e, "reconciliation cycle failed");
        return Err(e);
      }
    };

    let mut set = diff(&self.snapshot, docs);
    let mut report = CycleReport::default();
    let mut failed = BTreeSet::new();

    // Cascade: direct referencers of moved documents embed the stale path.
    // Referencer → the moved document that pulled it in.
    let mut pulled_in: HashMap<Cid, Cid> = HashMap::new();
    let moved: Vec<Cid> = set.moved().cloned().collect();
    for target in moved {
      match engine.store.referencing(&target).await {
        Ok(sources) => {
          for source in sources {
            if set.cascade(&source) {
              debug!(source = %source, target = %target, "cascade");
              pulled_in.insert(source, target.clone());
              report.cascaded += 1;
            }
          }
        }
        Err(e) => fail(&mut failed, &target, &Error::store(e), "cascade lookup"),
      }
    }

    // Pre-clean the old paths of moved documents before any path is reassigned.
    for task in &set.publish {
      if let Task::Update { doc, moved_from: Some(old) } = task {
        match engine.remove_stale(&doc.cid, old).await {
          Ok(removed) => report.removed += usize::from(removed),
          Err(e) => fail(&mut failed, &doc.cid, &e, "pre-clean"),
        }
      }
    }

    // Register every path before any page is written.
    let mut paths = BTreeMap::new();
    for doc in set.publish.iter().filter_map(Task::document) {
      if failed.contains(&doc.cid) {
        continue;
      }
      match engine.register(doc).await {
        Ok(path) => {
          paths.insert(doc.cid.clone(), path);
        }
        Err(e) => fail(&mut failed, &doc.cid, &e, "register"),
      }
    }

    for doc in set.publish.iter().filter_map(Task::document) {
      let Some(path) = paths.get(&doc.cid) else {
        continue;
      };
      match engine.materialize(doc, path).await {
        Ok(WriteOutcome::Written) => report.written += 1,
        Ok(WriteOutcome::Unchanged) => report.unchanged += 1,
        Err(e) => fail(&mut failed, &doc.cid, &e, "materialize"),
      }
    }

    for task in &set.delete {
      let cid = task.cid();
      let known = self.snapshot.get(cid).map(|entry| entry.url_path());
      match engine.unpublish(cid, known.as_deref()).await {
        Ok(gone) => report.removed += usize::from(gone.removed),
        Err(e) => fail(&mut failed, cid, &e, "delete"),
      }
    }

    // A failed referencer means the cascade has to run again next cycle.
    for (source, target) in &pulled_in {
      if failed.contains(source) && failed.insert(target.clone()) {
        warn!(target = %target, source = %source, "cascade incomplete; retrying next cycle");
      }
    }

    // Indexes reflect the store, not the tasks, so they are rebuilt even
    // when some task failed.
    let mut owners = mem::take(&mut self.stale_owners);
    owners.extend(
      set
        .publish
        .iter()
        .chain(&set.delete)
        .map(|task| task.owner().to_owned()),
    );
    for owner in owners {
      match engine.rebuild_owner_index(&owner).await {
        Ok(outcome) => report.indexes_written += usize::from(outcome == WriteOutcome::Written),
        Err(e) => {
          warn!(owner = %owner, error = %e, "owner index rebuild failed");
          self.stale_owners.insert(owner);
        }
      }
    }
    let changed = !set.publish.is_empty() || !set.delete.is_empty();
    if changed || self.listing_stale {
      match engine.rebuild_listing().await {
        Ok(outcome) => {
          self.listing_stale = false;
          report.indexes_written += usize::from(outcome == WriteOutcome::Written);
        }
        Err(e) => {
          warn!(error = %e, "listing rebuild failed");
          self.listing_stale = true;
        }
      }
    }

    // Failed tasks keep their previous entry (or stay unseen).
    let mut next = set.fresh;
    for cid in &failed {
      match self.snapshot.get(cid) {
        Some(prev) => next.insert(cid.clone(), prev.clone()),
        None => {
          next.remove(cid);
        }
      }
    }
    self.snapshot = next;
    report.failed = failed.len();

    if report.is_noop() && report.failed == 0 {
      debug!(?report, "reconciliation cycle complete");
    } else {
      info!(
        written = report.written,
        unchanged = report.unchanged,
        removed = report.removed,
        indexes = report.indexes_written,
        cascaded = report.cascaded,
        failed = report.failed,
        "reconciliation cycle complete"
      );
    }
    Ok(report)
  }
}

fn fail(failed: &mut BTreeSet<Cid>, cid: &Cid, error: &Error, stage: &str) {
  warn!(cid = %cid, stage, error = %error, "task failed; retrying next cycle");
  failed.insert(cid.clone());
}
