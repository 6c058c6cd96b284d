//! Background worker driving the [`Reconciler`] on a fixed interval.

use std::{sync::Arc, time::Duration};

use folio_core::store::{DocumentStore, PathStore};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::{Reconciler, Renderer, SyncEngine};

/// Handle to the reconciliation worker.
///
/// Stopping is cooperative: the flag is checked between cycles, and a cycle
/// in progress always runs to completion.
pub struct SyncService {
  stop:   watch::Sender<bool>,
  handle: JoinHandle<()>,
}

impl SyncService {
  /// Prepare the output directory, then scan every `interval` until
  /// [`stop`](Self::stop) is called. Must be called inside a tokio runtime.
  pub fn start<S, R>(engine: Arc<SyncEngine<S, R>>, interval: Duration) -> Self
  where
    S: DocumentStore + PathStore + 'static,
    R: Renderer + 'static,
  {
    let (stop, mut stopped) = watch::channel(false);

    let handle = tokio::spawn(async move {
      if let Err(e) = engine.prepare_output().await {
        error!(error = %e, "output preparation failed");
      }
      let mut reconciler = Reconciler::new(engine);
      info!(interval_ms = interval.as_millis() as u64, "reconciliation started");

      loop {
        let stopping = *stopped.borrow();
        if stopping {
          break;
        }
        // Errors are logged by the reconciler; the next tick retries.
        let _ = reconciler.scan().await;

        tokio::select! {
          _ = tokio::time::sleep(interval) => {}
          changed = stopped.changed() => {
            if changed.is_err() {
              break;
            }
          }
        }
      }
      info!("reconciliation stopped");
    });

    Self { stop, handle }
  }

  /// Ask the worker to exit after the current cycle.
  pub fn stop(&self) { let _ = self.stop.send(true); }

  pub fn is_finished(&self) -> bool { self.handle.is_finished() }

  /// Wait for the worker to exit.
  pub async fn join(self) {
    if let Err(e) = self.handle.await {
      error!(error = %e, "reconciliation worker panicked");
    }
  }
}
