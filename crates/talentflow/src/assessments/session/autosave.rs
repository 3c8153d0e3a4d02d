use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::super::repository::{self as records, RecordStore};
use super::super::response::AssessmentResponse;
use super::clock::ClockReading;

/// Debounced background persistence of in-progress responses.
///
/// Snapshots are handed over through a watch channel so a newer snapshot always
/// replaces a pending one. A single worker performs the writes, which keeps at most
/// one write in flight.
pub(crate) struct Autosaver {
    pending: watch::Sender<Option<AssessmentResponse>>,
    worker: JoinHandle<()>,
}

impl Autosaver {
    pub(crate) fn spawn<S>(store: Arc<S>, clock: ClockReading, quiet: Duration) -> Self
    where
        S: RecordStore + 'static,
    {
        let (pending, rx) = watch::channel(None);
        let worker = tokio::spawn(debounce_loop(rx, store, clock, quiet));
        Self { pending, worker }
    }

    pub(crate) fn schedule(&self, snapshot: AssessmentResponse) {
        self.pending.send_replace(Some(snapshot));
    }

    /// Write any pending snapshot now and stop the worker.
    pub(crate) async fn flush(self) {
        let Self { pending, worker } = self;
        drop(pending);
        join(worker).await;
    }

    /// Discard any pending snapshot and stop the worker. A write already in flight
    /// completes before this returns.
    pub(crate) async fn cancel(self) {
        let Self { pending, worker } = self;
        pending.send_replace(None);
        drop(pending);
        join(worker).await;
    }
}

async fn join(worker: JoinHandle<()>) {
    if let Err(error) = worker.await {
        warn!(error = %error, "autosave worker ended abnormally");
    }
}

async fn debounce_loop<S>(
    mut rx: watch::Receiver<Option<AssessmentResponse>>,
    store: Arc<S>,
    clock: ClockReading,
    quiet: Duration,
) where
    S: RecordStore + 'static,
{
    loop {
        if rx.changed().await.is_err() {
            break;
        }

        debug!("autosave scheduled, waiting for quiet period");
        loop {
            match tokio::time::timeout(quiet, rx.changed()).await {
                Ok(Ok(())) => debug!("newer snapshot supersedes pending autosave"),
                // Sender gone: flush whatever is pending.
                Ok(Err(_)) => break,
                Err(_) => break,
            }
        }

        let snapshot = rx.borrow_and_update().clone();
        let Some(mut snapshot) = snapshot else {
            continue;
        };

        snapshot.time_spent_seconds = clock.elapsed_seconds();
        snapshot.updated_at = Utc::now();
        match records::put(store.as_ref(), &snapshot).await {
            Ok(()) => debug!(
                response_id = %snapshot.id.0,
                answers = snapshot.responses.len(),
                "autosaved response"
            ),
            Err(error) => warn!(
                response_id = %snapshot.id.0,
                error = %error,
                "autosave failed; next change will retry"
            ),
        }
    }
}
