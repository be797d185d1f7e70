//! Drives the item store through the restoration client.
//!
//! Dispatch runs on a cooperative runtime: every item of a batch is sent
//! without waiting for the others, and outcomes are joined settled-style so
//! one failure never cancels its siblings. The store lock is only held for
//! the synchronous transition steps, never across the network call.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use retro_client::{CredentialSource, RestorationClient};
use retro_core::{ItemId, ItemSnapshot, ItemStore, SourceImage, StoreError, StoreStats};

use crate::error::RuntimeError;

/// What happened to one dispatched item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    /// Terminal ERROR with the message shown to the user.
    Failed(String),
    /// The item was missing or not in a dispatchable state; nothing was sent.
    Skipped,
    /// The item was removed while its request was in flight; the result was dropped.
    Discarded,
}

/// Counts for one `restore_all` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub discarded: usize,
    pub duration_ms: u128,
}

impl BatchReport {
    fn from_outcomes(outcomes: &[DispatchOutcome], duration: Duration) -> Self {
        let mut report = BatchReport {
            dispatched: outcomes.len(),
            duration_ms: duration.as_millis(),
            ..BatchReport::default()
        };
        for outcome in outcomes {
            match outcome {
                DispatchOutcome::Completed => report.completed += 1,
                DispatchOutcome::Failed(_) => report.failed += 1,
                DispatchOutcome::Skipped => report.skipped += 1,
                DispatchOutcome::Discarded => report.discarded += 1,
            }
        }
        report
    }
}

/// Result of adding files to the store.
#[derive(Debug, Default)]
pub struct AddReport {
    pub added: Vec<ItemId>,
    /// Paths that were not added, with the reason.
    pub rejected: Vec<(PathBuf, String)>,
}

/// Counts one running batch for as long as it is alive.
struct BatchGuard(Arc<AtomicUsize>);

impl BatchGuard {
    fn enter(running: &Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::SeqCst);
        Self(running.clone())
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The single orchestration context: item store, client and batch flag.
///
/// Cloning shares the same store and client.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Mutex<ItemStore>>,
    client: Arc<dyn RestorationClient>,
    credentials: Option<Arc<dyn CredentialSource>>,
    /// Number of `restore_all` calls still in flight.
    batches_running: Arc<AtomicUsize>,
    limiter: Option<Arc<Semaphore>>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn RestorationClient>) -> Self {
        Self {
            store: Arc::new(Mutex::new(ItemStore::new())),
            client,
            credentials: None,
            batches_running: Arc::new(AtomicUsize::new(0)),
            limiter: None,
        }
    }

    /// Check (and if needed select) a credential before each batch.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Cap simultaneous requests. `None` or `0` means unbounded.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    // -----------------------------------------------------------------------
    // User intents
    // -----------------------------------------------------------------------

    pub async fn add_sources(&self, sources: Vec<SourceImage>) -> Vec<ItemId> {
        self.store.lock().await.add(sources)
    }

    /// Read each path and append it as a new item, in the given order.
    ///
    /// Unreadable and non-image files are reported, not fatal.
    pub async fn add_paths(&self, paths: &[PathBuf]) -> AddReport {
        let mut sources = Vec::new();
        let mut report = AddReport::default();
        for path in paths {
            match SourceImage::from_path(path).await {
                Ok(source) => sources.push(source),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping file");
                    report.rejected.push((path.clone(), err.to_string()));
                }
            }
        }
        report.added = self.add_sources(sources).await;
        report
    }

    pub async fn remove(&self, id: &ItemId) -> Result<(), RuntimeError> {
        let removed = self.store.lock().await.remove(id)?;
        tracing::debug!(item = %id, name = removed.name(), "item removed");
        Ok(())
    }

    /// Restore every IDLE or ERROR item concurrently and wait for all of them.
    pub async fn restore_all(&self) -> Result<BatchReport, RuntimeError> {
        self.ensure_credential().await?;

        let pending = self.store.lock().await.pending_ids();
        if pending.is_empty() {
            return Ok(BatchReport::default());
        }

        let batch = BatchGuard::enter(&self.batches_running);
        let started = Instant::now();
        tracing::info!(items = pending.len(), "dispatching restoration batch");

        let outcomes = join_all(pending.iter().map(|id| self.dispatch(id))).await;

        drop(batch);
        let report = BatchReport::from_outcomes(&outcomes, started.elapsed());
        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            discarded = report.discarded,
            duration_ms = report.duration_ms,
            "restoration batch finished",
        );
        Ok(report)
    }

    /// Restore a single item.
    pub async fn restore_one(&self, id: &ItemId) -> Result<DispatchOutcome, RuntimeError> {
        self.ensure_credential().await?;
        Ok(self.dispatch(id).await)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Run one item through PROCESSING to its terminal status.
    ///
    /// Re-checks the item's status before sending, so dispatching the same id
    /// twice sends one request.
    pub async fn dispatch(&self, id: &ItemId) -> DispatchOutcome {
        let payload = {
            let mut store = self.store.lock().await;
            if let Err(err) = store.set_processing(id) {
                tracing::debug!(item = %id, error = %err, "not dispatchable; skipped");
                return DispatchOutcome::Skipped;
            }
            match store.source_payload(id) {
                Some(payload) => payload,
                None => return DispatchOutcome::Skipped,
            }
        };

        let permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };
        let result = self.client.restore(&payload).await;
        drop(permit);

        let mut store = self.store.lock().await;
        let applied = match result {
            Ok(restored) => store
                .set_completed(id, restored)
                .map(|_| DispatchOutcome::Completed),
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(item = %id, error = %message, "restoration failed");
                store
                    .set_error(id, message.clone())
                    .map(|_| DispatchOutcome::Failed(message))
            }
        };

        match applied {
            Ok(outcome) => outcome,
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(item = %id, "item removed while in flight; result discarded");
                DispatchOutcome::Discarded
            }
            Err(err) => {
                tracing::warn!(item = %id, error = %err, "could not apply restoration result");
                DispatchOutcome::Discarded
            }
        }
    }

    /// Make sure an API key is selected, running selection if it is not.
    ///
    /// Selection is confirmed by checking again afterwards.
    pub async fn ensure_credential(&self) -> Result<(), RuntimeError> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };
        if credentials.selected().await.is_some() {
            return Ok(());
        }
        tracing::info!("no API key selected; starting key selection");
        credentials.select().await?;
        if credentials.selected().await.is_none() {
            return Err(RuntimeError::CredentialMissing);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Advisory only: true while any `restore_all` is running.
    pub fn is_batch_running(&self) -> bool {
        self.batches_running.load(Ordering::SeqCst) > 0
    }

    pub fn store(&self) -> Arc<Mutex<ItemStore>> {
        self.store.clone()
    }

    pub async fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.store.lock().await.snapshot()
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.lock().await.stats()
    }

    pub async fn resolve(&self, prefix: &str) -> Option<ItemId> {
        self.store.lock().await.resolve(prefix)
    }

    /// Release every outstanding handle. Returns how many were released.
    pub async fn shutdown(&self) -> usize {
        let released = self.store.lock().await.shutdown();
        tracing::debug!(released, "released image handles");
        released
    }
}
