use crate::snapshot::{RebuildOutcome, RecordCache};
use crate::source::RemoteSource;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Runs stale-triggered rebuilds as background tasks. At most one is in
/// flight; completions are observable through a watch channel for anyone who
/// wants to re-read after a refresh lands.
pub struct RefreshScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
    completions: watch::Sender<u64>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        let (completions, _) = watch::channel(0);
        Self {
            task: Mutex::new(None),
            completions,
        }
    }

    /// Spawns a background rebuild unless one is already running. Returns
    /// whether a new task was started. Never waits on the rebuild itself.
    pub fn trigger<S>(&self, cache: RecordCache, source: Arc<S>) -> bool
    where
        S: RemoteSource + Send + Sync + 'static,
    {
        let mut slot = match self.task.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                tracing::debug!("Background rebuild already running, not spawning another");
                return false;
            }
        }

        let completions = self.completions.clone();
        *slot = Some(tokio::spawn(async move {
            match cache.rebuild_all(source.as_ref()).await {
                Ok(RebuildOutcome::Completed) => {
                    tracing::info!("Background rebuild finished");
                }
                Ok(RebuildOutcome::Skipped) => {
                    tracing::info!("Background rebuild skipped, another rebuilder held the lock");
                }
                // Not observable by the read that triggered us; the stale
                // clock will re-trigger on the next read.
                Err(e) => {
                    tracing::error!(error = %e, "Background rebuild failed");
                }
            }
            completions.send_modify(|n| *n += 1);
        }));
        true
    }

    /// A receiver that ticks after every finished background rebuild,
    /// successful or not.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.completions.subscribe()
    }

    pub fn cancel(&self) {
        let mut slot = match self.task.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySource;
    use serde_json::json;

    #[tokio::test]
    async fn completion_is_observable_through_the_watch_channel() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path().to_path_buf()).unwrap();
        let source = Arc::new(MemorySource::new());
        source.add_table("Links", vec![("r1", json!({"Name": "A"}))]);

        let scheduler = RefreshScheduler::new();
        let mut completions = scheduler.subscribe();

        assert!(scheduler.trigger(cache.clone(), source.clone()));
        completions.changed().await.unwrap();
        assert_eq!(*completions.borrow(), 1);
        assert!(cache.is_initialized());
    }

    #[tokio::test]
    async fn only_one_rebuild_runs_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path().to_path_buf()).unwrap();
        let source = Arc::new(MemorySource::new());
        source.add_table("Links", vec![]);
        source.hold_remote();

        let scheduler = RefreshScheduler::new();
        assert!(scheduler.trigger(cache.clone(), source.clone()));
        assert!(!scheduler.trigger(cache.clone(), source.clone()));

        let mut completions = scheduler.subscribe();
        source.release_remote();
        completions.changed().await.unwrap();

        // The first task finished, so a new one may start.
        assert!(scheduler.trigger(cache, source));
    }
}
