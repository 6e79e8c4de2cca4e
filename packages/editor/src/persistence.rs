//! # Debounced Persistence
//!
//! Edits mark sections dirty; one write per dirty section happens after a
//! quiet period with no further edits. Every new edit reschedules the timer.
//! Teardown cancels the timer, aborts writes already in flight and drops
//! whatever was still pending.

use async_trait::async_trait;
use redline_common::{SectionContent, SectionId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Section rejected by store: {0}")]
    Rejected(SectionId),
}

/// Durable store for section content, owned by the host
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn save(&self, section_id: &SectionId, content: &SectionContent) -> Result<(), PersistError>;
}

type Pending = Arc<Mutex<BTreeMap<SectionId, SectionContent>>>;
type Writes = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Collapses repeated edits into one save per section
pub struct DebouncedSaver {
    service: Arc<dyn PersistenceService>,
    quiet: Duration,
    pending: Pending,
    writes: Writes,
    timer: Option<JoinHandle<()>>,
}

impl DebouncedSaver {
    pub fn new(service: Arc<dyn PersistenceService>, quiet: Duration) -> Self {
        Self {
            service,
            quiet,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
            timer: None,
        }
    }

    /// Mark a section dirty and restart the quiet period
    pub fn schedule(&mut self, section_id: SectionId, content: SectionContent) {
        lock(&self.pending).insert(section_id, content);
        self.abort_timer();

        let pending = Arc::clone(&self.pending);
        let writes = Arc::clone(&self.writes);
        let service = Arc::clone(&self.service);
        let quiet = self.quiet;

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;

            // Taken and handed off without an await in between, so a
            // reschedule either leaves the batch pending or lets the write run.
            let batch = std::mem::take(&mut *lock(&pending));
            let write = tokio::spawn(async move {
                write_batch(service.as_ref(), batch).await;
            });

            let mut writes = lock(&writes);
            writes.retain(|w| !w.is_finished());
            writes.push(write);
        }));
    }

    pub fn has_pending(&self) -> bool {
        !lock(&self.pending).is_empty()
    }

    /// Write everything pending now; returns the number of sections saved
    pub async fn flush(&mut self) -> usize {
        self.abort_timer();
        let batch = std::mem::take(&mut *lock(&self.pending));
        write_batch(self.service.as_ref(), batch).await
    }

    /// Drop pending writes, abort writes in flight and stop the timer
    pub fn cancel(&mut self) {
        self.abort_timer();

        for write in std::mem::take(&mut *lock(&self.writes)) {
            if !write.is_finished() {
                debug!("Aborting save in flight on teardown");
                write.abort();
            }
        }

        let dropped = std::mem::take(&mut *lock(&self.pending)).len();
        if dropped > 0 {
            debug!(sections = dropped, "Discarded pending saves on teardown");
        }
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn write_batch(service: &dyn PersistenceService, batch: BTreeMap<SectionId, SectionContent>) -> usize {
    let mut saved = 0;

    for (section_id, content) in batch {
        match service.save(&section_id, &content).await {
            Ok(()) => {
                debug!(section = %section_id, "Section saved");
                saved += 1;
            }
            Err(e) => warn!(section = %section_id, error = %e, "Failed to save section"),
        }
    }

    saved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<(SectionId, SectionContent)>>,
        fail: bool,
        latency: Duration,
    }

    #[async_trait]
    impl PersistenceService for RecordingStore {
        async fn save(&self, section_id: &SectionId, content: &SectionContent) -> Result<(), PersistError> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail {
                return Err(PersistError::Storage("disk full".into()));
            }
            self.saves.lock().unwrap().push((section_id.clone(), content.clone()));
            Ok(())
        }
    }

    fn text(s: &str) -> SectionContent {
        SectionContent::Text(s.into())
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_edits_collapse_into_one_write() {
        let store = Arc::new(RecordingStore::default());
        let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(2));

        saver.schedule("summary".into(), text("a"));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        saver.schedule("summary".into(), text("ab"));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        settle().await;
        assert!(store.saves.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1, text("ab"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_write() {
        let store = Arc::new(RecordingStore::default());
        let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(2));

        saver.schedule("summary".into(), text("a"));
        saver.cancel();
        saver.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert!(store.saves.lock().unwrap().is_empty());
        assert!(!saver.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let store = Arc::new(RecordingStore::default());
        {
            let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(2));
            saver.schedule("summary".into(), text("a"));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_write_in_flight() {
        let store = Arc::new(RecordingStore {
            latency: Duration::from_secs(1),
            ..Default::default()
        });
        let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(2));

        saver.schedule("summary".into(), text("a"));
        // Timer fired at 2s; the slow write is still running
        tokio::time::sleep(Duration::from_millis(2500)).await;
        settle().await;
        assert!(!saver.has_pending());
        assert!(store.saves.lock().unwrap().is_empty());

        saver.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_write_completes_without_teardown() {
        let store = Arc::new(RecordingStore {
            latency: Duration::from_secs(1),
            ..Default::default()
        });
        let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(2));

        saver.schedule("summary".into(), text("a"));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        settle().await;

        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_writes_each_section_once() {
        let store = Arc::new(RecordingStore::default());
        let mut saver = DebouncedSaver::new(store.clone(), Duration::from_secs(60));

        saver.schedule("a".into(), text("1"));
        saver.schedule("b".into(), text("2"));
        saver.schedule("a".into(), text("3"));

        assert_eq!(saver.flush().await, 2);
        assert!(!saver.has_pending());

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves[0], (SectionId::new("a"), text("3")));
        assert_eq!(saves[1], (SectionId::new("b"), text("2")));
    }

    #[tokio::test]
    async fn test_failed_save_is_logged_not_retried() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let mut saver = DebouncedSaver::new(store, Duration::from_secs(60));

        saver.schedule("a".into(), text("1"));
        assert_eq!(saver.flush().await, 0);
        assert!(!saver.has_pending());
    }
}
