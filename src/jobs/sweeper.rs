//! Periodic removal of submitted jobs that were never attached.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio::time;

use crate::jobs::store::JobStore;

/// Discards stored parameters older than a time-to-live.
pub struct StaleJobSweeper {
    store: Arc<dyn JobStore>,
    ttl: Duration,
    interval: Duration,
}

impl StaleJobSweeper {
    pub fn new(store: Arc<dyn JobStore>, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    /// One pass. Returns how many entries were removed.
    pub fn sweep_once(&self) -> usize {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let cutoff = now.saturating_sub(self.ttl.as_secs());

        match self.store.purge_created_before(cutoff) {
            Ok(0) => 0,
            Ok(purged) => {
                tracing::info!(purged, ttl_secs = self.ttl.as_secs(), "Discarded stale jobs");
                purged
            }
            Err(e) => {
                tracing::error!(error = %e, "Stale job sweep failed");
                0
            }
        }
    }

    /// Sweep on every interval until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Stale job sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Stale job sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::MemoryJobStore;
    use crate::jobs::types::JobSubmission;

    fn store_with_job(job_id: &str, created_at: u64) -> MemoryJobStore {
        let mut params = JobSubmission {
            ak: "ak".into(),
            sk: "sk".into(),
            instance_id: "esa-1".into(),
            ..JobSubmission::default()
        }
        .into_parameters()
        .unwrap();
        params.created_at = created_at;

        let store = MemoryJobStore::new();
        store.put_parameters(job_id, &params).unwrap();
        store
    }

    #[test]
    fn test_fresh_jobs_survive() {
        let store = store_with_job("fresh", u64::MAX / 2);
        let sweeper = StaleJobSweeper::new(
            Arc::new(store.clone()),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_purges_until_shutdown() {
        let store = store_with_job("old", 1);
        let sweeper = StaleJobSweeper::new(
            Arc::new(store.clone()),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(sweeper.run(rx));

        let deadline = time::Instant::now() + Duration::from_secs(5);
        while !store.is_empty() {
            assert!(time::Instant::now() < deadline, "stale job not purged");
            time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
