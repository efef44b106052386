use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use dukaan_core::repository::VisitRepository;
use dukaan_core::StoreError;
use dukaan_shared::models::events::VisitEvent;

use crate::metrics::Metrics;

/// Drains the tracking queue into the visit store.
///
/// Requests never wait on this: the track endpoint only enqueues. Transient
/// storage failures are retried with a fixed delay, anything else drops the
/// event.
pub struct TrackingWorker {
    rx: mpsc::Receiver<VisitEvent>,
    visits: Arc<dyn VisitRepository>,
    metrics: Arc<Metrics>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl TrackingWorker {
    pub fn new(
        rx: mpsc::Receiver<VisitEvent>,
        visits: Arc<dyn VisitRepository>,
        metrics: Arc<Metrics>,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            rx,
            visits,
            metrics,
            max_attempts,
            retry_delay,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) {
        info!("Tracking worker started");
        while let Some(visit) = self.rx.recv().await {
            match self.persist(&visit).await {
                Ok(()) => {
                    self.metrics.tracking("persisted");
                    debug!("Visit stored: {} {}", visit.event_type, visit.path);
                }
                Err(e) => {
                    self.metrics.tracking("failed");
                    error!("Dropping visit {}: {}", visit.id, e);
                }
            }
        }
        info!("Tracking worker stopped");
    }

    async fn persist(&self, visit: &VisitEvent) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            match self.visits.record(visit).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!("Visit write failed (attempt {}/{}): {}", attempt, self.max_attempts, e);
                    attempt += 1;
                    sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use dukaan_core::repository::StoreResult;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Fails the first `failures` writes with the given error.
    struct FlakyVisits {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
        stored: Mutex<Vec<Uuid>>,
    }

    impl FlakyVisits {
        fn new(failures: u32, transient: bool) -> Arc<Self> {
            Arc::new(Self {
                failures,
                transient,
                calls: AtomicU32::new(0),
                stored: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VisitRepository for FlakyVisits {
        async fn record(&self, visit: &VisitEvent) -> StoreResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.transient {
                    StoreError::Unavailable("connection reset".into())
                } else {
                    StoreError::Constraint("visits_path_check".into())
                });
            }
            self.stored.lock().unwrap().push(visit.id);
            Ok(())
        }

        async fn list_between(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>> {
            Ok(Vec::new())
        }
    }

    fn visit() -> VisitEvent {
        VisitEvent {
            id: Uuid::new_v4(),
            session_id: "session-1234".to_string(),
            event_type: "page_view".to_string(),
            path: "/".to_string(),
            referrer: None,
            product_id: None,
            bundle_id: None,
            ip_hash: None,
            user_agent: None,
            occurred_at: Utc::now(),
        }
    }

    async fn drain(store: Arc<FlakyVisits>, events: Vec<VisitEvent>) -> Arc<Metrics> {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (tx, rx) = mpsc::channel(8);
        let worker = TrackingWorker::new(rx, store, metrics.clone(), 3, Duration::from_millis(1));
        let handle = worker.spawn();
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();
        metrics
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = FlakyVisits::new(2, true);
        let event = visit();
        let metrics = drain(store.clone(), vec![event.clone()]).await;

        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*store.stored.lock().unwrap(), vec![event.id]);
        assert_eq!(metrics.tracking_events.with_label_values(&["persisted"]).get(), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = FlakyVisits::new(1, false);
        let metrics = drain(store.clone(), vec![visit(), visit()]).await;

        // first event dropped after one attempt, second stored
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stored.lock().unwrap().len(), 1);
        assert_eq!(metrics.tracking_events.with_label_values(&["failed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = FlakyVisits::new(10, true);
        drain(store.clone(), vec![visit()]).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert!(store.stored.lock().unwrap().is_empty());
    }
}
