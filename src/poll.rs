//! Periodic refresh tasks.
//!
//! A [`PollTask`] fetches once immediately and then on a fixed interval,
//! publishing each result through a watch channel. The task belongs to
//! whoever spawned it and stops when cancelled or dropped.

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Latest state of a polled resource.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub loading: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            last_update: None,
            loading: true,
        }
    }
}

pub struct PollTask<T> {
    name: String,
    rx: watch::Receiver<Snapshot<T>>,
    handle: JoinHandle<()>,
}

impl<T> PollTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling `fetch` every `period`.
    ///
    /// A failed fetch records its error and keeps the previous data.
    pub fn spawn<F, Fut, E>(name: &str, period: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let (tx, rx) = watch::channel(Snapshot::default());
        let task_name = name.to_string();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Mark in-flight without waking subscribers.
                tx.send_if_modified(|s| {
                    s.loading = true;
                    false
                });

                match fetch().await {
                    Ok(data) => {
                        debug!("{} refreshed", task_name);
                        tx.send_modify(|s| {
                            s.data = Some(data);
                            s.error = None;
                            s.last_update = Some(Utc::now());
                            s.loading = false;
                        });
                    }
                    Err(e) => {
                        warn!("{} refresh failed: {}", task_name, e);
                        let message = e.to_string();
                        tx.send_modify(|s| {
                            s.error = Some(message);
                            s.loading = false;
                        });
                    }
                }

                if tx.is_closed() {
                    break;
                }
            }
        });

        Self {
            name: name.to_string(),
            rx,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next completed fetch. `None` once the task has stopped.
    pub async fn next_update(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop polling.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl<T> Drop for PollTask<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{sleep, timeout};

    fn counting_task(period: Duration) -> (PollTask<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let task = PollTask::spawn("counter", period, move || {
            let counter = counter.clone();
            async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        (task, calls)
    }

    #[test]
    fn test_default_snapshot_is_loading() {
        let snapshot: Snapshot<u8> = Snapshot::default();
        assert!(snapshot.loading);
        assert!(snapshot.data.is_none());
        assert!(snapshot.last_update.is_none());
    }

    #[tokio::test]
    async fn test_first_fetch_is_immediate() {
        let (mut task, _) = counting_task(Duration::from_secs(3600));

        let snapshot = timeout(Duration::from_secs(2), task.next_update())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.data, Some(1));
        assert!(snapshot.error.is_none());
        assert!(snapshot.last_update.is_some());
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_publishes_repeatedly() {
        let (mut task, _) = counting_task(Duration::from_millis(10));

        let mut last = 0;
        for _ in 0..3 {
            let snapshot = timeout(Duration::from_secs(2), task.next_update())
                .await
                .unwrap()
                .unwrap();
            let value = snapshot.data.unwrap();
            assert!(value > last);
            last = value;
        }
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut task = PollTask::spawn("flaky", Duration::from_millis(10), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("fresh".to_string())
                } else {
                    Err("backend unavailable")
                }
            }
        });

        let first = timeout(Duration::from_secs(2), task.next_update())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.data.as_deref(), Some("fresh"));

        let second = timeout(Duration::from_secs(2), task.next_update())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.data.as_deref(), Some("fresh"));
        assert_eq!(second.error.as_deref(), Some("backend unavailable"));
    }

    #[tokio::test]
    async fn test_stops_on_drop() {
        let (mut task, calls) = counting_task(Duration::from_millis(10));
        timeout(Duration::from_secs(2), task.next_update())
            .await
            .unwrap()
            .unwrap();
        drop(task);

        sleep(Duration::from_millis(50)).await;
        let after_drop = calls.load(Ordering::SeqCst);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (mut task, _) = counting_task(Duration::from_millis(10));
        timeout(Duration::from_secs(2), task.next_update())
            .await
            .unwrap()
            .unwrap();

        task.cancel();
        let after_cancel = timeout(Duration::from_secs(2), async {
            while task.next_update().await.is_some() {}
        })
        .await;
        assert!(after_cancel.is_ok());
        assert_eq!(task.name(), "counter");
    }
}
