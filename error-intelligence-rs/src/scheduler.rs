//! # Task Scheduler
//!
//! Owns every delayed or periodic task the pipeline spawns so they can be
//! cancelled together on shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct TaskScheduler {
    name: String,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_timeout: Duration,
    closed: AtomicBool,
}

impl TaskScheduler {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            name: name.into(),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            shutdown_timeout: Duration::from_secs(5),
            closed: AtomicBool::new(false),
        }
    }

    /// A receiver that fires once when [`TaskScheduler::shutdown`] is called
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Runs `task` after `delay` unless shutdown happens first
    pub fn schedule_after<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.recv() => {}
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
        self.track(handle);
    }

    /// Calls `tick` every `period` (first call after one period) until shutdown
    pub fn spawn_periodic<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });
        self.track(handle);
    }

    /// Number of spawned tasks that have not finished
    pub fn pending(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Signals every task to stop and waits for them, bounded by a timeout
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.drain(..).collect()
        };

        if tasks.is_empty() {
            return;
        }

        info!(scheduler = %self.name, task_count = tasks.len(), "Cancelling scheduled tasks");
        if timeout(self.shutdown_timeout, futures::future::join_all(tasks)).await.is_err() {
            warn!(
                scheduler = %self.name,
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Shutdown timed out waiting for tasks"
            );
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn track(&self, handle: JoinHandle<()>) {
        if self.is_shut_down() {
            handle.abort();
            debug!(scheduler = %self.name, "Scheduler is shut down, task dropped");
            return;
        }
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
        debug!(scheduler = %self.name, pending = tasks.len(), "Task scheduled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_delayed_task_runs() {
        let scheduler = TaskScheduler::new("test");
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();

        scheduler.schedule_after(Duration::from_millis(5), async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_tasks() {
        let scheduler = TaskScheduler::new("test");
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();

        scheduler.schedule_after(Duration::from_secs(60), async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(scheduler.pending(), 1);

        scheduler.shutdown().await;
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_shut_down());
    }

    #[tokio::test]
    async fn test_periodic_ticks_until_shutdown() {
        let scheduler = TaskScheduler::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        scheduler.spawn_periodic(Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
