//! # Performance Monitor
//!
//! Buffers metrics derived from observed timing entries, samples heap usage
//! and periodically posts a batch report. Background loops listen on a
//! broadcast shutdown channel so [`PerformanceMonitor::shutdown`] stops them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::buffer::MetricsBuffer;
use crate::config::PerformanceConfig;
use crate::error::{PerfMonitorError, Result};
use crate::observer::{metrics_for_entry, metrics_for_heap};
use crate::types::{
    EntryKind, HeapStats, MetricCategory, MetricUnit, PerformanceEntry, PerformanceMetric, PerformanceReport,
    ReportSummary,
};

/// Source of heap statistics; absent on runtimes that don't expose them
pub trait HeapStatsProvider: Send + Sync {
    fn heap_stats(&self) -> Option<HeapStats>;
}

impl<F> HeapStatsProvider for F
where
    F: Fn() -> Option<HeapStats> + Send + Sync,
{
    fn heap_stats(&self) -> Option<HeapStats> {
        self()
    }
}

pub struct PerformanceMonitor {
    config: PerformanceConfig,
    page_url: String,
    user_agent: String,
    supported: HashSet<EntryKind>,
    heap: Option<Arc<dyn HeapStatsProvider>>,
    buffer: Mutex<MetricsBuffer>,
    client: reqwest::Client,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("config", &self.config)
            .field("page_url", &self.page_url)
            .field("supported", &self.supported)
            .field("heap", &self.heap.is_some())
            .finish()
    }
}

impl PerformanceMonitor {
    pub fn new(config: PerformanceConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PerfMonitorError::Http(e.to_string()))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            buffer: Mutex::new(MetricsBuffer::new(config.buffer_capacity)),
            config,
            page_url: String::new(),
            user_agent: String::new(),
            supported: EntryKind::ALL.into_iter().collect(),
            heap: None,
            client,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn with_page<U: Into<String>, A: Into<String>>(mut self, url: U, user_agent: A) -> Self {
        self.page_url = url.into();
        self.user_agent = user_agent.into();
        self
    }

    /// Entry kinds the host can observe; everything else is ignored
    pub fn with_supported_entries<I: IntoIterator<Item = EntryKind>>(mut self, kinds: I) -> Self {
        self.supported = kinds.into_iter().collect();
        self
    }

    pub fn with_heap_stats(mut self, provider: Arc<dyn HeapStatsProvider>) -> Self {
        self.heap = Some(provider);
        self
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    pub fn supports(&self, kind: EntryKind) -> bool {
        self.supported.contains(&kind)
    }

    pub fn observe(&self, entry: &PerformanceEntry) {
        if !self.config.enabled {
            return;
        }
        if !self.supports(entry.kind()) {
            debug!(kind = ?entry.kind(), "Ignoring unsupported performance entry");
            return;
        }
        self.push_all(metrics_for_entry(entry));
    }

    pub fn record_custom<S: Into<String>>(&self, name: S, value: f64, unit: MetricUnit, params: Map<String, Value>) {
        if !self.config.enabled {
            return;
        }
        let metric = PerformanceMetric::new(name, value, unit, MetricCategory::Custom).with_custom(params);
        self.push_all(vec![metric]);
    }

    /// Takes one heap sample; false when no stats are available
    pub fn sample_memory(&self) -> bool {
        let stats = match self.heap.as_ref().and_then(|provider| provider.heap_stats()) {
            Some(stats) => stats,
            None => return false,
        };
        self.push_all(metrics_for_heap(&stats));
        true
    }

    fn push_all(&self, metrics: Vec<PerformanceMetric>) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        for mut metric in metrics {
            metric.url = self.page_url.clone();
            buffer.push(metric);
        }
    }

    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
    }

    pub fn clear_metrics(&self) {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn build_report(&self) -> PerformanceReport {
        let metrics = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last(self.config.report_batch);
        let summary = summarize(&metrics, self.config.slow_resource_threshold_ms);

        PerformanceReport {
            timestamp: Utc::now(),
            url: self.page_url.clone(),
            user_agent: self.user_agent.clone(),
            metrics,
            summary,
        }
    }

    /// Posts a report and keeps only the most recent metrics on success
    pub async fn flush(&self) -> Result<()> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| PerfMonitorError::Config("no performance endpoint configured".to_string()))?;

        let report = self.build_report();
        if report.metrics.is_empty() {
            debug!("No performance metrics to report");
            return Ok(());
        }
        let body = serde_json::to_vec(&report)?;

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PerfMonitorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PerfMonitorError::Http(format!(
                "Performance endpoint returned status: {}",
                response.status()
            )));
        }

        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .truncate_to_last(self.config.retain_after_report);
        info!(metrics = report.metrics.len(), "Sent performance report");
        Ok(())
    }

    /// Spawns the report loop and the heap sampler where they apply
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            return;
        }

        if self.config.reporting_active() {
            let monitor = Arc::clone(self);
            self.spawn_every(self.config.report_interval, move || {
                let monitor = Arc::clone(&monitor);
                async move {
                    if let Err(e) = monitor.flush().await {
                        warn!(error = %e, "Performance report failed");
                    }
                }
            });
        }

        if self.heap.is_some() {
            let monitor = Arc::clone(self);
            self.spawn_every(self.config.memory_sample_interval, move || {
                let monitor = Arc::clone(&monitor);
                async move {
                    monitor.sample_memory();
                }
            });
        }
    }

    // Mirrors `TaskScheduler::spawn_periodic` in error-intelligence-rs:
    // first tick after one period, exits on the shutdown broadcast.
    // Keep the two in step.
    fn spawn_every<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).push(handle);
    }

    pub fn running_tasks(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        match tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(handles)).await {
            Ok(_) => debug!(tasks = count, "Performance monitor stopped"),
            Err(_) => warn!(tasks = count, "Timed out waiting for performance monitor tasks"),
        }
    }
}

fn summarize(metrics: &[PerformanceMetric], slow_threshold_ms: f64) -> ReportSummary {
    let loads: Vec<f64> = metrics
        .iter()
        .filter(|m| m.name == "load_complete")
        .map(|m| m.value)
        .collect();
    let average_load_time = if loads.is_empty() {
        0.0
    } else {
        loads.iter().sum::<f64>() / loads.len() as f64
    };

    ReportSummary {
        average_load_time,
        slow_resources: metrics
            .iter()
            .filter(|m| m.name == "resource_duration" && m.value > slow_threshold_ms)
            .count(),
        long_tasks: metrics
            .iter()
            .filter(|m| m.category == MetricCategory::Longtask)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NavigationTiming, ResourceTiming};
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resource(duration: f64) -> PerformanceEntry {
        PerformanceEntry::Resource(ResourceTiming {
            name: "https://cdn.example.com/lesson.mp4".to_string(),
            initiator_type: "video".to_string(),
            duration,
            transfer_size: 0,
        })
    }

    fn load(load_event_end: f64) -> PerformanceEntry {
        PerformanceEntry::Navigation(NavigationTiming {
            load_event_end,
            ..NavigationTiming::default()
        })
    }

    fn monitor(config: PerformanceConfig) -> PerformanceMonitor {
        PerformanceMonitor::new(config)
            .unwrap()
            .with_page("https://learn.example.com/courses/1", "Mozilla/5.0")
    }

    #[test]
    fn test_observe_tags_page_url() {
        let monitor = monitor(PerformanceConfig::default());
        monitor.observe(&resource(120.0));

        let metrics = monitor.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].url, "https://learn.example.com/courses/1");
    }

    #[test]
    fn test_unsupported_entries_ignored() {
        let monitor =
            monitor(PerformanceConfig::default()).with_supported_entries([EntryKind::Navigation, EntryKind::Paint]);
        monitor.observe(&resource(120.0));
        monitor.observe(&PerformanceEntry::LongTask {
            name: "self".to_string(),
            duration: 80.0,
        });
        assert!(monitor.metrics().is_empty());

        monitor.observe(&load(900.0));
        assert_eq!(monitor.metrics().len(), 7);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let monitor = monitor(PerformanceConfig {
            enabled: false,
            ..PerformanceConfig::default()
        });
        monitor.observe(&resource(120.0));
        monitor.record_custom("quiz_render", 40.0, MetricUnit::Ms, Map::new());
        assert!(monitor.metrics().is_empty());
    }

    #[test]
    fn test_record_custom_and_clear() {
        let monitor = monitor(PerformanceConfig::default());
        let mut params = Map::new();
        params.insert("lessonId".to_string(), Value::from("l-12"));
        monitor.record_custom("video_start", 350.0, MetricUnit::Ms, params);

        let metrics = monitor.metrics();
        assert_eq!(metrics[0].category, MetricCategory::Custom);
        assert_eq!(metrics[0].custom["lessonId"], "l-12");

        monitor.clear_metrics();
        assert!(monitor.metrics().is_empty());
    }

    #[test]
    fn test_report_summary() {
        let monitor = monitor(PerformanceConfig::default());
        monitor.observe(&load(1000.0));
        monitor.observe(&load(2000.0));
        monitor.observe(&resource(1500.0));
        monitor.observe(&resource(1000.0));
        monitor.observe(&PerformanceEntry::LongTask {
            name: "self".to_string(),
            duration: 95.0,
        });

        let report = monitor.build_report();
        assert_eq!(report.summary.average_load_time, 1500.0);
        assert_eq!(report.summary.slow_resources, 1);
        assert_eq!(report.summary.long_tasks, 1);
        assert_eq!(report.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn test_report_limited_to_recent_batch() {
        let monitor = monitor(PerformanceConfig::default());
        for i in 0..150 {
            monitor.record_custom(format!("m{}", i), i as f64, MetricUnit::Count, Map::new());
        }
        let report = monitor.build_report();
        assert_eq!(report.metrics.len(), 100);
        assert_eq!(report.metrics[0].name, "m50");
    }

    #[test]
    fn test_memory_sample_requires_provider() {
        let monitor = monitor(PerformanceConfig::default());
        assert!(!monitor.sample_memory());

        let provider = || {
            Some(HeapStats {
                used: 10,
                total: 20,
                limit: 40,
            })
        };
        let monitor = monitor.with_heap_stats(Arc::new(provider));
        assert!(monitor.sample_memory());
        assert_eq!(monitor.metrics().len(), 3);
    }

    #[tokio::test]
    async fn test_flush_posts_and_truncates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/perf"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let monitor = monitor(PerformanceConfig {
            endpoint: Some(format!("{}/perf", mock_server.uri())),
            ..PerformanceConfig::default()
        });
        for i in 0..120 {
            monitor.record_custom(format!("m{}", i), i as f64, MetricUnit::Count, Map::new());
        }

        assert_ok!(monitor.flush().await);

        let remaining = monitor.metrics();
        assert_eq!(remaining.len(), 50);
        assert_eq!(remaining[0].name, "m70");

        let requests = mock_server.received_requests().await.unwrap();
        let posted: PerformanceReport = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(posted.metrics.len(), 100);
        assert_eq!(posted.url, "https://learn.example.com/courses/1");
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_buffer() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let monitor = monitor(PerformanceConfig {
            endpoint: Some(mock_server.uri()),
            ..PerformanceConfig::default()
        });
        for i in 0..80 {
            monitor.record_custom(format!("m{}", i), i as f64, MetricUnit::Count, Map::new());
        }

        assert_err!(monitor.flush().await);
        assert_eq!(monitor.metrics().len(), 80);
    }

    #[tokio::test]
    async fn test_flush_without_endpoint() {
        let monitor = monitor(PerformanceConfig::default());
        monitor.observe(&resource(10.0));
        assert!(matches!(monitor.flush().await, Err(PerfMonitorError::Config(_))));
    }

    #[tokio::test]
    async fn test_report_loop_runs_in_production() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let monitor = Arc::new(monitor(PerformanceConfig {
            endpoint: Some(mock_server.uri()),
            environment: "production".to_string(),
            report_interval: Duration::from_millis(20),
            ..PerformanceConfig::default()
        }));
        monitor.observe(&load(800.0));
        monitor.start();
        assert_eq!(monitor.running_tasks(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        monitor.shutdown().await;

        assert!(!mock_server.received_requests().await.unwrap().is_empty());
        assert_eq!(monitor.running_tasks(), 0);
    }

    #[tokio::test]
    async fn test_no_report_loop_outside_production() {
        let monitor = Arc::new(monitor(PerformanceConfig {
            endpoint: Some("https://metrics.example.com/perf".to_string()),
            ..PerformanceConfig::default()
        }));
        monitor.start();
        assert_eq!(monitor.running_tasks(), 0);
    }

    #[tokio::test]
    async fn test_sampler_stops_on_shutdown() {
        let provider = || {
            Some(HeapStats {
                used: 1,
                total: 2,
                limit: 4,
            })
        };
        let monitor = Arc::new(
            monitor(PerformanceConfig {
                memory_sample_interval: Duration::from_millis(10),
                ..PerformanceConfig::default()
            })
            .with_heap_stats(Arc::new(provider)),
        );
        monitor.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.shutdown().await;
        let sampled = monitor.metrics().len();
        assert!(sampled >= 3);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(monitor.metrics().len(), sampled);
    }
}
