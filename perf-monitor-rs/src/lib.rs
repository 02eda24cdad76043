//! # Performance Monitor
//!
//! Derives named metrics from navigation, resource, paint, long-task and
//! layout-shift timing entries, keeps them in a bounded buffer and posts
//! periodic batch reports with a computed summary.

pub mod buffer;
pub mod config;
pub mod error;
pub mod monitor;
pub mod observer;
pub mod types;

pub use buffer::MetricsBuffer;
pub use config::PerformanceConfig;
pub use error::{PerfMonitorError, Result};
pub use monitor::{HeapStatsProvider, PerformanceMonitor};
pub use types::{
    EntryKind, HeapStats, MetricCategory, MetricUnit, NavigationTiming, PerformanceEntry, PerformanceMetric,
    PerformanceReport, ReportSummary, ResourceTiming,
};

/// Builds a monitor from the environment and starts its background loops
pub fn init() -> Result<std::sync::Arc<PerformanceMonitor>> {
    let monitor = std::sync::Arc::new(PerformanceMonitor::new(PerformanceConfig::from_env()?)?);
    monitor.start();
    Ok(monitor)
}
