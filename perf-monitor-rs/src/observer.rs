//! Turns observed timing entries and heap samples into named metrics.

use serde_json::{json, Map};

use crate::types::{HeapStats, MetricCategory, MetricUnit, PerformanceEntry, PerformanceMetric};

pub fn metrics_for_entry(entry: &PerformanceEntry) -> Vec<PerformanceMetric> {
    match entry {
        PerformanceEntry::Navigation(nav) => {
            let timings = [
                ("dns_lookup", nav.domain_lookup_end - nav.domain_lookup_start),
                ("tcp_connection", nav.connect_end - nav.connect_start),
                ("ttfb", nav.response_start - nav.request_start),
                ("response_time", nav.response_end - nav.response_start),
                ("dom_interactive", nav.dom_interactive - nav.fetch_start),
                ("dom_content_loaded", nav.dom_content_loaded_event_end - nav.fetch_start),
                ("load_complete", nav.load_event_end - nav.fetch_start),
            ];
            timings
                .into_iter()
                .map(|(name, value)| PerformanceMetric::new(name, value, MetricUnit::Ms, MetricCategory::Navigation))
                .collect()
        }
        PerformanceEntry::Resource(resource) => {
            let mut custom = Map::new();
            custom.insert("name".to_string(), json!(resource.name));
            custom.insert("initiatorType".to_string(), json!(resource.initiator_type));

            let mut metrics = vec![PerformanceMetric::new(
                "resource_duration",
                resource.duration,
                MetricUnit::Ms,
                MetricCategory::Resource,
            )
            .with_custom(custom.clone())];
            if resource.transfer_size > 0 {
                metrics.push(
                    PerformanceMetric::new(
                        "resource_size",
                        resource.transfer_size as f64,
                        MetricUnit::Bytes,
                        MetricCategory::Resource,
                    )
                    .with_custom(custom),
                );
            }
            metrics
        }
        PerformanceEntry::Paint { name, start_time } => {
            vec![PerformanceMetric::new(name.as_str(), *start_time, MetricUnit::Ms, MetricCategory::Paint)]
        }
        PerformanceEntry::LongTask { name, duration } => {
            let mut custom = Map::new();
            custom.insert("name".to_string(), json!(name));
            vec![PerformanceMetric::new("long_task", *duration, MetricUnit::Ms, MetricCategory::Longtask)
                .with_custom(custom)]
        }
        PerformanceEntry::LayoutShift { value, had_recent_input } => {
            if *had_recent_input {
                Vec::new()
            } else {
                vec![PerformanceMetric::new("layout_shift", *value, MetricUnit::Count, MetricCategory::Custom)]
            }
        }
    }
}

pub fn metrics_for_heap(stats: &HeapStats) -> Vec<PerformanceMetric> {
    let mut metrics = vec![
        PerformanceMetric::new("memory_used", stats.used as f64, MetricUnit::Bytes, MetricCategory::Custom),
        PerformanceMetric::new("memory_total", stats.total as f64, MetricUnit::Bytes, MetricCategory::Custom),
    ];
    if stats.limit > 0 {
        let usage = stats.used as f64 / stats.limit as f64 * 100.0;
        metrics.push(PerformanceMetric::new(
            "memory_usage",
            usage,
            MetricUnit::Percentage,
            MetricCategory::Custom,
        ));
    }
    metrics
}
