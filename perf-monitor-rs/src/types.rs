//! Metric and timing-entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    Ms,
    Bytes,
    Count,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Navigation,
    Resource,
    Paint,
    Longtask,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub category: MetricCategory,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl PerformanceMetric {
    pub fn new<S: Into<String>>(name: S, value: f64, unit: MetricUnit, category: MetricCategory) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            category,
            timestamp: Utc::now(),
            url: String::new(),
            custom: Map::new(),
        }
    }

    pub fn with_custom(mut self, custom: Map<String, Value>) -> Self {
        self.custom = custom;
        self
    }
}

/// Offsets in milliseconds from the start of the navigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub fetch_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
    pub name: String,
    pub initiator_type: String,
    pub duration: f64,
    /// Zero for cached or cross-origin resources
    pub transfer_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PerformanceEntry {
    Navigation(NavigationTiming),
    Resource(ResourceTiming),
    Paint { name: String, start_time: f64 },
    #[serde(rename = "longtask")]
    LongTask { name: String, duration: f64 },
    LayoutShift { value: f64, had_recent_input: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Navigation,
    Resource,
    Paint,
    #[serde(rename = "longtask")]
    LongTask,
    LayoutShift,
}

impl EntryKind {
    pub const ALL: [EntryKind; 5] = [
        EntryKind::Navigation,
        EntryKind::Resource,
        EntryKind::Paint,
        EntryKind::LongTask,
        EntryKind::LayoutShift,
    ];
}

impl PerformanceEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            PerformanceEntry::Navigation(_) => EntryKind::Navigation,
            PerformanceEntry::Resource(_) => EntryKind::Resource,
            PerformanceEntry::Paint { .. } => EntryKind::Paint,
            PerformanceEntry::LongTask { .. } => EntryKind::LongTask,
            PerformanceEntry::LayoutShift { .. } => EntryKind::LayoutShift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapStats {
    pub used: u64,
    pub total: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub average_load_time: f64,
    pub slow_resources: usize,
    pub long_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub user_agent: String,
    pub metrics: Vec<PerformanceMetric>,
    pub summary: ReportSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_fields_are_camel_case() {
        let paint = PerformanceEntry::Paint {
            name: "first-paint".to_string(),
            start_time: 412.0,
        };
        assert_eq!(
            serde_json::to_value(&paint).unwrap(),
            json!({ "entryType": "paint", "name": "first-paint", "startTime": 412.0 })
        );

        let shift: PerformanceEntry =
            serde_json::from_value(json!({ "entryType": "layout-shift", "value": 0.2, "hadRecentInput": true }))
                .unwrap();
        assert_eq!(
            shift,
            PerformanceEntry::LayoutShift {
                value: 0.2,
                had_recent_input: true
            }
        );
    }

    #[test]
    fn test_navigation_entry_is_tagged() {
        let nav = PerformanceEntry::Navigation(NavigationTiming {
            load_event_end: 900.0,
            ..NavigationTiming::default()
        });
        let value = serde_json::to_value(&nav).unwrap();
        assert_eq!(value["entryType"], "navigation");
        assert_eq!(value["loadEventEnd"], 900.0);
    }
}
