//! # Analytics
//!
//! On-demand summaries over the error history.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::history::ErrorHistory;
use crate::types::{ErrorCategory, ErrorRecord, Severity};

/// Placeholder until resolution tracking exists
pub const AVERAGE_RESOLUTION_TIME_SECS: u64 = 1800;

const TOP_ERRORS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    Excellent,
    Good,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeMetrics {
    /// Errors recorded in the last hour
    pub total_errors: usize,
    pub error_types: HashMap<ErrorCategory, usize>,
    pub critical_errors: usize,
    pub system_health: SystemHealth,
    pub top_errors: Vec<ErrorRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalytics {
    pub total_errors: usize,
    /// Distinct messages
    pub unique_errors: usize,
    pub critical_errors: usize,
    pub average_resolution_time_secs: u64,
    pub category_distribution: HashMap<ErrorCategory, usize>,
    pub severity_distribution: HashMap<Severity, usize>,
    pub generated_at: DateTime<Utc>,
}

fn health(critical: usize, total: usize) -> SystemHealth {
    if critical > 0 {
        SystemHealth::Critical
    } else if total > 10 {
        SystemHealth::Warning
    } else if total > 5 {
        SystemHealth::Good
    } else {
        SystemHealth::Excellent
    }
}

/// Snapshot of the last hour
pub fn get_real_time_metrics(history: &ErrorHistory) -> RealTimeMetrics {
    let recent: Vec<&ErrorRecord> = history.recent(Duration::hours(1)).collect();

    let mut error_types = HashMap::new();
    for record in &recent {
        *error_types.entry(record.category).or_insert(0) += 1;
    }
    let critical_errors = recent.iter().filter(|r| r.severity.is_critical()).count();

    // stable sort keeps insertion order within a severity
    let mut top: Vec<&ErrorRecord> = recent.clone();
    top.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
    let top_errors = top.into_iter().take(TOP_ERRORS).cloned().collect();

    RealTimeMetrics {
        total_errors: recent.len(),
        error_types,
        critical_errors,
        system_health: health(critical_errors, recent.len()),
        top_errors,
        timestamp: Utc::now(),
    }
}

/// Totals across the whole retained history
pub fn generate_error_analytics(history: &ErrorHistory) -> ErrorAnalytics {
    let mut category_distribution = HashMap::new();
    let mut severity_distribution = HashMap::new();
    let mut messages = HashSet::new();
    let mut critical_errors = 0;

    for record in history.iter() {
        *category_distribution.entry(record.category).or_insert(0) += 1;
        *severity_distribution.entry(record.severity).or_insert(0) += 1;
        messages.insert(record.message.as_str());
        if record.severity.is_critical() {
            critical_errors += 1;
        }
    }

    ErrorAnalytics {
        total_errors: history.len(),
        unique_errors: messages.len(),
        critical_errors,
        average_resolution_time_secs: AVERAGE_RESOLUTION_TIME_SECS,
        category_distribution,
        severity_distribution,
        generated_at: Utc::now(),
    }
}
