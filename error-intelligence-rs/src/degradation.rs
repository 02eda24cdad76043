//! # Degraded Modes
//!
//! Flags raised by the `fallback` and `graceful_degradation` remediations.
//! Nothing here swaps UI; the host reads the active modes and decides what
//! to render or switch off.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::ErrorCategory;

/// Mode raised by graceful degradation
pub const NON_ESSENTIAL_FEATURES: &str = "non_essential_features";

/// Mode name asking the host to render fallback UI for a category
pub fn fallback_ui_mode(category: ErrorCategory) -> String {
    format!("fallback_ui:{}", category.as_str())
}

/// Severity of degraded mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradedSeverity {
    /// Minor degradation, most functionality works
    Minor,
    /// Moderate degradation, core functionality works
    Moderate,
    /// Severe degradation, limited functionality
    Severe,
}

#[derive(Debug, Clone)]
struct DegradedModeInfo {
    active: bool,
    activated_at: Instant,
    reason: String,
    severity: DegradedSeverity,
}

/// Snapshot of one mode as returned by [`DegradedMode::get_info`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedModeStatus {
    pub active: bool,
    pub reason: String,
    pub severity: DegradedSeverity,
    pub active_for: Duration,
}

#[derive(Debug, Default)]
pub struct DegradedMode {
    modes: RwLock<HashMap<String, DegradedModeInfo>>,
}

impl DegradedMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate<S1, S2>(&self, mode: S1, reason: S2, severity: DegradedSeverity)
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let mode = mode.into();
        let reason = reason.into();

        warn!(mode = %mode, reason = %reason, severity = ?severity, "Activated degraded mode");
        counter!("error_intelligence.degraded.activations", 1, "mode" => mode.clone());

        let mut modes = self.modes.write().unwrap_or_else(PoisonError::into_inner);
        modes.insert(
            mode,
            DegradedModeInfo {
                active: true,
                activated_at: Instant::now(),
                reason,
                severity,
            },
        );
    }

    pub fn deactivate(&self, mode: &str) {
        let mut modes = self.modes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = modes.get_mut(mode) {
            if info.active {
                info.active = false;
                let duration = info.activated_at.elapsed();
                info!(mode = %mode, duration_secs = duration.as_secs(), "Deactivated degraded mode");
                gauge!("error_intelligence.degraded.duration_secs", duration.as_secs_f64(), "mode" => mode.to_string());
            }
        }
    }

    pub fn is_active(&self, mode: &str) -> bool {
        let modes = self.modes.read().unwrap_or_else(PoisonError::into_inner);
        modes.get(mode).map(|info| info.active).unwrap_or(false)
    }

    pub fn get_info(&self, mode: &str) -> Option<DegradedModeStatus> {
        let modes = self.modes.read().unwrap_or_else(PoisonError::into_inner);
        modes.get(mode).map(|info| DegradedModeStatus {
            active: info.active,
            reason: info.reason.clone(),
            severity: info.severity,
            active_for: info.activated_at.elapsed(),
        })
    }

    /// Active mode names, sorted
    pub fn active_modes(&self) -> Vec<String> {
        let modes = self.modes.read().unwrap_or_else(PoisonError::into_inner);
        let mut active: Vec<String> = modes
            .iter()
            .filter(|(_, info)| info.active)
            .map(|(name, _)| name.clone())
            .collect();
        active.sort();
        active
    }
}
