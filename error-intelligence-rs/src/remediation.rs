//! # Automated Remediation
//!
//! A registry of rule-triggered actions. Every stored error is matched
//! against the active actions; matching ones run in registration order and
//! their failures are recorded on the action, never returned to the caller.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::degradation::{fallback_ui_mode, DegradedMode, DegradedSeverity, NON_ESSENTIAL_FEATURES};
use crate::notification::NotificationDispatcher;
use crate::retry::{RecoveryOperation, RetryPolicy, RetryResult};
use crate::types::{panic_message, ErrorCategory, ErrorRecord, IntelligenceError, Result, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
    Retry,
    Fallback,
    CircuitBreaker,
    GracefulDegradation,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationStatus {
    Active,
    Paused,
    Failed,
    /// Retired by an operator, never triggers again
    Completed,
}

/// Extra conditions beyond the trigger key; empty means always
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConditions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severities: Vec<Severity>,
    /// Minimum same-category records in the last hour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_recent_count: Option<usize>,
}

impl TriggerConditions {
    pub fn severities(severities: &[Severity]) -> Self {
        Self {
            severities: severities.to_vec(),
            min_recent_count: None,
        }
    }

    pub fn min_recent(count: usize) -> Self {
        Self {
            severities: Vec::new(),
            min_recent_count: Some(count),
        }
    }

    fn matches(&self, severity: Severity, recent_in_category: usize) -> bool {
        let severity_ok = self.severities.is_empty() || self.severities.contains(&severity);
        let count_ok = self.min_recent_count.map_or(true, |min| recent_in_category >= min);
        severity_ok && count_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationAction {
    pub id: String,
    /// Category key this action listens for, e.g. `network_error`
    pub trigger: String,
    #[serde(rename = "type")]
    pub kind: RemediationKind,
    pub conditions: TriggerConditions,
    pub implementation: String,
    pub rollback_plan: String,
    pub status: RemediationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
    pub success_rate: f64,
}

impl RemediationAction {
    pub fn new<S: Into<String>>(id: S, category: ErrorCategory, kind: RemediationKind) -> Self {
        Self {
            id: id.into(),
            trigger: category.trigger_key(),
            kind,
            conditions: TriggerConditions::default(),
            implementation: String::new(),
            rollback_plan: String::new(),
            status: RemediationStatus::Active,
            last_executed: None,
            success_rate: 1.0,
        }
    }

    pub fn with_conditions(mut self, conditions: TriggerConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_plan<S1: Into<String>, S2: Into<String>>(mut self, implementation: S1, rollback: S2) -> Self {
        self.implementation = implementation.into();
        self.rollback_plan = rollback.into();
        self
    }

    fn triggers_on(&self, record: &ErrorRecord, recent_in_category: usize) -> bool {
        self.status == RemediationStatus::Active
            && self.trigger == record.category.trigger_key()
            && self.conditions.matches(record.severity, recent_in_category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationResult {
    Succeeded,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub action_id: String,
    pub kind: RemediationKind,
    pub result: RemediationResult,
}

/// The actions registered on every engine
pub fn default_actions() -> Vec<RemediationAction> {
    vec![
        RemediationAction::new("network-retry", ErrorCategory::Network, RemediationKind::Retry)
            .with_conditions(TriggerConditions::severities(&[Severity::Low, Severity::Medium]))
            .with_plan(
                "Re-run the failed request with exponential backoff",
                "Surface the original error to the user",
            ),
        RemediationAction::new("api-circuit-breaker", ErrorCategory::Api, RemediationKind::CircuitBreaker)
            .with_conditions(TriggerConditions::min_recent(5))
            .with_plan(
                "Open the API circuit and serve cached responses",
                "Close the circuit once probes succeed",
            ),
        RemediationAction::new("rendering-fallback", ErrorCategory::Rendering, RemediationKind::Fallback)
            .with_conditions(TriggerConditions::severities(&[
                Severity::High,
                Severity::Critical,
                Severity::Fatal,
            ]))
            .with_plan("Render the simplified fallback view", "Restore the full view on reload"),
        RemediationAction::new(
            "performance-degradation",
            ErrorCategory::Performance,
            RemediationKind::GracefulDegradation,
        )
        .with_conditions(TriggerConditions::severities(&[
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]))
        .with_plan("Disable non-essential features", "Re-enable features when performance recovers"),
        RemediationAction::new("assessment-escalation", ErrorCategory::Assessment, RemediationKind::Notification)
            .with_conditions(TriggerConditions::severities(&[
                Severity::High,
                Severity::Critical,
                Severity::Fatal,
            ]))
            .with_plan("Notify the assessment team", "None"),
        RemediationAction::new("security-escalation", ErrorCategory::Security, RemediationKind::Notification)
            .with_plan("Notify the security team", "None"),
    ]
}

enum Execution {
    Done,
    Skipped(String),
}

pub struct RemediationEngine {
    actions: RwLock<Vec<RemediationAction>>,
    circuit_breaker: Arc<CircuitBreaker>,
    degraded: Arc<DegradedMode>,
    retry: RetryPolicy,
    notifier: Arc<NotificationDispatcher>,
}

impl std::fmt::Debug for RemediationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationEngine")
            .field("actions", &self.actions().len())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RemediationEngine {
    pub fn new(
        retry: RetryPolicy,
        circuit_breaker: Arc<CircuitBreaker>,
        degraded: Arc<DegradedMode>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            actions: RwLock::new(default_actions()),
            circuit_breaker,
            degraded,
            retry,
            notifier,
        }
    }

    /// Adds or replaces an action by id
    pub fn register(&self, action: RemediationAction) {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
    }

    pub fn actions(&self) -> Vec<RemediationAction> {
        self.actions.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn action(&self, id: &str) -> Option<RemediationAction> {
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
        actions.iter().find(|a| a.id == id).cloned()
    }

    pub fn pause(&self, id: &str) -> bool {
        self.set_status(id, RemediationStatus::Paused)
    }

    /// Re-activates a paused or failed action
    pub fn resume(&self, id: &str) -> bool {
        match self.action(id) {
            Some(action) if action.status != RemediationStatus::Completed => {
                self.set_status(id, RemediationStatus::Active)
            }
            _ => false,
        }
    }

    pub fn complete(&self, id: &str) -> bool {
        self.set_status(id, RemediationStatus::Completed)
    }

    fn set_status(&self, id: &str, status: RemediationStatus) -> bool {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        match actions.iter_mut().find(|a| a.id == id) {
            Some(action) => {
                info!(action = %id, status = ?status, "Remediation status changed");
                action.status = status;
                true
            }
            None => false,
        }
    }

    /// Runs every action triggered by `record`.
    ///
    /// `recent_in_category` is the number of same-category records stored in
    /// the last hour, including `record` itself.
    pub async fn apply_remediation(
        &self,
        record: &ErrorRecord,
        recent_in_category: usize,
        recovery: Option<RecoveryOperation>,
    ) -> Vec<RemediationOutcome> {
        let triggered: Vec<RemediationAction> = {
            let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
            actions
                .iter()
                .filter(|a| a.triggers_on(record, recent_in_category))
                .cloned()
                .collect()
        };

        let mut outcomes = Vec::with_capacity(triggered.len());
        for action in triggered {
            debug!(action = %action.id, error_id = %record.id, "Executing remediation");
            let execution = AssertUnwindSafe(self.execute(&action, record, recovery.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(IntelligenceError::Remediation {
                        action: action.id.clone(),
                        reason: format!("panicked: {}", panic_message(payload.as_ref())),
                    })
                });
            let result = match execution {
                Ok(Execution::Done) => {
                    self.record_execution(&action.id, true);
                    counter!("error_intelligence.remediation.executed", 1, "action" => action.id.clone());
                    RemediationResult::Succeeded
                }
                Ok(Execution::Skipped(reason)) => {
                    debug!(action = %action.id, reason = %reason, "Remediation skipped");
                    RemediationResult::Skipped(reason)
                }
                Err(e) => {
                    self.record_execution(&action.id, false);
                    counter!("error_intelligence.remediation.failed", 1, "action" => action.id.clone());
                    warn!(action = %action.id, error_id = %record.id, error = %e, "Remediation failed");
                    RemediationResult::Failed(e.to_string())
                }
            };
            outcomes.push(RemediationOutcome {
                action_id: action.id,
                kind: action.kind,
                result,
            });
        }
        outcomes
    }

    async fn execute(
        &self,
        action: &RemediationAction,
        record: &ErrorRecord,
        recovery: Option<&RecoveryOperation>,
    ) -> Result<Execution> {
        match action.kind {
            RemediationKind::Retry => {
                let Some(operation) = recovery else {
                    return Ok(Execution::Skipped("no recovery operation supplied".to_string()));
                };
                let circuit = record.category.as_str();
                if !self.circuit_breaker.is_allowed(circuit) {
                    return Ok(Execution::Skipped(format!("circuit '{}' is open", circuit)));
                }
                match self.retry.execute(operation).await {
                    RetryResult::Recovered { attempts } => {
                        self.circuit_breaker.record_success(circuit);
                        info!(action = %action.id, error_id = %record.id, attempts, "Operation recovered by retry");
                        Ok(Execution::Done)
                    }
                    RetryResult::Exhausted { attempts, last_error } => {
                        self.circuit_breaker.record_failure(circuit);
                        Err(IntelligenceError::Remediation {
                            action: action.id.clone(),
                            reason: format!("retry exhausted after {} attempts: {}", attempts, last_error),
                        })
                    }
                }
            }
            RemediationKind::CircuitBreaker => {
                self.circuit_breaker.trip(record.category.as_str());
                Ok(Execution::Done)
            }
            RemediationKind::Fallback => {
                let severity = if record.severity.is_critical() {
                    DegradedSeverity::Severe
                } else {
                    DegradedSeverity::Moderate
                };
                self.degraded
                    .activate(fallback_ui_mode(record.category), record.message.clone(), severity);
                Ok(Execution::Done)
            }
            RemediationKind::GracefulDegradation => {
                self.degraded
                    .activate(NON_ESSENTIAL_FEATURES, record.message.clone(), DegradedSeverity::Minor);
                Ok(Execution::Done)
            }
            RemediationKind::Notification => {
                self.notifier.send_smart_notification(record, Some(&action.id));
                Ok(Execution::Done)
            }
        }
    }

    fn record_execution(&self, id: &str, succeeded: bool) {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(action) = actions.iter_mut().find(|a| a.id == id) {
            let sample = if succeeded { 1.0 } else { 0.0 };
            action.success_rate = action.success_rate * 0.9 + sample * 0.1;
            if succeeded {
                action.last_executed = Some(Utc::now());
            } else {
                action.status = RemediationStatus::Failed;
            }
        }
    }
}
