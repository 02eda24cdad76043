//! # Error Intelligence
//!
//! Client-side error monitoring for a learning platform: failures are
//! captured, classified, enriched with insights and impact estimates,
//! stored in a bounded history, remediated, notified and reported.
//!
//! ## Features
//!
//! - Keyword classification of severity and category
//! - Pluggable insight providers with a deterministic heuristic default
//! - Rule-triggered remediation (retry, circuit breaker, fallback, degradation, notification)
//! - Smart notifications with scheduled, cancellable escalation
//! - Real-time metrics, analytics and PII compliance reports
//! - Error boundary contract for UI integrations
//!

pub mod analytics;
pub mod boundary;
pub mod capture;
pub mod circuit_breaker;
pub mod classifier;
pub mod compliance;
pub mod config;
pub mod degradation;
pub mod history;
pub mod impact;
pub mod insights;
pub mod intelligence;
pub mod logging;
pub mod notification;
pub mod remediation;
pub mod reporting;
pub mod retry;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

// Re-export commonly used types
pub use analytics::{ErrorAnalytics, RealTimeMetrics, SystemHealth};
pub use boundary::{BoundaryCommand, CapturingBoundary, ErrorBoundary, FallbackAction, FallbackPanel};
pub use capture::{ApiFailure, CaptureContext, CapturedError, ComponentContext, EnvironmentProbe, StaticEnvironment};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use compliance::{ComplianceKind, ComplianceReport, ComplianceStatus, PiiScanner};
pub use config::IntelligenceConfig;
pub use insights::{HeuristicInsightProvider, InsightInput, InsightProvider};
pub use intelligence::{ErrorIntelligence, ErrorIntelligenceBuilder};
pub use logging::{init_logging, LoggingConfig};
pub use notification::{LogTransport, NotificationTransport, SmartNotification, WebhookTransport};
pub use remediation::{RemediationAction, RemediationKind, RemediationStatus};
pub use retry::{recovery, RecoveryOperation, RetryConfig, RetryPolicy};
pub use types::{ErrorCategory, ErrorRecord, IntelligenceError, Result, Severity};

/// Installs logging and starts an instance configured from the environment.
/// Must be called inside a Tokio runtime.
pub fn init() -> Result<Arc<ErrorIntelligence>> {
    init_logging(None)?;
    let intelligence = Arc::new(ErrorIntelligence::new(IntelligenceConfig::from_env()?)?);
    intelligence.init();
    Ok(intelligence)
}

/// Same as [`init`] with settings from a `config::Config`
pub fn init_with_config(config: ::config::Config) -> Result<Arc<ErrorIntelligence>> {
    let log_config = config.clone().try_into().ok();
    let intelligence_config = IntelligenceConfig::try_from(config)?;

    init_logging(log_config)?;
    let intelligence = Arc::new(ErrorIntelligence::new(intelligence_config)?);
    intelligence.init();
    Ok(intelligence)
}
