//! # Error Intelligence
//!
//! The capture façade. Each capture runs the same fixed sequence:
//!
//! 1. build the record and classify it
//! 2. enrich it with insights, impact and learning context (concurrently)
//! 3. store it in the bounded history
//! 4. apply remediation
//! 5. dispatch a notification
//! 6. post it to the reporting endpoint
//! 7. log it (development only) and update metrics
//!
//! Nothing after classification can fail the capture. Internal failures are
//! logged and the record is still returned.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt;
use metrics::{counter, gauge};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::{self, ErrorAnalytics, RealTimeMetrics, SystemHealth};
use crate::capture::{
    ApiFailure, CaptureContext, CapturedError, ComponentContext, EducationalContext, EnvironmentProbe,
    EnvironmentSnapshot, StaticEnvironment,
};
use crate::circuit_breaker::CircuitBreaker;
use crate::classifier::{api_error_severity, categorize_error, determine_severity};
use crate::compliance::{self, ComplianceKind, ComplianceReport};
use crate::config::IntelligenceConfig;
use crate::degradation::DegradedMode;
use crate::history::ErrorHistory;
use crate::impact::{analyze_learning_context, predict_error_impact};
use crate::insights::{HeuristicInsightProvider, InsightInput, InsightProvider};
use crate::logging::log_record;
use crate::notification::{LogTransport, NotificationDispatcher, NotificationTransport, SmartNotification};
use crate::remediation::{RemediationAction, RemediationEngine, RemediationResult};
use crate::reporting::{ErrorReporter, ReporterConfig};
use crate::retry::{RecoveryOperation, RetryPolicy};
use crate::scheduler::TaskScheduler;
use crate::types::{panic_message, ErrorCategory, ErrorRecord, Result, Severity};

/// Window for the repeated-message pattern insight
const PATTERN_WINDOW_HOURS: i64 = 24;

/// Window for "recent" remediation conditions
const RECENT_WINDOW_HOURS: i64 = 1;

const HEALTH_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

struct CaptureRequest {
    error: CapturedError,
    context: CaptureContext,
    severity: Option<Severity>,
    category: Option<ErrorCategory>,
    recovery: Option<RecoveryOperation>,
}

impl CaptureRequest {
    fn new(error: CapturedError, context: Option<CaptureContext>) -> Self {
        Self {
            error,
            context: context.unwrap_or_default(),
            severity: None,
            category: None,
            recovery: None,
        }
    }
}

/// Builder for [`ErrorIntelligence`] with injectable collaborators
pub struct ErrorIntelligenceBuilder {
    config: IntelligenceConfig,
    probe: Option<Arc<dyn EnvironmentProbe>>,
    insight_provider: Option<Arc<dyn InsightProvider>>,
    transport: Option<Arc<dyn NotificationTransport>>,
    user_id: Option<String>,
}

impl ErrorIntelligenceBuilder {
    pub fn environment_probe(mut self, probe: Arc<dyn EnvironmentProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn insight_provider(mut self, provider: Arc<dyn InsightProvider>) -> Self {
        self.insight_provider = Some(provider);
        self
    }

    pub fn notification_transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn build(self) -> Result<ErrorIntelligence> {
        let config = self.config;
        config.validate()?;

        let scheduler = Arc::new(TaskScheduler::new("error-intelligence"));
        let circuit_breaker = Arc::new(CircuitBreaker::new(Some(config.circuit_breaker.clone())));
        let degraded = Arc::new(DegradedMode::new());
        let notifier = Arc::new(NotificationDispatcher::new(
            config.notification.clone(),
            self.transport.unwrap_or_else(|| Arc::new(LogTransport)),
            Arc::clone(&scheduler),
        ));
        let remediation = RemediationEngine::new(
            RetryPolicy::new("remediation", Some(config.retry.clone())),
            Arc::clone(&circuit_breaker),
            Arc::clone(&degraded),
            Arc::clone(&notifier),
        );
        let reporter = ErrorReporter::new(ReporterConfig {
            endpoint: config.reporting_endpoint.clone(),
            auth_token: config.reporting_token.clone(),
            redact_pii: config.compliance_mode,
            ..ReporterConfig::default()
        })?;

        Ok(ErrorIntelligence {
            session_id: format!("session_{}", Uuid::new_v4().simple()),
            user_id: RwLock::new(self.user_id),
            history: Arc::new(RwLock::new(ErrorHistory::new(config.history_capacity))),
            probe: self.probe.unwrap_or_else(|| Arc::new(StaticEnvironment::default())),
            insights: self
                .insight_provider
                .unwrap_or_else(|| Arc::new(HeuristicInsightProvider::new())),
            remediation,
            notifier,
            reporter,
            circuit_breaker,
            degraded,
            scheduler,
            initialized: AtomicBool::new(false),
            config,
        })
    }
}

pub struct ErrorIntelligence {
    config: IntelligenceConfig,
    session_id: String,
    user_id: RwLock<Option<String>>,
    history: Arc<RwLock<ErrorHistory>>,
    probe: Arc<dyn EnvironmentProbe>,
    insights: Arc<dyn InsightProvider>,
    remediation: RemediationEngine,
    notifier: Arc<NotificationDispatcher>,
    reporter: ErrorReporter,
    circuit_breaker: Arc<CircuitBreaker>,
    degraded: Arc<DegradedMode>,
    scheduler: Arc<TaskScheduler>,
    initialized: AtomicBool,
}

impl std::fmt::Debug for ErrorIntelligence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorIntelligence")
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ErrorIntelligence {
    pub fn new(config: IntelligenceConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: IntelligenceConfig) -> ErrorIntelligenceBuilder {
        ErrorIntelligenceBuilder {
            config,
            probe: None,
            insight_provider: None,
            transport: None,
            user_id: None,
        }
    }

    /// Starts background health reporting; must run inside a Tokio runtime
    pub fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.config.monitoring_enabled && self.config.realtime_monitoring_enabled {
            let history = Arc::clone(&self.history);
            self.scheduler.spawn_periodic(HEALTH_REFRESH_INTERVAL, move || {
                let history = Arc::clone(&history);
                async move {
                    let metrics = {
                        let history = history.read().unwrap_or_else(PoisonError::into_inner);
                        analytics::get_real_time_metrics(&history)
                    };
                    publish_health(&metrics);
                }
            });
        }

        info!(
            session_id = %self.session_id,
            environment = %self.config.environment,
            monitoring = self.config.monitoring_enabled,
            ai_insights = self.config.ai_insights_enabled,
            reporting = self.reporter.is_enabled(),
            "Error intelligence initialized"
        );
    }

    /// Cancels pending notifications, escalations and periodic tasks
    pub async fn shutdown(&self) {
        info!(session_id = %self.session_id, "Shutting down error intelligence");
        self.scheduler.shutdown().await;
    }

    pub fn config(&self) -> &IntelligenceConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_user(&self, user_id: Option<String>) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = user_id;
    }

    pub async fn capture_exception(
        &self,
        error: CapturedError,
        context: Option<CaptureContext>,
    ) -> Option<ErrorRecord> {
        self.capture(CaptureRequest::new(error, context)).await
    }

    /// Like [`capture_exception`](Self::capture_exception), handing the retry
    /// remediation an operation to re-run
    pub async fn capture_exception_with_recovery(
        &self,
        error: CapturedError,
        context: Option<CaptureContext>,
        recovery: RecoveryOperation,
    ) -> Option<ErrorRecord> {
        let mut request = CaptureRequest::new(error, context);
        request.recovery = Some(recovery);
        self.capture(request).await
    }

    /// Capture hook for UI error boundaries; categorized as rendering
    pub async fn capture_component_error(
        &self,
        error: CapturedError,
        component: ComponentContext,
    ) -> Option<ErrorRecord> {
        let mut context = CaptureContext::new()
            .category(ErrorCategory::Rendering.as_str())
            .add("componentStack", component.component_stack);
        if let Some(name) = component.component_name {
            context = context.add("componentName", name);
        }
        self.capture(CaptureRequest::new(error, Some(context))).await
    }

    /// Captures a failed HTTP call; severity follows the status code
    pub async fn capture_api_error(
        &self,
        failure: ApiFailure,
        context: Option<CaptureContext>,
    ) -> Option<ErrorRecord> {
        let error = CapturedError::new(failure.message()).with_name("ApiError");
        let context = context
            .unwrap_or_default()
            .add("status", failure.status)
            .add("statusText", failure.status_text.clone())
            .add("url", failure.url.clone())
            .add("method", failure.method.clone());

        let mut request = CaptureRequest::new(error, Some(context));
        request.severity = Some(api_error_severity(failure.status));
        request.category = Some(ErrorCategory::Api);
        self.capture(request).await
    }

    async fn capture(&self, request: CaptureRequest) -> Option<ErrorRecord> {
        if !self.config.monitoring_enabled {
            return None;
        }

        match AssertUnwindSafe(self.process(request)).catch_unwind().await {
            Ok(record) => Some(record),
            Err(payload) => {
                counter!("error_intelligence.capture.panicked", 1);
                warn!(panic = %panic_message(payload.as_ref()), "Error capture panicked, record dropped");
                None
            }
        }
    }

    async fn process(&self, request: CaptureRequest) -> ErrorRecord {
        let CaptureRequest {
            error,
            context,
            severity,
            category,
            recovery,
        } = request;

        let environment = self.probe.snapshot();
        let page_url = if environment.url.is_empty() {
            error.source_url.clone().unwrap_or_default()
        } else {
            environment.url.clone()
        };
        let page = EducationalContext::from_url(&page_url);

        let severity = severity.unwrap_or_else(|| determine_severity(&error));
        let category = category.unwrap_or_else(|| categorize_error(&error, Some(&context), Some(&page)));
        let mut record = self.build_record(&error, context, &environment, page_url, severity, category);
        record = record.with_context("educationalContext", &page);

        if self.config.ai_insights_enabled {
            let similar = {
                let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
                history.similar_within(
                    &record.message,
                    chrono::Duration::hours(PATTERN_WINDOW_HOURS),
                    &record.id,
                )
            };

            let input = InsightInput {
                error: &error,
                record: &record,
                similar: &similar,
            };
            let (insights, impact, learning) = futures::join!(
                AssertUnwindSafe(self.insights.generate_insights(input)).catch_unwind(),
                async { predict_error_impact(&record) },
                async { analyze_learning_context(&record, &page) }
            );

            match insights {
                Ok(Ok(insights)) => record.insights = insights,
                Ok(Err(e)) => warn!(error_id = %record.id, error = %e, "Insight generation failed"),
                Err(payload) => {
                    counter!("error_intelligence.insights.panicked", 1);
                    warn!(
                        error_id = %record.id,
                        panic = %panic_message(payload.as_ref()),
                        "Insight provider panicked"
                    );
                }
            }
            record.impact = Some(impact);
            record.learning_impact = Some(learning);
        }

        let recent_in_category = {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            let evicted = history.insert(record.clone());
            if !evicted.is_empty() {
                debug!(evicted = evicted.len(), capacity = history.capacity(), "Evicted oldest errors");
            }
            history.count_recent_in_category(category, chrono::Duration::hours(RECENT_WINDOW_HOURS))
        };

        let outcomes = self
            .remediation
            .apply_remediation(&record, recent_in_category, recovery)
            .await;
        for outcome in &outcomes {
            if let RemediationResult::Failed(reason) = &outcome.result {
                warn!(error_id = %record.id, action = %outcome.action_id, reason = %reason, "Remediation did not recover");
            }
        }

        self.notifier.send_smart_notification(&record, None);

        if self.reporter.is_enabled() {
            if let Err(e) = self.reporter.report(&record).await {
                warn!(error_id = %record.id, error = %e, "Failed to report error");
            }
        }

        if self.config.is_development() {
            log_record(&record);
        }

        if self.config.realtime_monitoring_enabled {
            counter!(
                "error_intelligence.errors.captured",
                1,
                "category" => record.category.as_str(),
                "severity" => record.severity.as_str()
            );
            publish_health(&self.get_real_time_metrics());
        }

        record
    }

    fn build_record(
        &self,
        error: &CapturedError,
        context: CaptureContext,
        environment: &EnvironmentSnapshot,
        page_url: String,
        severity: Severity,
        category: ErrorCategory,
    ) -> ErrorRecord {
        let mut record = ErrorRecord::new(error.message.clone(), severity, category, self.session_id.clone());
        record.stack = error.stack.clone();
        record.line = error.line;
        record.column = error.column;
        record.url = page_url;
        record.user_agent = environment.user_agent.clone();
        record.user_id = context
            .user_id
            .clone()
            .or_else(|| self.user_id.read().unwrap_or_else(PoisonError::into_inner).clone());
        record.context = context.data;

        record = record.with_context("errorName", &error.name);
        if let Some(source) = &error.source_url {
            record = record.with_context("sourceUrl", source);
        }
        if let Some((width, height)) = environment.viewport {
            record = record.with_context("viewport", serde_json::json!({ "width": width, "height": height }));
        }
        if let Some(memory) = &environment.memory {
            record = record.with_context("memory", memory);
        }
        if let Some(connection) = &environment.connection {
            record = record.with_context("connection", connection);
        }
        record
    }

    /// Stored records, oldest first
    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.iter().cloned().collect()
    }

    pub fn get_error(&self, id: &str) -> Option<ErrorRecord> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.get(id).cloned()
    }

    pub fn clear_errors(&self) {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        history.clear();
        info!("Error history cleared");
    }

    pub fn get_real_time_metrics(&self) -> RealTimeMetrics {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        analytics::get_real_time_metrics(&history)
    }

    pub fn get_error_analytics(&self) -> ErrorAnalytics {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        analytics::generate_error_analytics(&history)
    }

    pub fn generate_compliance_report(&self, kind: ComplianceKind) -> ComplianceReport {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        compliance::generate_compliance_report(kind, history.iter())
    }

    pub fn notifications(&self) -> Vec<SmartNotification> {
        self.notifier.notifications()
    }

    pub fn acknowledge_notification(&self, id: &str) -> bool {
        self.notifier.acknowledge(id)
    }

    pub fn remediation_actions(&self) -> Vec<RemediationAction> {
        self.remediation.actions()
    }

    /// Administrative access for pausing, resuming or registering actions
    pub fn remediation(&self) -> &RemediationEngine {
        &self.remediation
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn degraded_mode(&self) -> &DegradedMode {
        &self.degraded
    }
}

fn publish_health(metrics: &RealTimeMetrics) {
    let level = match metrics.system_health {
        SystemHealth::Excellent => 0.0,
        SystemHealth::Good => 1.0,
        SystemHealth::Warning => 2.0,
        SystemHealth::Critical => 3.0,
    };
    gauge!("error_intelligence.errors.recent", metrics.total_errors as f64);
    gauge!("error_intelligence.errors.critical", metrics.critical_errors as f64);
    gauge!("error_intelligence.health", level);
}
