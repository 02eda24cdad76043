//! # Error Intelligence Types
//!
//! Canonical records produced by the capture pipeline and the internal
//! error type used when the pipeline itself fails.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A type alias for Result with the error type defaulting to [`IntelligenceError`]
pub type Result<T, E = IntelligenceError> = std::result::Result<T, E>;

/// Failures raised while processing telemetry, never the application error being reported
#[derive(Debug, thiserror::Error)]
pub enum IntelligenceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Insight generation failed: {0}")]
    Insight(String),

    #[error("Remediation '{action}' failed: {reason}")]
    Remediation { action: String, reason: String },

    #[error("Notification delivery failed: {0}")]
    Notification(String),
}

impl From<reqwest::Error> for IntelligenceError {
    fn from(err: reqwest::Error) -> Self {
        IntelligenceError::Http(err.to_string())
    }
}

impl From<config::ConfigError> for IntelligenceError {
    fn from(err: config::ConfigError) -> Self {
        IntelligenceError::Config(err.to_string())
    }
}

/// Urgency of a captured error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or self-healing failure
    Low,
    /// Default when no rule matches
    Medium,
    /// A feature is unusable for the user
    High,
    /// The page or session is broken
    Critical,
    /// The application cannot continue
    Fatal,
}

impl Severity {
    /// Ordinal used for sorting, `Low` = 0 through `Fatal` = 4
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
            Severity::Fatal => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }

    /// Critical and fatal errors share escalation and health handling
    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional area an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Rendering,
    Authentication,
    Api,
    Performance,
    Security,
    Content,
    Assessment,
    Learning,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Network,
        ErrorCategory::Rendering,
        ErrorCategory::Authentication,
        ErrorCategory::Api,
        ErrorCategory::Performance,
        ErrorCategory::Security,
        ErrorCategory::Content,
        ErrorCategory::Assessment,
        ErrorCategory::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Rendering => "rendering",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Api => "api",
            ErrorCategory::Performance => "performance",
            ErrorCategory::Security => "security",
            ErrorCategory::Content => "content",
            ErrorCategory::Assessment => "assessment",
            ErrorCategory::Learning => "learning",
        }
    }

    /// Name remediation rules use to subscribe to this category, e.g. `network_error`
    pub fn trigger_key(&self) -> String {
        format!("{}_error", self.as_str())
    }

    /// Parses a lowercase category name, returning `None` for unknown input
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        ErrorCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == value)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of derived observation attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    RootCause,
    Pattern,
    Recommendation,
    Prediction,
}

/// Coarse impact scale shared by insights and impact predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// One derived observation about an error record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    /// Confidence in the range 0.0 to 1.0
    pub confidence: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    pub impact: ImpactLevel,
    /// Number of matching records for pattern insights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<usize>,
}

/// Heuristic blast-radius estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactPrediction {
    pub affected_users: u32,
    pub affected_sessions: u32,
    pub affected_features: Vec<String>,
    pub business_impact: ImpactLevel,
    pub educational_impact: ImpactLevel,
    pub recovery_time_secs: u64,
    pub prevention: Vec<String>,
}

/// Effect of an error on the learner's current activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningContextImpact {
    pub assessment_disrupted: bool,
    pub progress_lost: bool,
    pub content_inaccessible: bool,
    pub engagement_impact: ImpactLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_learning_path: Option<String>,
    pub recommended_actions: Vec<String>,
}

/// Canonical normalized representation of one captured failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    timestamp: DateTime<Utc>,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
    pub severity: Severity,
    pub category: ErrorCategory,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<AiInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_impact: Option<LearningContextImpact>,
}

impl ErrorRecord {
    /// Creates a record stamped with a fresh id and the current time
    pub fn new(
        message: impl Into<String>,
        severity: Severity,
        category: ErrorCategory,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_record_id(),
            message: message.into(),
            stack: None,
            url: String::new(),
            line: None,
            column: None,
            timestamp: Utc::now(),
            user_agent: String::new(),
            user_id: None,
            session_id: session_id.into(),
            severity,
            category,
            context: serde_json::Map::new(),
            insights: Vec::new(),
            impact: None,
            learning_impact: None,
        }
    }

    /// Adds a context entry, ignoring values that cannot be represented as JSON
    pub fn with_context<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.insert(key.into(), value);
        }
        self
    }

    /// When the failure was captured; fixed at construction
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[cfg(test)]
    pub(crate) fn backdated(mut self, age: chrono::Duration) -> Self {
        self.timestamp = Utc::now() - age;
        self
    }

    pub fn insight(&self, kind: InsightKind) -> Option<&AiInsight> {
        self.insights.iter().find(|i| i.kind == kind)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} error {}: {}",
            self.severity, self.category, self.id, self.message
        )
    }
}

pub(crate) fn generate_record_id() -> String {
    format!("err_{}", Uuid::new_v4().simple())
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
