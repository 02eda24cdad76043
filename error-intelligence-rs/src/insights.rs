//! # Insight Generation
//!
//! Insights are produced behind the [`InsightProvider`] trait so a learned
//! model can replace the built-in heuristics without touching the pipeline.

use async_trait::async_trait;

use crate::capture::CapturedError;
use crate::types::{AiInsight, ErrorCategory, ErrorRecord, ImpactLevel, InsightKind, Result, Severity};

/// Confidence reported for repeated-message patterns
pub const PATTERN_CONFIDENCE: f64 = 0.85;

/// More matches than this make a pattern high impact
const PATTERN_HIGH_IMPACT_THRESHOLD: usize = 5;

/// Everything a provider may look at for one capture
#[derive(Debug, Clone, Copy)]
pub struct InsightInput<'a> {
    pub error: &'a CapturedError,
    pub record: &'a ErrorRecord,
    /// Other records with the same message from the last 24 hours
    pub similar: &'a [ErrorRecord],
}

#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn generate_insights(&self, input: InsightInput<'_>) -> Result<Vec<AiInsight>>;
}

/// Rule-based provider using canned descriptions
#[derive(Debug, Clone, Default)]
pub struct HeuristicInsightProvider;

impl HeuristicInsightProvider {
    pub fn new() -> Self {
        Self
    }

    fn pattern(similar: &[ErrorRecord]) -> Option<AiInsight> {
        if similar.is_empty() {
            return None;
        }

        let frequency = similar.len();
        let impact = if frequency > PATTERN_HIGH_IMPACT_THRESHOLD {
            ImpactLevel::High
        } else {
            ImpactLevel::Medium
        };

        Some(AiInsight {
            kind: InsightKind::Pattern,
            confidence: PATTERN_CONFIDENCE,
            description: format!("Same error seen {} other time(s) in the last 24 hours", frequency),
            suggested_action: Some("Investigate the recurring failure path".to_string()),
            impact,
            frequency: Some(frequency),
        })
    }

    fn root_cause(error: &CapturedError, category: ErrorCategory) -> AiInsight {
        let description = match category {
            ErrorCategory::Network => "Unstable connectivity or an unreachable backend",
            ErrorCategory::Rendering => "A component received data in an unexpected shape",
            ErrorCategory::Authentication => "Expired or invalid session credentials",
            ErrorCategory::Api => "Backend endpoint returned an error response",
            ErrorCategory::Performance => "Resource exhaustion on the client device",
            ErrorCategory::Security => "A request was blocked by a security policy",
            ErrorCategory::Content => "Course content or media asset failed to load",
            ErrorCategory::Assessment => "Assessment state could not be saved or graded",
            ErrorCategory::Learning => "Learning flow reached an unexpected state",
        };

        let suggested_action = error
            .stack
            .as_deref()
            .filter(|stack| stack.contains("chunk"))
            .map(|_| "Check for stale bundles after a deployment".to_string());

        AiInsight {
            kind: InsightKind::RootCause,
            confidence: 0.75,
            description: description.to_string(),
            suggested_action,
            impact: ImpactLevel::Medium,
            frequency: None,
        }
    }

    fn recommendation(severity: Severity) -> AiInsight {
        let (description, impact) = match severity {
            Severity::Fatal => ("Page the on-call engineer and consider a rollback", ImpactLevel::Critical),
            Severity::Critical => ("Prioritize a hotfix for this error", ImpactLevel::High),
            Severity::High => ("Schedule a fix in the current iteration", ImpactLevel::Medium),
            Severity::Medium | Severity::Low => ("Track the error and fix when convenient", ImpactLevel::Low),
        };

        AiInsight {
            kind: InsightKind::Recommendation,
            confidence: 0.7,
            description: description.to_string(),
            suggested_action: None,
            impact,
            frequency: None,
        }
    }

    fn prediction(severity: Severity) -> Option<AiInsight> {
        severity.is_critical().then(|| AiInsight {
            kind: InsightKind::Prediction,
            confidence: 0.6,
            description: "Error is likely to recur for other learners without intervention".to_string(),
            suggested_action: Some("Enable automated remediation for this category".to_string()),
            impact: ImpactLevel::High,
            frequency: None,
        })
    }
}

#[async_trait]
impl InsightProvider for HeuristicInsightProvider {
    async fn generate_insights(&self, input: InsightInput<'_>) -> Result<Vec<AiInsight>> {
        let mut insights = Vec::with_capacity(4);
        insights.extend(Self::pattern(input.similar));
        insights.push(Self::root_cause(input.error, input.record.category));
        insights.push(Self::recommendation(input.record.severity));
        insights.extend(Self::prediction(input.record.severity));
        Ok(insights)
    }
}
