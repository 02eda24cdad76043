//! # Impact Estimation
//!
//! Deterministic lookup tables mapping severity and category onto a
//! blast-radius estimate and a learner-facing impact summary.

use crate::capture::EducationalContext;
use crate::types::{
    ErrorCategory, ErrorRecord, ImpactLevel, ImpactPrediction, LearningContextImpact, Severity,
};

fn base_affected_users(severity: Severity) -> u32 {
    match severity {
        Severity::Critical | Severity::Fatal => 100,
        Severity::High => 50,
        _ => 25,
    }
}

fn affected_features(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Network => &["content loading", "progress sync"],
        ErrorCategory::Rendering => &["user interface"],
        ErrorCategory::Authentication => &["login", "user session"],
        ErrorCategory::Api => &["api requests", "progress sync"],
        ErrorCategory::Performance => &["page responsiveness"],
        ErrorCategory::Security => &["user data protection"],
        ErrorCategory::Content => &["course content", "media playback"],
        ErrorCategory::Assessment => &["quizzes", "grading", "progress tracking"],
        ErrorCategory::Learning => &["lessons", "progress tracking"],
    }
}

fn prevention(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Network => &[
            "Add offline caching for course content",
            "Retry idempotent requests with backoff",
        ],
        ErrorCategory::Rendering => &[
            "Wrap feature areas in error boundaries",
            "Add component tests for empty and loading states",
        ],
        ErrorCategory::Authentication => &[
            "Refresh session tokens before expiry",
            "Surface re-login prompts instead of failing silently",
        ],
        ErrorCategory::Api => &[
            "Add contract tests for backend endpoints",
            "Guard callers with a circuit breaker",
        ],
        ErrorCategory::Performance => &[
            "Profile long tasks on low-end devices",
            "Lazy-load non-critical bundles",
        ],
        ErrorCategory::Security => &[
            "Review content security policy",
            "Audit input sanitization",
        ],
        ErrorCategory::Content => &[
            "Validate media assets at publish time",
            "Provide text alternatives for media",
        ],
        ErrorCategory::Assessment => &[
            "Autosave assessment answers locally",
            "Make submissions idempotent",
        ],
        ErrorCategory::Learning => &[
            "Persist learner progress incrementally",
            "Add monitoring around lesson navigation",
        ],
    }
}

fn recovery_time_secs(severity: Severity) -> u64 {
    match severity {
        Severity::Fatal => 3600,
        Severity::Critical => 1800,
        Severity::High => 600,
        Severity::Medium => 300,
        Severity::Low => 60,
    }
}

fn is_educational(category: ErrorCategory) -> bool {
    matches!(
        category,
        ErrorCategory::Assessment | ErrorCategory::Learning | ErrorCategory::Content
    )
}

/// Estimates the blast radius of a record from severity and category alone
pub fn predict_error_impact(record: &ErrorRecord) -> ImpactPrediction {
    let affected_users = base_affected_users(record.severity);

    let business_impact = match record.severity {
        Severity::Fatal => ImpactLevel::Critical,
        Severity::Critical => ImpactLevel::High,
        Severity::High => ImpactLevel::Medium,
        _ => ImpactLevel::Low,
    };

    let educational_impact = if is_educational(record.category) {
        if record.severity.rank() >= Severity::High.rank() {
            ImpactLevel::High
        } else {
            ImpactLevel::Medium
        }
    } else {
        ImpactLevel::Low
    };

    ImpactPrediction {
        affected_users,
        affected_sessions: affected_users * 3 / 2,
        affected_features: affected_features(record.category)
            .iter()
            .map(|s| s.to_string())
            .collect(),
        business_impact,
        educational_impact,
        recovery_time_secs: recovery_time_secs(record.severity),
        prevention: prevention(record.category).iter().map(|s| s.to_string()).collect(),
    }
}

/// Summarizes what the error means for the learner's current activity
pub fn analyze_learning_context(record: &ErrorRecord, page: &EducationalContext) -> LearningContextImpact {
    let assessment_disrupted = record.category == ErrorCategory::Assessment || page.is_assessment;
    let progress_lost = matches!(record.category, ErrorCategory::Assessment | ErrorCategory::Learning)
        && record.severity.rank() >= Severity::High.rank();
    let content_inaccessible = matches!(
        record.category,
        ErrorCategory::Content | ErrorCategory::Network | ErrorCategory::Rendering
    );

    let engagement_impact = match record.severity {
        Severity::Fatal | Severity::Critical => ImpactLevel::High,
        Severity::High => ImpactLevel::Medium,
        _ => ImpactLevel::Low,
    };

    let mut recommended_actions = Vec::new();
    if assessment_disrupted {
        recommended_actions.push("Preserve the learner's assessment answers and allow resuming".to_string());
    }
    if progress_lost {
        recommended_actions.push("Restore progress from the last saved checkpoint".to_string());
    }
    if content_inaccessible {
        recommended_actions.push("Offer cached or alternative content".to_string());
    }
    if recommended_actions.is_empty() {
        recommended_actions.push("No learner-facing action required".to_string());
    }

    let affected_learning_path = page
        .course_id
        .clone()
        .or_else(|| (page.is_learning_content || page.is_assessment).then(|| page.route.clone()));

    LearningContextImpact {
        assessment_disrupted,
        progress_lost,
        content_inaccessible,
        engagement_impact,
        affected_learning_path,
        recommended_actions,
    }
}
