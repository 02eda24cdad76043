//! # Error Classifier
//!
//! Keyword rules assigning severity and category. Rules are evaluated in a
//! fixed order and the first match wins, so the order of the tables below is
//! part of the behavior.

use crate::capture::{CaptureContext, CapturedError, EducationalContext};
use crate::types::{ErrorCategory, Severity};

const SEVERITY_RULES: &[(Severity, &[&str])] = &[
    (Severity::Fatal, &["fatal", "system crash"]),
    (
        Severity::Critical,
        &["syntaxerror", "syntax error", "typeerror", "type error", "referenceerror"],
    ),
    (Severity::High, &["authentication", "authorization"]),
    (
        Severity::Low,
        &["network", "chunkloaderror", "chunk load error", "timeout"],
    ),
];

const CATEGORY_RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &["network", "fetch", "timeout", "chunkloaderror", "offline", "cors"],
    ),
    (
        ErrorCategory::Security,
        &["security", "xss", "csrf", "content security policy"],
    ),
    (
        ErrorCategory::Authentication,
        &["authentication", "authorization", "unauthorized", "forbidden", "login", "token"],
    ),
    (ErrorCategory::Api, &["api", "status code", "endpoint"]),
    (
        ErrorCategory::Rendering,
        &["render", "component", "hydration", "react"],
    ),
    (
        ErrorCategory::Performance,
        &["memory", "performance", "long task", "slow"],
    ),
    (
        ErrorCategory::Assessment,
        &["assessment", "quiz", "exam", "grading", "submission"],
    ),
    (ErrorCategory::Content, &["content", "video", "media", "image"]),
];

fn first_match<T: Copy>(haystack: &str, rules: &[(T, &[&str])]) -> Option<T> {
    rules
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(value, _)| *value)
}

/// Assigns a severity from the error name, message and stack
pub fn determine_severity(error: &CapturedError) -> Severity {
    first_match(&error.haystack(), SEVERITY_RULES).unwrap_or(Severity::Medium)
}

/// Assigns a category. A valid caller hint wins, then keyword rules, then the
/// page the error happened on (`page`, or a `url` entry in the context).
pub fn categorize_error(
    error: &CapturedError,
    context: Option<&CaptureContext>,
    page: Option<&EducationalContext>,
) -> ErrorCategory {
    if let Some(hint) = context.and_then(CaptureContext::category_hint) {
        return hint;
    }

    if let Some(category) = first_match(&error.haystack(), CATEGORY_RULES) {
        return category;
    }

    let on_assessment_page = page.map_or(false, |p| p.is_assessment)
        || context
            .and_then(|ctx| ctx.data.get("url"))
            .and_then(|url| url.as_str())
            .map_or(false, |url| EducationalContext::from_url(url).is_assessment);

    if on_assessment_page {
        ErrorCategory::Assessment
    } else {
        ErrorCategory::Learning
    }
}

/// Severity of a failed HTTP response
pub fn api_error_severity(status: u16) -> Severity {
    match status {
        500..=u16::MAX => Severity::Critical,
        401 | 403 => Severity::High,
        404 => Severity::Low,
        400..=499 => Severity::Medium,
        _ => Severity::Low,
    }
}
