//! # Capture Inputs
//!
//! Shapes accepted by the capture façade. Everything the host hands us is
//! normalized here so the rest of the pipeline never sees loosely typed data.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ErrorCategory;

const UNKNOWN_MESSAGE: &str = "Unknown error";

/// A raw application failure handed to the capture façade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedError {
    /// Error type name, e.g. `TypeError` or a Rust type path
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    /// Script or module the failure originated from
    pub source_url: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CapturedError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_MESSAGE.to_string()
        } else {
            message
        };

        Self {
            name: "Error".to_string(),
            message,
            stack: None,
            source_url: None,
            line: None,
            column: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack<S: Into<String>>(mut self, stack: S) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location<S: Into<String>>(mut self, source_url: S, line: u32, column: u32) -> Self {
        self.source_url = Some(source_url.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Builds a captured error from any std error, folding its source chain into the stack
    pub fn from_std_error(err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        let captured = Self::new(err.to_string());
        if chain.is_empty() {
            captured
        } else {
            captured.with_stack(chain.join("\n"))
        }
    }

    /// Lowercased name, message and stack, the text the classifier matches against
    pub(crate) fn haystack(&self) -> String {
        let mut text = String::with_capacity(self.message.len() + self.name.len() + 2);
        text.push_str(&self.name);
        text.push(' ');
        text.push_str(&self.message);
        if let Some(stack) = &self.stack {
            text.push(' ');
            text.push_str(stack);
        }
        text.to_lowercase()
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl From<&anyhow::Error> for CapturedError {
    fn from(err: &anyhow::Error) -> Self {
        let causes: Vec<String> = err.chain().skip(1).map(|c| format!("caused by: {}", c)).collect();
        let captured = Self::new(err.to_string());
        if causes.is_empty() {
            captured
        } else {
            captured.with_stack(causes.join("\n"))
        }
    }
}

impl From<&str> for CapturedError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Caller supplied context attached to a capture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureContext {
    pub user_id: Option<String>,
    /// Category hint; only honored when it names a known category
    pub category: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Adds a key-value pair to the context
    pub fn add<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.data.insert(key.into(), value);
        }
        self
    }

    pub(crate) fn category_hint(&self) -> Option<ErrorCategory> {
        self.category.as_deref().and_then(ErrorCategory::parse)
    }
}

/// Context reported by a UI error boundary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentContext {
    pub component_name: Option<String>,
    pub component_stack: String,
}

impl ComponentContext {
    pub fn new<S: Into<String>>(component_stack: S) -> Self {
        Self {
            component_name: None,
            component_stack: component_stack.into(),
        }
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.component_name = Some(name.into());
        self
    }
}

/// A failed HTTP response observed by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub method: Option<String>,
}

impl ApiFailure {
    pub fn new<S: Into<String>>(status: u16, url: S) -> Self {
        Self {
            status,
            status_text: String::new(),
            url: url.into(),
            method: None,
        }
    }

    pub fn with_status_text<S: Into<String>>(mut self, text: S) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn from_response(response: &reqwest::Response) -> Self {
        let status = response.status();
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url: response.url().to_string(),
            method: None,
        }
    }

    pub(crate) fn message(&self) -> String {
        if self.status_text.is_empty() {
            format!("API Error: {} at {}", self.status, self.url)
        } else {
            format!("API Error: {} {} at {}", self.status, self.status_text, self.url)
        }
    }
}

/// Heap statistics reported by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub limit_bytes: u64,
}

/// Network characteristics reported by the host runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub effective_type: String,
    pub downlink_mbps: f64,
    pub rtt_ms: u32,
}

/// Host environment at the moment of capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub url: String,
    pub user_agent: String,
    pub viewport: Option<(u32, u32)>,
    pub memory: Option<MemoryUsage>,
    pub connection: Option<ConnectionInfo>,
}

/// Source of environment data; the host replaces this with its own probe
pub trait EnvironmentProbe: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Probe returning a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    snapshot: EnvironmentSnapshot,
}

impl StaticEnvironment {
    pub fn new<U: Into<String>, A: Into<String>>(url: U, user_agent: A) -> Self {
        Self {
            snapshot: EnvironmentSnapshot {
                url: url.into(),
                user_agent: user_agent.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.snapshot.viewport = Some((width, height));
        self
    }

    pub fn with_memory(mut self, memory: MemoryUsage) -> Self {
        self.snapshot.memory = Some(memory);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionInfo) -> Self {
        self.snapshot.connection = Some(connection);
        self
    }
}

impl EnvironmentProbe for StaticEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.snapshot.clone()
    }
}

/// What the learner was doing, derived from the page URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationalContext {
    pub route: String,
    pub is_assessment: bool,
    pub is_learning_content: bool,
    pub course_id: Option<String>,
}

impl EducationalContext {
    pub fn from_url(url: &str) -> Self {
        let route = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.split(|c| c == '?' || c == '#').next().unwrap_or_default().to_string(),
        };
        let lower = route.to_lowercase();

        let is_assessment = ["/assessment", "/quiz", "/exam"]
            .iter()
            .any(|p| lower.contains(p));
        let is_learning_content = ["/learn", "/course", "/lesson"]
            .iter()
            .any(|p| lower.contains(p));

        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        let course_id = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("course") || s.eq_ignore_ascii_case("courses"))
            .and_then(|i| segments.get(i + 1))
            .map(|s| s.to_string());

        Self {
            route,
            is_assessment,
            is_learning_content,
            course_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_empty_message_is_normalized() {
        assert_eq!(CapturedError::new("   ").message, "Unknown error");
    }

    #[test]
    fn test_from_std_error_keeps_source_chain() {
        #[derive(Debug)]
        struct Wrapper(io::Error);
        impl fmt::Display for Wrapper {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "failed to load lesson")
            }
        }
        impl StdError for Wrapper {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Wrapper(io::Error::new(io::ErrorKind::TimedOut, "connection timed out"));
        let captured = CapturedError::from_std_error(&err);

        assert_eq!(captured.message, "failed to load lesson");
        assert!(captured.stack.unwrap().contains("connection timed out"));
    }

    #[test]
    fn test_from_anyhow_chain() {
        let err = anyhow::anyhow!("socket closed").context("sync failed");
        let captured = CapturedError::from(&err);
        assert_eq!(captured.message, "sync failed");
        assert!(captured.stack.unwrap().contains("socket closed"));
    }

    #[test]
    fn test_context_category_hint_is_validated() {
        let ctx = CaptureContext::new().category("assessment").add("attempt", 2);
        assert_eq!(ctx.category_hint(), Some(ErrorCategory::Assessment));
        assert_eq!(ctx.data["attempt"], 2);

        let bogus = CaptureContext::new().category("database");
        assert_eq!(bogus.category_hint(), None);
    }

    #[test]
    fn test_educational_context_from_url() {
        let ctx = EducationalContext::from_url("https://learn.example.com/courses/rust-101/quiz/4?x=1");
        assert_eq!(ctx.route, "/courses/rust-101/quiz/4");
        assert!(ctx.is_assessment);
        assert!(ctx.is_learning_content);
        assert_eq!(ctx.course_id.as_deref(), Some("rust-101"));

        let dashboard = EducationalContext::from_url("/dashboard");
        assert!(!dashboard.is_assessment);
        assert!(!dashboard.is_learning_content);
        assert_eq!(dashboard.course_id, None);
    }

    #[test]
    fn test_api_failure_message() {
        let failure = ApiFailure::new(503, "/api/achievements").with_status_text("Service Unavailable");
        assert_eq!(failure.message(), "API Error: 503 Service Unavailable at /api/achievements");
    }
}
