//! # Error Boundaries
//!
//! The contract a UI integration implements to catch component failures:
//! report through the capture façade, then offer retry or reload.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capture::{CapturedError, ComponentContext};
use crate::intelligence::ErrorIntelligence;
use crate::types::{ErrorCategory, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackAction {
    /// Reset the boundary and render the children again
    Retry,
    /// Reload the whole page
    Reload,
}

/// What the host must do after a fallback action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryCommand {
    RenderChildren,
    ReloadPage,
}

/// Inline panel shown in place of a failed component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackPanel {
    pub message: String,
    /// Absent when monitoring is disabled
    pub error_id: Option<String>,
    pub category: Option<ErrorCategory>,
    pub severity: Option<Severity>,
    pub actions: Vec<FallbackAction>,
}

#[async_trait]
pub trait ErrorBoundary: Send + Sync {
    /// Catch hook called with the failure and the component trace
    async fn on_error(&self, error: CapturedError, info: ComponentContext);

    /// The panel to show, or `None` while the children render normally
    fn render_fallback(&self) -> Option<FallbackPanel>;

    fn handle(&self, action: FallbackAction) -> BoundaryCommand;
}

/// Boundary that reports through [`ErrorIntelligence::capture_component_error`]
#[derive(Debug)]
pub struct CapturingBoundary {
    intelligence: Arc<ErrorIntelligence>,
    panel: RwLock<Option<FallbackPanel>>,
}

impl CapturingBoundary {
    pub fn new(intelligence: Arc<ErrorIntelligence>) -> Self {
        Self {
            intelligence,
            panel: RwLock::new(None),
        }
    }

    pub fn has_error(&self) -> bool {
        self.panel.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[async_trait]
impl ErrorBoundary for CapturingBoundary {
    async fn on_error(&self, error: CapturedError, info: ComponentContext) {
        let message = error.message.clone();
        let record = self.intelligence.capture_component_error(error, info).await;

        let panel = FallbackPanel {
            message,
            error_id: record.as_ref().map(|r| r.id.clone()),
            category: record.as_ref().map(|r| r.category),
            severity: record.as_ref().map(|r| r.severity),
            actions: vec![FallbackAction::Retry, FallbackAction::Reload],
        };
        *self.panel.write().unwrap_or_else(PoisonError::into_inner) = Some(panel);
    }

    fn render_fallback(&self) -> Option<FallbackPanel> {
        self.panel.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn handle(&self, action: FallbackAction) -> BoundaryCommand {
        match action {
            FallbackAction::Retry => {
                *self.panel.write().unwrap_or_else(PoisonError::into_inner) = None;
                info!("Error boundary reset for retry");
                BoundaryCommand::RenderChildren
            }
            FallbackAction::Reload => BoundaryCommand::ReloadPage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntelligenceConfig;

    fn boundary(config: IntelligenceConfig) -> CapturingBoundary {
        CapturingBoundary::new(Arc::new(ErrorIntelligence::new(config).unwrap()))
    }

    #[tokio::test]
    async fn test_error_renders_panel_with_record_details() {
        let boundary = boundary(IntelligenceConfig::default());
        assert!(boundary.render_fallback().is_none());

        boundary
            .on_error(
                CapturedError::new("Cannot read properties of undefined").with_name("TypeError"),
                ComponentContext::new("at LessonView\nat CoursePage").named("LessonView"),
            )
            .await;

        let panel = boundary.render_fallback().unwrap();
        assert_eq!(panel.message, "Cannot read properties of undefined");
        assert!(panel.error_id.as_deref().unwrap().starts_with("err_"));
        assert_eq!(panel.category, Some(ErrorCategory::Rendering));
        assert_eq!(panel.severity, Some(Severity::Critical));
        assert_eq!(panel.actions, vec![FallbackAction::Retry, FallbackAction::Reload]);
    }

    #[tokio::test]
    async fn test_retry_resets_and_reload_requests_page_reload() {
        let boundary = boundary(IntelligenceConfig::default());
        boundary
            .on_error(CapturedError::new("render failed"), ComponentContext::new("at Widget"))
            .await;
        assert!(boundary.has_error());

        assert_eq!(boundary.handle(FallbackAction::Reload), BoundaryCommand::ReloadPage);
        assert!(boundary.has_error());

        assert_eq!(boundary.handle(FallbackAction::Retry), BoundaryCommand::RenderChildren);
        assert!(boundary.render_fallback().is_none());
    }

    #[tokio::test]
    async fn test_panel_without_monitoring() {
        let boundary = boundary(IntelligenceConfig {
            monitoring_enabled: false,
            ..IntelligenceConfig::default()
        });
        boundary
            .on_error(CapturedError::new("render failed"), ComponentContext::new("at Widget"))
            .await;

        let panel = boundary.render_fallback().unwrap();
        assert!(panel.error_id.is_none());
        assert_eq!(panel.message, "render failed");
    }
}
