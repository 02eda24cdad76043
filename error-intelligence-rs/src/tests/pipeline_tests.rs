//! End-to-end capture scenarios
//!
//! Classification, enrichment, storage and the query surface, driven through
//! the public façade.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::analytics::SystemHealth;
    use crate::capture::{ApiFailure, CaptureContext, CapturedError, StaticEnvironment};
    use crate::config::IntelligenceConfig;
    use crate::insights::{InsightInput, InsightProvider};
    use crate::intelligence::ErrorIntelligence;
    use crate::notification::DeliveryStatus;
    use crate::tests::fast_config;
    use crate::types::{AiInsight, ErrorCategory, InsightKind, Result, Severity};

    fn intelligence(config: IntelligenceConfig) -> ErrorIntelligence {
        ErrorIntelligence::new(config).expect("valid config")
    }

    #[tokio::test]
    async fn test_network_timeout_end_to_end() {
        let intelligence = intelligence(fast_config());

        let record = intelligence
            .capture_exception(CapturedError::new("Network timeout occurred"), None)
            .await
            .unwrap();

        assert_eq!(record.category, ErrorCategory::Network);
        assert_eq!(record.severity, Severity::Low);
        assert!(intelligence.get_errors().iter().any(|r| r.id == record.id));
        assert_eq!(intelligence.get_error(&record.id).unwrap().message, "Network timeout occurred");

        let metrics = intelligence.get_real_time_metrics();
        assert!(metrics.error_types[&ErrorCategory::Network] >= 1);
        assert_eq!(metrics.system_health, SystemHealth::Excellent);
    }

    #[tokio::test]
    async fn test_api_server_error_is_critical() {
        let intelligence = intelligence(fast_config());

        let failure = ApiFailure::new(500, "https://api.example.com/courses/12")
            .with_status_text("Internal Server Error")
            .with_method("GET");
        let record = intelligence.capture_api_error(failure, None).await.unwrap();

        assert_eq!(record.category, ErrorCategory::Api);
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.message, "API Error: 500 Internal Server Error at https://api.example.com/courses/12");
        assert_eq!(record.context["status"], 500);
        assert_eq!(record.context["method"], "GET");
    }

    #[tokio::test]
    async fn test_api_status_drives_severity() {
        let intelligence = intelligence(fast_config());

        let not_found = intelligence
            .capture_api_error(ApiFailure::new(404, "https://api.example.com/lesson/9"), None)
            .await
            .unwrap();
        let forbidden = intelligence
            .capture_api_error(ApiFailure::new(403, "https://api.example.com/admin"), None)
            .await
            .unwrap();

        assert_eq!(not_found.severity, Severity::Low);
        assert_eq!(forbidden.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_repeated_message_gets_pattern_insight() {
        let intelligence = intelligence(fast_config());
        let error = || CapturedError::new("Lesson video failed to load");

        let first = intelligence.capture_exception(error(), None).await.unwrap();
        let second = intelligence.capture_exception(error(), None).await.unwrap();

        assert!(first.insight(InsightKind::Pattern).is_none());
        let pattern = second.insight(InsightKind::Pattern).unwrap();
        assert_eq!(pattern.frequency, Some(1));
        assert_eq!(pattern.confidence, 0.85);
        assert!(second.insight(InsightKind::RootCause).is_some());
        assert!(second.impact.is_some());
        assert!(second.learning_impact.is_some());
    }

    #[tokio::test]
    async fn test_history_evicts_oldest_at_capacity() {
        let intelligence = intelligence(IntelligenceConfig {
            history_capacity: 3,
            ..fast_config()
        });

        let mut ids = Vec::new();
        for i in 0..5 {
            let record = intelligence
                .capture_exception(CapturedError::new(format!("failure {}", i)), None)
                .await
                .unwrap();
            ids.push(record.id);
        }

        let stored: Vec<String> = intelligence.get_errors().into_iter().map(|r| r.id).collect();
        assert_eq!(stored, ids[2..].to_vec());
        assert!(intelligence.get_error(&ids[0]).is_none());
    }

    #[tokio::test]
    async fn test_health_is_critical_only_with_critical_errors() {
        let intelligence = intelligence(fast_config());

        intelligence
            .capture_exception(CapturedError::new("Chunk failed"), None)
            .await
            .unwrap();
        assert_ne!(intelligence.get_real_time_metrics().system_health, SystemHealth::Critical);

        intelligence
            .capture_exception(CapturedError::new("System crash in player"), None)
            .await
            .unwrap();
        let metrics = intelligence.get_real_time_metrics();
        assert_eq!(metrics.system_health, SystemHealth::Critical);
        assert_eq!(metrics.top_errors[0].severity, Severity::Fatal);

        intelligence.clear_errors();
        assert_eq!(intelligence.get_real_time_metrics().system_health, SystemHealth::Excellent);
    }

    #[tokio::test]
    async fn test_disabled_monitoring_captures_nothing() {
        let intelligence = intelligence(IntelligenceConfig {
            monitoring_enabled: false,
            ..fast_config()
        });

        let record = intelligence.capture_exception(CapturedError::new("boom"), None).await;

        assert!(record.is_none());
        assert!(intelligence.get_errors().is_empty());
        assert!(intelligence.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_insights_disabled_skips_enrichment() {
        let intelligence = intelligence(IntelligenceConfig {
            ai_insights_enabled: false,
            ..fast_config()
        });

        let record = intelligence
            .capture_exception(CapturedError::new("boom"), None)
            .await
            .unwrap();

        assert!(record.insights.is_empty());
        assert!(record.impact.is_none());
        assert!(record.learning_impact.is_none());
    }

    #[tokio::test]
    async fn test_environment_and_user_are_recorded() {
        let environment = StaticEnvironment::new("https://learn.example.com/courses/algebra-1/quiz/3", "Mozilla/5.0")
            .with_viewport(1280, 720);
        let intelligence = ErrorIntelligence::builder(fast_config())
            .environment_probe(Arc::new(environment))
            .user_id("learner-7")
            .build()
            .unwrap();

        let record = intelligence
            .capture_exception(
                CapturedError::new("Quiz submission failed"),
                Some(CaptureContext::new().add("questionId", 4)),
            )
            .await
            .unwrap();

        assert_eq!(record.category, ErrorCategory::Assessment);
        assert_eq!(record.url, "https://learn.example.com/courses/algebra-1/quiz/3");
        assert_eq!(record.user_agent, "Mozilla/5.0");
        assert_eq!(record.user_id.as_deref(), Some("learner-7"));
        assert_eq!(record.session_id, intelligence.session_id());
        assert_eq!(record.context["questionId"], 4);
        assert_eq!(record.context["viewport"]["width"], 1280);
        assert_eq!(record.context["educationalContext"]["courseId"], "algebra-1");
        assert!(record.learning_impact.unwrap().assessment_disrupted);
    }

    #[tokio::test]
    async fn test_assessment_page_categorizes_generic_error() {
        let environment = StaticEnvironment::new("https://learn.example.com/quiz/3", "Mozilla/5.0");
        let intelligence = ErrorIntelligence::builder(fast_config())
            .environment_probe(Arc::new(environment))
            .build()
            .unwrap();

        let record = intelligence
            .capture_exception(CapturedError::new("unexpected state"), None)
            .await
            .unwrap();

        assert_eq!(record.category, ErrorCategory::Assessment);
        assert_eq!(record.context["educationalContext"]["isAssessment"], true);
        assert!(record.learning_impact.unwrap().assessment_disrupted);
    }

    #[tokio::test]
    async fn test_context_user_overrides_default_user() {
        let intelligence = ErrorIntelligence::builder(fast_config())
            .user_id("learner-7")
            .build()
            .unwrap();

        let record = intelligence
            .capture_exception(CapturedError::new("boom"), Some(CaptureContext::new().user("instructor-1")))
            .await
            .unwrap();
        assert_eq!(record.user_id.as_deref(), Some("instructor-1"));
    }

    struct FailingProvider;

    #[async_trait]
    impl InsightProvider for FailingProvider {
        async fn generate_insights(&self, _input: InsightInput<'_>) -> Result<Vec<AiInsight>> {
            Err(crate::types::IntelligenceError::Insight("model unavailable".to_string()))
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl InsightProvider for PanickingProvider {
        async fn generate_insights(&self, _input: InsightInput<'_>) -> Result<Vec<AiInsight>> {
            panic!("model crashed");
        }
    }

    #[tokio::test]
    async fn test_failing_provider_still_stores_record() {
        let intelligence = ErrorIntelligence::builder(fast_config())
            .insight_provider(Arc::new(FailingProvider))
            .build()
            .unwrap();

        let record = intelligence
            .capture_exception(CapturedError::new("boom"), None)
            .await
            .unwrap();

        assert!(record.insights.is_empty());
        assert!(record.impact.is_some());
        assert_eq!(intelligence.get_errors().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_provider_keeps_record() {
        let intelligence = ErrorIntelligence::builder(fast_config())
            .insight_provider(Arc::new(PanickingProvider))
            .build()
            .unwrap();

        let record = intelligence
            .capture_exception(CapturedError::new("boom"), None)
            .await
            .unwrap();

        assert!(record.insights.is_empty());
        assert!(record.impact.is_some());
        assert!(record.learning_impact.is_some());
        assert_eq!(intelligence.get_errors().len(), 1);
        assert_eq!(intelligence.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_every_capture_dispatches_a_notification() {
        let intelligence = intelligence(fast_config());

        let record = intelligence
            .capture_exception(CapturedError::new("Lesson content missing"), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let notifications = intelligence.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].context["errorId"], record.id.as_str());
        assert_eq!(notifications[0].delivery_status, DeliveryStatus::Sent);

        assert!(intelligence.acknowledge_notification(&notifications[0].id));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_delivery() {
        let mut config = fast_config();
        config.notification.send_delay = Duration::from_secs(30);
        let intelligence = intelligence(config);
        intelligence.init();

        intelligence
            .capture_exception(CapturedError::new("Fatal error in player"), None)
            .await
            .unwrap();
        intelligence.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let notifications = intelligence.notifications();
        assert_eq!(notifications[0].delivery_status, DeliveryStatus::Pending);
        assert_eq!(notifications[0].escalation.len(), 2);
        assert_eq!(notifications[0].escalation_level, 0);
    }

    #[tokio::test]
    async fn test_analytics_over_captured_errors() {
        let intelligence = intelligence(fast_config());
        for message in ["Network timeout occurred", "Network timeout occurred", "TypeError: x is undefined"] {
            intelligence
                .capture_exception(CapturedError::new(message), None)
                .await
                .unwrap();
        }

        let analytics = intelligence.get_error_analytics();
        assert_eq!(analytics.total_errors, 3);
        assert_eq!(analytics.unique_errors, 2);
        assert_eq!(analytics.critical_errors, 1);
        assert_eq!(analytics.average_resolution_time_secs, 1800);
    }
}
