//! Remediation as triggered from captures

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::capture::{ApiFailure, CapturedError};
    use crate::circuit_breaker::CircuitState;
    use crate::degradation::NON_ESSENTIAL_FEATURES;
    use crate::intelligence::ErrorIntelligence;
    use crate::remediation::RemediationStatus;
    use crate::retry::{recovery, RecoveryOperation};
    use crate::tests::fast_config;
    use crate::types::{ErrorCategory, Severity};

    fn counting_recovery(calls: Arc<AtomicU32>) -> RecoveryOperation {
        recovery(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_network_retry_runs_for_low_severity() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let record = intelligence
            .capture_exception_with_recovery(
                CapturedError::new("Network request failed"),
                None,
                counting_recovery(calls.clone()),
            )
            .await
            .unwrap();

        assert_eq!(record.category, ErrorCategory::Network);
        assert_eq!(record.severity, Severity::Low);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let action = intelligence
            .remediation_actions()
            .into_iter()
            .find(|a| a.id == "network-retry")
            .unwrap();
        assert!(action.last_executed.is_some());
    }

    #[tokio::test]
    async fn test_network_retry_skips_critical() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let record = intelligence
            .capture_exception_with_recovery(
                CapturedError::new("network fetch aborted").with_name("TypeError"),
                None,
                counting_recovery(calls.clone()),
            )
            .await
            .unwrap();

        assert_eq!(record.category, ErrorCategory::Network);
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_recovery_marks_action_failed_without_failing_capture() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();
        let op = recovery(|| async { Err("still offline".to_string()) });

        let record = intelligence
            .capture_exception_with_recovery(CapturedError::new("Network request failed"), None, op)
            .await;

        assert!(record.is_some());
        let action = intelligence
            .remediation_actions()
            .into_iter()
            .find(|a| a.id == "network-retry")
            .unwrap();
        assert_eq!(action.status, RemediationStatus::Failed);

        assert!(intelligence.remediation().resume("network-retry"));
        assert_eq!(
            intelligence.remediation().action("network-retry").unwrap().status,
            RemediationStatus::Active
        );
    }

    #[tokio::test]
    async fn test_panicking_recovery_still_stores_and_notifies() {
        fn reload_lesson() -> Result<(), String> {
            panic!("lesson cache corrupted")
        }
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();
        let op = recovery(|| async { reload_lesson() });

        let record = intelligence
            .capture_exception_with_recovery(CapturedError::new("Network request failed"), None, op)
            .await;

        assert!(record.is_some());
        assert_eq!(intelligence.get_errors().len(), 1);
        assert_eq!(
            intelligence.remediation().action("network-retry").unwrap().status,
            RemediationStatus::Failed
        );
        assert_eq!(intelligence.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_api_failures_open_circuit() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();

        for _ in 0..4 {
            intelligence
                .capture_api_error(ApiFailure::new(502, "https://api.example.com/progress"), None)
                .await
                .unwrap();
        }
        assert_eq!(intelligence.circuit_breaker().state("api"), CircuitState::Closed);

        intelligence
            .capture_api_error(ApiFailure::new(502, "https://api.example.com/progress"), None)
            .await
            .unwrap();
        assert_eq!(intelligence.circuit_breaker().state("api"), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_degradation_modes_from_captures() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();

        intelligence
            .capture_exception(CapturedError::new("Slow frame budget exceeded"), None)
            .await
            .unwrap();
        assert!(intelligence.degraded_mode().is_active(NON_ESSENTIAL_FEATURES));

        intelligence
            .capture_exception(
                CapturedError::new("Cannot render component").with_name("TypeError"),
                None,
            )
            .await
            .unwrap();
        assert!(intelligence.degraded_mode().is_active("fallback_ui:rendering"));
    }

    #[tokio::test]
    async fn test_security_error_notifies_security_team() {
        let intelligence = ErrorIntelligence::new(fast_config()).unwrap();

        intelligence
            .capture_exception(CapturedError::new("Blocked by content security policy"), None)
            .await
            .unwrap();

        let notifications = intelligence.notifications();
        // one from the escalation action, one from the pipeline
        assert_eq!(notifications.len(), 2);
        assert!(notifications
            .iter()
            .all(|n| n.recipients.contains(&"security-team".to_string())));
        assert!(notifications
            .iter()
            .any(|n| n.context.get("triggeredBy").is_some()));
    }
}
