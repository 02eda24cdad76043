//! Pipeline scenarios for the error intelligence façade
//!
//! Each module drives `ErrorIntelligence` end to end with shortened timers.

pub mod pipeline_tests;
pub mod remediation_tests;

use std::time::Duration;

use crate::config::IntelligenceConfig;
use crate::notification::NotificationConfig;
use crate::retry::RetryConfig;

/// Default configuration with millisecond timers
pub(crate) fn fast_config() -> IntelligenceConfig {
    IntelligenceConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
        },
        notification: NotificationConfig {
            send_delay: Duration::from_millis(5),
            ..NotificationConfig::default()
        },
        ..IntelligenceConfig::default()
    }
}
