//! # Configuration
//!
//! Pipeline settings read from the process environment (with `.env`
//! support) or from a `config::Config` under the `error_intelligence` table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::notification::NotificationConfig;
use crate::retry::RetryConfig;
use crate::types::{IntelligenceError, Result};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceConfig {
    /// Master switch; capture calls return `None` when off
    pub monitoring_enabled: bool,
    /// Insights, impact and learning-context enrichment
    pub ai_insights_enabled: bool,
    /// Metrics updates after each capture
    pub realtime_monitoring_enabled: bool,
    /// Redact PII from outbound reports
    pub compliance_mode: bool,
    pub reporting_endpoint: Option<String>,
    pub reporting_token: Option<String>,
    pub history_capacity: usize,
    /// `development`, `staging`, `production`
    pub environment: String,
    pub retry: RetryConfig,
    pub notification: NotificationConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            ai_insights_enabled: true,
            realtime_monitoring_enabled: true,
            compliance_mode: false,
            reporting_endpoint: None,
            reporting_token: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            environment: "development".to_string(),
            retry: RetryConfig::default(),
            notification: NotificationConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Accepts `1`, `true`, `yes`, `on` (any case) as true
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl IntelligenceConfig {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let flag = |key: &str, current: bool| -> Result<bool> {
            match lookup(key) {
                Some(raw) => parse_bool(&raw)
                    .ok_or_else(|| IntelligenceError::Config(format!("{} must be a boolean, got '{}'", key, raw))),
                None => Ok(current),
            }
        };

        config.monitoring_enabled = flag("ERROR_MONITORING_ENABLED", config.monitoring_enabled)?;
        config.ai_insights_enabled = flag("ERROR_AI_INSIGHTS_ENABLED", config.ai_insights_enabled)?;
        config.realtime_monitoring_enabled =
            flag("ERROR_REALTIME_MONITORING_ENABLED", config.realtime_monitoring_enabled)?;
        config.compliance_mode = flag("ERROR_COMPLIANCE_MODE", config.compliance_mode)?;

        config.reporting_endpoint = lookup("ERROR_REPORTING_ENDPOINT").filter(|v| !v.trim().is_empty());
        config.reporting_token = lookup("ERROR_REPORTING_TOKEN").filter(|v| !v.trim().is_empty());

        if let Some(raw) = lookup("ERROR_HISTORY_CAPACITY") {
            config.history_capacity = raw.trim().parse().map_err(|_| {
                IntelligenceError::Config(format!("ERROR_HISTORY_CAPACITY must be a number, got '{}'", raw))
            })?;
        }
        if let Some(env) = lookup("APP_ENV") {
            config.environment = env.trim().to_ascii_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(IntelligenceError::Config("history capacity must be at least 1".to_string()));
        }
        if self.notification.capacity == 0 {
            return Err(IntelligenceError::Config("notification capacity must be at least 1".to_string()));
        }
        if let Some(endpoint) = &self.reporting_endpoint {
            reqwest::Url::parse(endpoint)
                .map_err(|e| IntelligenceError::Config(format!("invalid reporting endpoint '{}': {}", endpoint, e)))?;
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl TryFrom<config::Config> for IntelligenceConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = IntelligenceConfig::default();

        if let Ok(v) = cfg.get::<bool>("error_intelligence.monitoring_enabled") {
            base.monitoring_enabled = v;
        }
        if let Ok(v) = cfg.get::<bool>("error_intelligence.ai_insights_enabled") {
            base.ai_insights_enabled = v;
        }
        if let Ok(v) = cfg.get::<bool>("error_intelligence.realtime_monitoring_enabled") {
            base.realtime_monitoring_enabled = v;
        }
        if let Ok(v) = cfg.get::<bool>("error_intelligence.compliance_mode") {
            base.compliance_mode = v;
        }
        if let Ok(v) = cfg.get::<String>("error_intelligence.reporting_endpoint") {
            base.reporting_endpoint = Some(v);
        }
        if let Ok(v) = cfg.get::<String>("error_intelligence.reporting_token") {
            base.reporting_token = Some(v);
        }
        if let Ok(v) = cfg.get::<usize>("error_intelligence.history_capacity") {
            base.history_capacity = v;
        }
        if let Ok(v) = cfg.get::<String>("error_intelligence.environment") {
            base.environment = v;
        }
        if let Ok(ms) = cfg.get::<u64>("error_intelligence.retry_base_delay_ms") {
            base.retry.base_backoff = Duration::from_millis(ms);
        }
        if let Ok(attempts) = cfg.get::<u32>("error_intelligence.retry_max_attempts") {
            base.retry.max_attempts = attempts;
        }
        if let Ok(ms) = cfg.get::<u64>("error_intelligence.notification_delay_ms") {
            base.notification.send_delay = Duration::from_millis(ms);
        }
        if let Ok(secs) = cfg.get::<u64>("error_intelligence.escalation_first_secs") {
            base.notification.first_escalation = Duration::from_secs(secs);
        }
        if let Ok(secs) = cfg.get::<u64>("error_intelligence.escalation_second_secs") {
            base.notification.second_escalation = Duration::from_secs(secs);
        }
        if let Ok(v) = cfg.get::<usize>("error_intelligence.notification_capacity") {
            base.notification.capacity = v;
        }
        if let Ok(secs) = cfg.get::<u64>("error_intelligence.circuit_reset_secs") {
            base.circuit_breaker.reset_timeout = Duration::from_secs(secs);
        }

        base.validate().map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IntelligenceConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.monitoring_enabled);
        assert!(config.ai_insights_enabled);
        assert!(!config.compliance_mode);
        assert_eq!(config.history_capacity, 1000);
        assert!(config.is_development());
        assert_eq!(config.notification.send_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_environment_overrides() {
        let config = IntelligenceConfig::from_lookup(lookup(&[
            ("ERROR_MONITORING_ENABLED", "off"),
            ("ERROR_COMPLIANCE_MODE", "YES"),
            ("ERROR_REPORTING_ENDPOINT", "https://telemetry.example.com/errors"),
            ("ERROR_REPORTING_TOKEN", "abc"),
            ("ERROR_HISTORY_CAPACITY", "25"),
            ("APP_ENV", "Production"),
        ]))
        .unwrap();

        assert!(!config.monitoring_enabled);
        assert!(config.compliance_mode);
        assert_eq!(config.reporting_token.as_deref(), Some("abc"));
        assert_eq!(config.history_capacity, 25);
        assert!(config.is_production());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(IntelligenceConfig::from_lookup(lookup(&[("ERROR_AI_INSIGHTS_ENABLED", "maybe")])).is_err());
        assert!(IntelligenceConfig::from_lookup(lookup(&[("ERROR_HISTORY_CAPACITY", "0")])).is_err());
        assert!(IntelligenceConfig::from_lookup(lookup(&[("ERROR_REPORTING_ENDPOINT", "not a url")])).is_err());
    }

    #[test]
    fn test_try_from_config() {
        let cfg = config::Config::builder()
            .set_override("error_intelligence.ai_insights_enabled", false)
            .unwrap()
            .set_override("error_intelligence.history_capacity", 50)
            .unwrap()
            .set_override("error_intelligence.notification_delay_ms", 10)
            .unwrap()
            .build()
            .unwrap();

        let config = IntelligenceConfig::try_from(cfg).unwrap();
        assert!(!config.ai_insights_enabled);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.notification.send_delay, Duration::from_millis(10));
        assert!(config.monitoring_enabled);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" On "), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }
}
