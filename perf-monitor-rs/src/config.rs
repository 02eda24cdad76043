//! Monitor settings read from the process environment.

use std::time::Duration;

use crate::error::{PerfMonitorError, Result};

pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub enabled: bool,
    /// Where batch reports are posted; no reporting without it
    pub endpoint: Option<String>,
    /// `development`, `staging`, `production`
    pub environment: String,
    pub report_interval: Duration,
    pub memory_sample_interval: Duration,
    pub buffer_capacity: usize,
    /// Metrics included in one report
    pub report_batch: usize,
    /// Metrics kept after a successful report
    pub retain_after_report: usize,
    pub slow_resource_threshold_ms: f64,
    pub request_timeout: Duration,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            environment: "development".to_string(),
            report_interval: Duration::from_secs(300),
            memory_sample_interval: Duration::from_secs(30),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            report_batch: 100,
            retain_after_report: 50,
            slow_resource_threshold_ms: 1000.0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl PerformanceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PERFORMANCE_MONITORING_ENABLED") {
            config.enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(PerfMonitorError::Config(format!(
                        "PERFORMANCE_MONITORING_ENABLED must be a boolean, got '{}'",
                        raw
                    )))
                }
            };
        }
        config.endpoint = lookup("PERFORMANCE_MONITORING_ENDPOINT").filter(|v| !v.trim().is_empty());
        if let Some(env) = lookup("APP_ENV") {
            config.environment = env.trim().to_ascii_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PerfMonitorError::Config("buffer capacity must be at least 1".to_string()));
        }
        if self.retain_after_report > self.buffer_capacity {
            return Err(PerfMonitorError::Config(format!(
                "cannot retain {} metrics in a buffer of {}",
                self.retain_after_report, self.buffer_capacity
            )));
        }
        if let Some(endpoint) = &self.endpoint {
            reqwest::Url::parse(endpoint)
                .map_err(|e| PerfMonitorError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Periodic reports run only in production with an endpoint set
    pub fn reporting_active(&self) -> bool {
        self.enabled && self.is_production() && self.endpoint.is_some()
    }
}
