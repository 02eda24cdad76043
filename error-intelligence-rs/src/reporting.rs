//! # Error Reporting
//!
//! Posts each stored record to the configured collection endpoint. One
//! request per record, no batching and no retry; the caller decides what a
//! failure means.

use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compliance::PiiScanner;
use crate::types::{ErrorRecord, IntelligenceError, Result};

/// Configuration for the outbound reporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Collection endpoint; reporting is off without one
    pub endpoint: Option<String>,
    /// Sent as `Authorization: Bearer <token>`
    pub auth_token: Option<String>,
    pub timeout: Duration,
    /// Redact PII from the body before sending
    pub redact_pii: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_token: None,
            timeout: Duration::from_secs(10),
            redact_pii: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    config: ReporterConfig,
    client: reqwest::Client,
    scanner: PiiScanner,
}

impl ErrorReporter {
    pub fn new(config: ReporterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IntelligenceError::Initialization(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            scanner: PiiScanner::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.endpoint.is_some()
    }

    /// Sends `record` to the endpoint; a no-op when none is configured
    pub async fn report(&self, record: &ErrorRecord) -> Result<()> {
        let Some(endpoint) = self.config.endpoint.as_deref() else {
            return Ok(());
        };

        let body = if self.config.redact_pii {
            self.scanner.redact_record(record)
        } else {
            record.clone()
        };

        let mut request = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Error reading response".to_string());
            counter!("error_intelligence.reports.failed", 1);
            return Err(IntelligenceError::Http(format!(
                "Error reporting failed: HTTP {} - {}",
                status, text
            )));
        }

        counter!("error_intelligence.reports.sent", 1);
        debug!(error_id = %record.id, endpoint = %endpoint, "Error report delivered");
        Ok(())
    }
}
