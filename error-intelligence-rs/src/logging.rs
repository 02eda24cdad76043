//! # Structured Logging
//!
//! Subscriber setup for hosts that do not install their own, and the
//! development console log of captured records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::types::{ErrorRecord, IntelligenceError, Result, Severity};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

// dropping the guard stops the file writer
static FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub service_name: String,
    pub json_format: bool,
    /// Also write to a daily rolling file in `log_dir`
    pub file_output: bool,
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "error-intelligence".to_string(),
            json_format: true,
            file_output: false,
            log_dir: None,
        }
    }
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(json) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }

        Ok(base)
    }
}

/// Installs the global subscriber; later calls are no-ops
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", config.level)));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!config.json_format).then(|| fmt::layer().with_target(true).with_thread_names(true));

    let file_layer = match (config.file_output, config.log_dir.as_deref()) {
        (true, Some(dir)) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, format!("{}.log", config.service_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            *FILE_GUARD.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        _ => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| IntelligenceError::Initialization(format!("Failed to set global subscriber: {}", e)))?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Logs a captured record at a level matching its severity
pub fn log_record(record: &ErrorRecord) {
    let insights = record.insights.len();
    match record.severity {
        Severity::Fatal | Severity::Critical | Severity::High => error!(
            error_id = %record.id,
            severity = %record.severity,
            category = %record.category,
            url = %record.url,
            insights,
            error_message = %record.message,
            "Captured error"
        ),
        Severity::Medium => warn!(
            error_id = %record.id,
            severity = %record.severity,
            category = %record.category,
            url = %record.url,
            insights,
            error_message = %record.message,
            "Captured error"
        ),
        Severity::Low => info!(
            error_id = %record.id,
            severity = %record.severity,
            category = %record.category,
            url = %record.url,
            insights,
            error_message = %record.message,
            "Captured error"
        ),
    }
}
