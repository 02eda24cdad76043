use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerfMonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PerfMonitorError {
    fn from(err: serde_json::Error) -> Self {
        PerfMonitorError::Serialization(err.to_string())
    }
}

pub type Result<T, E = PerfMonitorError> = std::result::Result<T, E>;
