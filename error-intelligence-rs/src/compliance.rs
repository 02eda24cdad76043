//! # Compliance
//!
//! PII scanning over stored error records and the per-regime compliance
//! report. The same scanner redacts outbound reports in compliance mode.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{ErrorRecord, IntelligenceError, Severity};

static SSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("SSN pattern is valid"));

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern is valid")
});

static CREDIT_CARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}[- ]?){3}\d{4}\b").expect("credit card pattern is valid")
});

/// Regulatory regime a report is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceKind {
    Gdpr,
    Ferpa,
    Coppa,
    Soc2,
}

impl ComplianceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceKind::Gdpr => "gdpr",
            ComplianceKind::Ferpa => "ferpa",
            ComplianceKind::Coppa => "coppa",
            ComplianceKind::Soc2 => "soc2",
        }
    }
}

impl fmt::Display for ComplianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceKind {
    type Err = IntelligenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gdpr" => Ok(ComplianceKind::Gdpr),
            "ferpa" => Ok(ComplianceKind::Ferpa),
            "coppa" => Ok(ComplianceKind::Coppa),
            "soc2" => Ok(ComplianceKind::Soc2),
            other => Err(IntelligenceError::Config(format!("unknown compliance regime: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Ssn,
    Email,
    CreditCard,
}

impl PiiKind {
    fn pattern(&self) -> &'static Regex {
        match self {
            PiiKind::Ssn => &*SSN_PATTERN,
            PiiKind::Email => &*EMAIL_PATTERN,
            PiiKind::CreditCard => &*CREDIT_CARD_PATTERN,
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            PiiKind::Ssn => "[REDACTED_SSN]",
            PiiKind::Email => "[REDACTED_EMAIL]",
            PiiKind::CreditCard => "[REDACTED_CARD]",
        }
    }

    /// How serious this kind of leak is under `regime`
    pub fn severity_under(&self, regime: ComplianceKind) -> Severity {
        match (self, regime) {
            (PiiKind::Ssn, _) | (PiiKind::CreditCard, _) => Severity::Critical,
            (PiiKind::Email, ComplianceKind::Gdpr | ComplianceKind::Coppa) => Severity::Critical,
            (PiiKind::Email, ComplianceKind::Ferpa | ComplianceKind::Soc2) => Severity::High,
        }
    }
}

/// Scans and redacts the PII patterns the compliance report looks for
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiScanner;

impl PiiScanner {
    // card before SSN so the longer match is replaced whole
    const ORDER: [PiiKind; 3] = [PiiKind::CreditCard, PiiKind::Ssn, PiiKind::Email];

    pub fn new() -> Self {
        Self
    }

    /// Kinds of PII present in `text`
    pub fn scan(&self, text: &str) -> Vec<PiiKind> {
        Self::ORDER
            .iter()
            .copied()
            .filter(|kind| kind.pattern().is_match(text))
            .collect()
    }

    pub fn redact(&self, text: &str) -> String {
        Self::ORDER.iter().fold(text.to_string(), |acc, kind| {
            kind.pattern().replace_all(&acc, kind.placeholder()).into_owned()
        })
    }

    /// Copy of `record` with PII removed from every free-text field
    pub fn redact_record(&self, record: &ErrorRecord) -> ErrorRecord {
        let mut redacted = record.clone();
        redacted.message = self.redact(&record.message);
        redacted.stack = record.stack.as_deref().map(|s| self.redact(s));
        redacted.url = self.redact(&record.url);
        for value in redacted.context.values_mut() {
            self.redact_value(value);
        }
        redacted
    }

    fn redact_value(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::String(s) => *s = self.redact(s),
            serde_json::Value::Array(items) => items.iter_mut().for_each(|v| self.redact_value(v)),
            serde_json::Value::Object(map) => map.values_mut().for_each(|v| self.redact_value(v)),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Compliant,
    Warning,
    Violation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceFinding {
    pub error_id: String,
    pub pii: PiiKind,
    /// `message` or `context.<key>`
    pub location: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    #[serde(rename = "type")]
    pub kind: ComplianceKind,
    pub status: ComplianceStatus,
    pub findings: Vec<ComplianceFinding>,
    pub records_scanned: usize,
    pub generated_at: DateTime<Utc>,
}

pub fn generate_compliance_report<'a, I>(kind: ComplianceKind, records: I) -> ComplianceReport
where
    I: IntoIterator<Item = &'a ErrorRecord>,
{
    let scanner = PiiScanner::new();
    let mut findings = Vec::new();
    let mut records_scanned = 0;

    for record in records {
        records_scanned += 1;

        let mut locations = vec![("message".to_string(), record.message.clone())];
        for (key, value) in &record.context {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            locations.push((format!("context.{}", key), text));
        }

        for (location, text) in locations {
            for pii in scanner.scan(&text) {
                findings.push(ComplianceFinding {
                    error_id: record.id.clone(),
                    pii,
                    location: location.clone(),
                    severity: pii.severity_under(kind),
                });
            }
        }
    }

    let status = if findings.iter().any(|f| f.severity == Severity::Critical) {
        ComplianceStatus::Violation
    } else if findings.iter().any(|f| f.severity == Severity::High) {
        ComplianceStatus::Warning
    } else {
        ComplianceStatus::Compliant
    };

    ComplianceReport {
        kind,
        status,
        findings,
        records_scanned,
        generated_at: Utc::now(),
    }
}
