//! # Smart Notifications
//!
//! Builds a notification per triggering record, delivers it through a
//! [`NotificationTransport`] after a short delay and runs the escalation
//! tiers for critical errors as scheduled timers.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::history::{BoundedMap, Keyed};
use crate::scheduler::TaskScheduler;
use crate::types::{ErrorCategory, ErrorRecord, IntelligenceError, Result, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Error,
    Warning,
    Info,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Acknowledged,
}

/// One delayed tier of additional recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationStep {
    pub delay_secs: u64,
    pub recipients: Vec<String>,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub recipients: Vec<String>,
    pub message: String,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub priority: u8,
    pub escalation: Vec<EscalationStep>,
    pub sent: bool,
    pub delivery_status: DeliveryStatus,
    /// Highest escalation level delivered so far, 0 when none
    pub escalation_level: u8,
    pub created_at: DateTime<Utc>,
}

impl Keyed for SmartNotification {
    fn key(&self) -> &str {
        &self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Delivery channel for notifications
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, notification: &SmartNotification, recipients: &[String]) -> Result<()>;

    fn name(&self) -> &str;
}

/// Writes notifications to the log; the default when no gateway is configured
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn deliver(&self, notification: &SmartNotification, recipients: &[String]) -> Result<()> {
        info!(
            notification_id = %notification.id,
            kind = ?notification.notification_type,
            priority = notification.priority,
            recipients = ?recipients,
            text = %notification.message,
            "Notification delivered"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Posts notifications as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    async fn deliver(&self, notification: &SmartNotification, recipients: &[String]) -> Result<()> {
        let payload = serde_json::json!({
            "id": notification.id,
            "type": notification.notification_type,
            "priority": notification.priority,
            "message": notification.message,
            "recipients": recipients,
            "context": notification.context,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(IntelligenceError::Notification(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Delay before the first delivery attempt
    pub send_delay: Duration,
    pub first_escalation: Duration,
    pub second_escalation: Duration,
    /// Notifications retained in memory
    pub capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_secs(1),
            first_escalation: Duration::from_secs(5 * 60),
            second_escalation: Duration::from_secs(15 * 60),
            capacity: 500,
        }
    }
}

fn notification_type(severity: Severity) -> NotificationType {
    match severity {
        Severity::Fatal | Severity::Critical => NotificationType::Critical,
        Severity::High => NotificationType::Error,
        Severity::Medium => NotificationType::Warning,
        Severity::Low => NotificationType::Info,
    }
}

fn priority(record: &ErrorRecord) -> u8 {
    let base = match record.severity {
        Severity::Low => 1,
        Severity::Medium => 3,
        Severity::High => 5,
        Severity::Critical => 8,
        Severity::Fatal => 10,
    };
    if record.category == ErrorCategory::Assessment {
        base + 2
    } else {
        base
    }
}

fn recipients(record: &ErrorRecord) -> Vec<String> {
    let mut recipients = vec!["dev-team".to_string()];
    if record.severity.rank() >= Severity::High.rank() {
        recipients.push("on-call-engineer".to_string());
    }
    match record.category {
        ErrorCategory::Assessment => recipients.push("assessment-team".to_string()),
        ErrorCategory::Security => recipients.push("security-team".to_string()),
        _ => {}
    }
    recipients
}

pub struct NotificationDispatcher {
    config: NotificationConfig,
    store: Arc<RwLock<BoundedMap<SmartNotification>>>,
    transport: Arc<dyn NotificationTransport>,
    scheduler: Arc<TaskScheduler>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(
        config: NotificationConfig,
        transport: Arc<dyn NotificationTransport>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        let store = Arc::new(RwLock::new(BoundedMap::new(config.capacity)));
        Self {
            config,
            store,
            transport,
            scheduler,
        }
    }

    fn escalation_plan(&self, severity: Severity) -> Vec<EscalationStep> {
        if !severity.is_critical() {
            return Vec::new();
        }
        vec![
            EscalationStep {
                delay_secs: self.config.first_escalation.as_secs(),
                recipients: vec!["engineering-lead".to_string()],
                level: 1,
            },
            EscalationStep {
                delay_secs: self.config.second_escalation.as_secs(),
                recipients: vec!["engineering-director".to_string()],
                level: 2,
            },
        ]
    }

    /// Builds, stores and schedules delivery of a notification for `record`
    pub fn send_smart_notification(&self, record: &ErrorRecord, triggered_by: Option<&str>) -> SmartNotification {
        let mut context = serde_json::Map::new();
        context.insert("errorId".into(), record.id.clone().into());
        context.insert("category".into(), record.category.as_str().into());
        context.insert("severity".into(), record.severity.as_str().into());
        if let Some(trigger) = triggered_by {
            context.insert("triggeredBy".into(), trigger.into());
        }

        let notification = SmartNotification {
            id: format!("notif_{}", Uuid::new_v4().simple()),
            notification_type: notification_type(record.severity),
            recipients: recipients(record),
            message: format!("[{}] {} error: {}", record.severity, record.category, record.message),
            context,
            priority: priority(record),
            escalation: self.escalation_plan(record.severity),
            sent: false,
            delivery_status: DeliveryStatus::Pending,
            escalation_level: 0,
            created_at: Utc::now(),
        };

        {
            let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
            store.insert(notification.clone());
        }
        counter!("error_intelligence.notifications.created", 1, "severity" => record.severity.as_str());

        self.schedule_delivery(&notification);
        for step in &notification.escalation {
            self.schedule_escalation(&notification.id, step.clone());
        }

        notification
    }

    fn schedule_delivery(&self, notification: &SmartNotification) {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let id = notification.id.clone();

        self.scheduler.schedule_after(self.config.send_delay, async move {
            let Some(snapshot) = read(&store, &id) else {
                return;
            };

            let status = match transport.deliver(&snapshot, &snapshot.recipients).await {
                Ok(()) => DeliveryStatus::Sent,
                Err(e) => {
                    warn!(notification_id = %id, transport = transport.name(), error = %e, "Notification delivery failed");
                    DeliveryStatus::Failed
                }
            };

            let mut store = store.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(n) = store.get_mut(&id) {
                // an acknowledgement that raced the delivery wins
                if n.delivery_status == DeliveryStatus::Pending {
                    n.delivery_status = status;
                }
                n.sent = status == DeliveryStatus::Sent || n.sent;
            }
        });
    }

    fn schedule_escalation(&self, id: &str, step: EscalationStep) {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let id = id.to_string();

        self.scheduler.schedule_after(Duration::from_secs(step.delay_secs), async move {
            let Some(snapshot) = read(&store, &id) else {
                return;
            };
            if snapshot.delivery_status == DeliveryStatus::Acknowledged {
                debug!(notification_id = %id, level = step.level, "Escalation skipped, acknowledged");
                return;
            }

            match transport.deliver(&snapshot, &step.recipients).await {
                Ok(()) => {
                    counter!("error_intelligence.notifications.escalated", 1);
                    info!(notification_id = %id, level = step.level, recipients = ?step.recipients, "Notification escalated");
                    let mut store = store.write().unwrap_or_else(PoisonError::into_inner);
                    if let Some(n) = store.get_mut(&id) {
                        n.escalation_level = n.escalation_level.max(step.level);
                    }
                }
                Err(e) => {
                    warn!(notification_id = %id, level = step.level, error = %e, "Escalation delivery failed");
                }
            }
        });
    }

    /// Marks a notification as acknowledged, which stops further escalation
    pub fn acknowledge(&self, id: &str) -> bool {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        match store.get_mut(id) {
            Some(n) => {
                n.delivery_status = DeliveryStatus::Acknowledged;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SmartNotification> {
        read(&self.store, id)
    }

    /// All retained notifications, oldest first
    pub fn notifications(&self) -> Vec<SmartNotification> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.iter().cloned().collect()
    }
}

fn read(store: &RwLock<BoundedMap<SmartNotification>>, id: &str) -> Option<SmartNotification> {
    let store = store.read().unwrap_or_else(PoisonError::into_inner);
    store.get(id).cloned()
}
