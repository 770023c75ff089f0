//! Notification delivery records, dispatch input and statistics.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use super::Priority;
use crate::error::{AppError, AppResult};

// =============================================================================
// Notification Status Enum
// =============================================================================

/// Delivery status of a notification record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Recipient Descriptor
// =============================================================================

/// A concrete, addressable recipient for one channel.
///
/// The textual form is `user:<id>` for directory users; anything else is a
/// literal address (email, chat id, ...) owned by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    User(i32),
    Custom(String),
}

impl Recipient {
    /// Parses a descriptor such as `user:42` or `ops@example.com`
    pub fn parse(descriptor: &str) -> Self {
        match descriptor.strip_prefix("user:") {
            Some(id) => match id.trim().parse() {
                Ok(id) => Recipient::User(id),
                Err(_) => Recipient::Custom(descriptor.to_string()),
            },
            None => Recipient::Custom(descriptor.to_string()),
        }
    }

    /// Rebuilds a recipient from its persisted type/id columns
    pub fn from_parts(recipient_type: &str, recipient_id: &str) -> Self {
        match recipient_type {
            "user" => match recipient_id.parse() {
                Ok(id) => Recipient::User(id),
                Err(_) => Recipient::Custom(recipient_id.to_string()),
            },
            _ => Recipient::Custom(recipient_id.to_string()),
        }
    }

    pub fn recipient_type(&self) -> &'static str {
        match self {
            Recipient::User(_) => "user",
            Recipient::Custom(_) => "custom",
        }
    }

    pub fn recipient_id(&self) -> String {
        match self {
            Recipient::User(id) => id.to_string(),
            Recipient::Custom(value) => value.clone(),
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "user:{}", id),
            Recipient::Custom(value) => write!(f, "{}", value),
        }
    }
}

// =============================================================================
// Notification Model
// =============================================================================

/// Persisted delivery record, one per (rule, channel, recipient)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub rule_id: Option<i32>,
    pub module_code: String,
    pub event_type: String,
    pub event_id: Option<i64>,
    pub priority: Priority,
    pub channel: String,
    pub recipient_type: String,
    pub recipient_id: String,
    pub subject: String,
    pub body: String,
    pub metadata: Value,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn recipient(&self) -> Recipient {
        Recipient::from_parts(&self.recipient_type, &self.recipient_id)
    }
}

/// Insert payload for a pending notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub rule_id: Option<i32>,
    pub module_code: String,
    pub event_type: String,
    pub event_id: Option<i64>,
    pub priority: Priority,
    pub channel: String,
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
    pub metadata: Value,
}

// =============================================================================
// Dispatch Input / Output
// =============================================================================

/// An emitted domain event to dispatch. Not persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEvent {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub event_id: Option<i64>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub force_channels: Option<Vec<String>>,
    #[serde(default)]
    pub force_recipients: Option<Vec<String>>,
}

impl NotificationEvent {
    pub fn new(module: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_event_id(mut self, event_id: i64) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.data = map;
        }
        self
    }

    /// Bypasses rule matching and sends straight to these channels/recipients
    pub fn forced(mut self, channels: Vec<String>, recipients: Vec<String>) -> Self {
        self.force_channels = Some(channels);
        self.force_recipients = Some(recipients);
        self
    }

    /// Module and event are mandatory
    pub fn validate(&self) -> AppResult<()> {
        if self.module.trim().is_empty() {
            return Err(AppError::Validation("module is required".to_string()));
        }
        if self.event.trim().is_empty() {
            return Err(AppError::Validation("event is required".to_string()));
        }
        Ok(())
    }

    /// Forced channels and recipients, only when both lists are non-empty
    pub fn forced_targets(&self) -> Option<(&[String], &[String])> {
        match (&self.force_channels, &self.force_recipients) {
            (Some(channels), Some(recipients))
                if !channels.is_empty() && !recipients.is_empty() =>
            {
                Some((channels, recipients))
            }
            _ => None,
        }
    }
}

/// Aggregate result of one dispatch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub fn success(notification_ids: Vec<i64>) -> Self {
        Self {
            success: true,
            count: Some(notification_ids.len()),
            notification_ids: Some(notification_ids),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            notification_ids: None,
            count: None,
            error: Some(error.into()),
        }
    }

    /// Number of notifications created, zero on failure
    pub fn count(&self) -> usize {
        self.count.unwrap_or(0)
    }

    pub fn ids(&self) -> &[i64] {
        self.notification_ids.as_deref().unwrap_or(&[])
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Filter for notification statistics. Dates are inclusive calendar days (UTC).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsFilter {
    pub module: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl StatsFilter {
    pub fn for_module(module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            ..Default::default()
        }
    }

    /// Module filter with blank values treated as absent
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Inclusive lower bound: start of `date_from`
    pub fn from_bound(&self) -> Option<DateTime<Utc>> {
        self.date_from
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// Exclusive upper bound: start of the day after `date_to`
    pub fn to_bound(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChannelCount {
    pub channel: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ModuleCount {
    pub module: String,
    pub count: i64,
}

/// Read-only aggregation over persisted notifications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_channel: Vec<ChannelCount>,
    pub by_module: Vec<ModuleCount>,
}

/// Query parameters for listing notifications
#[derive(Debug, Clone, Deserialize)]
pub struct ListNotificationsQuery {
    pub module: Option<String>,
    pub status: Option<NotificationStatus>,
    pub channel: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    crate::pagination::PAGE_SIZE
}
