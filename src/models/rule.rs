//! Notification rule models.
//!
//! Rules are stored with JSONB columns for their conditions, channel list and
//! per-channel recipient configuration. The raw row is converted into a typed
//! [`NotificationRule`] once, when it is loaded, so matching never re-parses
//! JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::collections::HashMap;

// =============================================================================
// Priority Enum
// =============================================================================

/// Priority of an event or rule
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Recipient Configuration
// =============================================================================

/// Abstract recipient specification for one channel of a rule.
///
/// Serialized as `{"type": "role", "roles": [...]}`,
/// `{"type": "user", "users": [...]}` or `{"type": "custom", "custom": [...]}`.
/// A missing or unknown `type` deserializes to a role config with no roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", from = "RawRecipientConfig")]
pub enum RecipientConfig {
    /// Every active user holding one of the roles
    Role { roles: Vec<String> },
    /// Explicit user ids
    User { users: Vec<i32> },
    /// Literal addresses passed through unchanged
    Custom { custom: Vec<String> },
}

impl Default for RecipientConfig {
    fn default() -> Self {
        RecipientConfig::Role { roles: Vec::new() }
    }
}

#[derive(Deserialize)]
struct RawRecipientConfig {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    users: Vec<i32>,
    #[serde(default)]
    custom: Vec<String>,
}

impl From<RawRecipientConfig> for RecipientConfig {
    fn from(raw: RawRecipientConfig) -> Self {
        match raw.kind.as_deref() {
            Some("user") => RecipientConfig::User { users: raw.users },
            Some("custom") => RecipientConfig::Custom { custom: raw.custom },
            Some("role") => RecipientConfig::Role { roles: raw.roles },
            _ => RecipientConfig::default(),
        }
    }
}

// =============================================================================
// Message Template
// =============================================================================

/// Subject and body templates with `{{placeholder}}` tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub subject: Option<String>,
    pub body: Option<String>,
}

// =============================================================================
// Notification Rule Model
// =============================================================================

/// Raw rule row as stored in `notification_rules`
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRuleRow {
    pub id: i32,
    pub name: String,
    pub module_code: String,
    pub event_type: String,
    pub conditions: Value,
    pub channels: Value,
    pub recipients: Value,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub priority: Priority,
    pub execution_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Administrator-configured routing policy
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRule {
    pub id: i32,
    pub name: String,
    pub module_code: String,
    pub event_type: String,
    /// Key/value equality tests against event data; empty always matches
    pub conditions: Map<String, Value>,
    /// Stored conditions could not be read; the rule never matches
    pub malformed_conditions: bool,
    /// Target channels in processing order
    pub channels: Vec<String>,
    /// Recipient specification keyed by channel name
    pub recipients: HashMap<String, RecipientConfig>,
    pub template: MessageTemplate,
    pub priority: Priority,
    pub execution_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRule {
    /// Recipient config for a channel, or an empty one when not configured
    pub fn recipients_for(&self, channel: &str) -> RecipientConfig {
        self.recipients.get(channel).cloned().unwrap_or_default()
    }
}

impl From<NotificationRuleRow> for NotificationRule {
    fn from(row: NotificationRuleRow) -> Self {
        let (conditions, malformed_conditions) = match parse_conditions(row.conditions.clone()) {
            Some(map) => (map, false),
            None => {
                log::warn!(
                    "Rule {} has malformed conditions {}, it will never match",
                    row.id,
                    row.conditions
                );
                (Map::new(), true)
            }
        };

        let channels = match row.channels {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let recipients = match row.recipients {
            Value::Object(map) => map
                .into_iter()
                .map(|(channel, config)| {
                    let parsed = serde_json::from_value(config).unwrap_or_else(|e| {
                        log::warn!(
                            "Rule {} has malformed recipients for channel {}: {}",
                            row.id,
                            channel,
                            e
                        );
                        RecipientConfig::default()
                    });
                    (channel, parsed)
                })
                .collect(),
            _ => HashMap::new(),
        };

        Self {
            id: row.id,
            name: row.name,
            module_code: row.module_code,
            event_type: row.event_type,
            conditions,
            malformed_conditions,
            channels,
            recipients,
            template: MessageTemplate {
                subject: row.subject_template,
                body: row.body_template,
            },
            priority: row.priority,
            execution_order: row.execution_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Reads a stored conditions column. Legacy rows use `[]` for "no
/// conditions" or keep the object JSON-encoded inside a string.
fn parse_conditions(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => Some(Map::new()),
        Value::Array(items) if items.is_empty() => Some(Map::new()),
        Value::String(encoded) => match serde_json::from_str(&encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// DTO for creating a notification rule
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRule {
    pub name: String,
    pub module_code: String,
    pub event_type: String,
    #[serde(default)]
    pub conditions: Map<String, Value>,
    pub channels: Vec<String>,
    #[serde(default)]
    pub recipients: HashMap<String, RecipientConfig>,
    #[serde(default)]
    pub subject_template: Option<String>,
    #[serde(default)]
    pub body_template: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub execution_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// DTO for updating a notification rule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotificationRule {
    pub name: Option<String>,
    pub conditions: Option<Map<String, Value>>,
    pub channels: Option<Vec<String>>,
    pub recipients: Option<HashMap<String, RecipientConfig>>,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub priority: Option<Priority>,
    pub execution_order: Option<i32>,
    pub is_active: Option<bool>,
}
