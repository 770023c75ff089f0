//! Rule-based notification dispatch.
//!
//! [`NotificationEngine::send`] is the single entry point: it matches an
//! event against configured rules (or takes the forced channels/recipients),
//! resolves recipients, renders the message, persists one notification per
//! (rule, channel, recipient) and hands each to its channel sender. Everything
//! runs sequentially inside the caller's request; no task is spawned.
//!
//! Storage, the user directory and the audit log are injected as trait
//! objects so the engine can run against PostgreSQL ([`PgBackend`]) or
//! in-memory stubs.

pub mod matcher;
pub mod postgres;
pub mod recipients;
pub mod template;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    DispatchOutcome, NewNotification, Notification, NotificationEvent, NotificationRule,
    NotificationStats, Recipient, StatsFilter, User,
};
use crate::services::channels::{ChannelRegistry, DeliveryResult};

pub use matcher::{conditions_match, rule_matches, RuleMatcher};
pub use postgres::PgBackend;
pub use recipients::RecipientResolver;

/// Activity log event code written once per dispatch
pub const DISPATCH_EVENT_CODE: &str = "notification_dispatch";

/// Failure reason stored when a sender gives none
const GENERIC_FAILURE: &str = "Channel delivery failed";

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Read access to configured rules
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules for a module/event ordered by execution order, then id
    async fn fetch_active_rules(&self, module: &str, event: &str)
        -> AppResult<Vec<NotificationRule>>;
}

/// Read access to the platform's user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Ids of active users holding `role`
    async fn users_with_role(&self, role: &str) -> AppResult<Vec<i32>>;

    /// Contact details for address lookup by channel senders
    async fn contact(&self, user_id: i32) -> AppResult<Option<User>>;
}

/// Persistence of notification records
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> AppResult<Notification>;

    async fn mark_sent(&self, id: i64) -> AppResult<()>;

    async fn mark_failed(&self, id: i64, reason: &str) -> AppResult<()>;

    async fn stats(&self, filter: &StatsFilter) -> AppResult<NotificationStats>;
}

/// Audit trail writer; failures never affect a dispatch outcome
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log(
        &self,
        module: &str,
        event_code: &str,
        entity_type: &str,
        entity_id: Option<i64>,
        details: Value,
    ) -> AppResult<()>;
}

// =============================================================================
// Notification Engine
// =============================================================================

/// Orchestrates matching, resolution, rendering, persistence and delivery
pub struct NotificationEngine {
    matcher: RuleMatcher,
    resolver: RecipientResolver,
    store: Arc<dyn NotificationStore>,
    audit: Arc<dyn AuditLog>,
    channels: ChannelRegistry,
    send_timeout: Duration,
}

impl NotificationEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn NotificationStore>,
        audit: Arc<dyn AuditLog>,
        channels: ChannelRegistry,
    ) -> Self {
        Self {
            matcher: RuleMatcher::new(rules),
            resolver: RecipientResolver::new(directory),
            store,
            audit,
            channels,
            send_timeout: crate::config::DispatchConfig::default().send_timeout,
        }
    }

    /// Engine backed by PostgreSQL with the configured email/Telegram senders
    pub fn from_pool(pool: crate::db::DbPool, config: &Config) -> AppResult<Self> {
        let backend = Arc::new(PgBackend::new(pool));
        let channels = ChannelRegistry::from_config(config, backend.clone())?;

        Ok(Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            channels,
        )
        .with_send_timeout(config.dispatch.send_timeout))
    }

    /// Upper bound for each channel sender call
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Dispatches an event. Never fails: errors become `success: false`.
    pub async fn send(&self, event: NotificationEvent) -> DispatchOutcome {
        if let Err(e) = event.validate() {
            log::debug!("Rejected notification dispatch: {}", e);
            return DispatchOutcome::failure(e.to_string());
        }

        match self.dispatch(&event).await {
            Ok(ids) => {
                log::info!(
                    "Dispatched {} notification(s) for {}.{}",
                    ids.len(),
                    event.module,
                    event.event
                );
                self.record_audit(&event, &ids).await;
                DispatchOutcome::success(ids)
            }
            Err(e) => {
                log::error!(
                    "Notification dispatch for {}.{} failed: {}",
                    event.module,
                    event.event,
                    e
                );
                DispatchOutcome::failure(e.to_string())
            }
        }
    }

    /// Aggregated delivery statistics
    pub async fn stats(&self, filter: &StatsFilter) -> AppResult<NotificationStats> {
        self.store.stats(filter).await
    }

    /// Registered channel names
    pub fn channels(&self) -> Vec<String> {
        self.channels.channels()
    }

    async fn dispatch(&self, event: &NotificationEvent) -> AppResult<Vec<i64>> {
        if let Some((channels, recipients)) = event.forced_targets() {
            return self.dispatch_forced(event, channels, recipients).await;
        }

        let rules = self
            .matcher
            .match_rules(&event.module, &event.event, &event.data)
            .await?;

        if rules.is_empty() {
            log::debug!("No matching rules for {}.{}", event.module, event.event);
        }

        let metadata = Value::Object(event.data.clone());
        let mut ids = Vec::new();

        for rule in &rules {
            for channel in &rule.channels {
                let recipients = self.resolver.resolve(&rule.recipients_for(channel)).await?;
                if recipients.is_empty() {
                    log::debug!(
                        "Rule {} has no recipients for channel {}, skipping",
                        rule.id,
                        channel
                    );
                    continue;
                }

                let subject = template::render_opt(rule.template.subject.as_deref(), &event.data);
                let body = match rule.template.body.as_deref() {
                    Some(body) if !body.is_empty() => template::render(body, &event.data),
                    _ => metadata.to_string(),
                };

                for recipient in recipients {
                    let id = self
                        .deliver(NewNotification {
                            rule_id: Some(rule.id),
                            module_code: event.module.clone(),
                            event_type: event.event.clone(),
                            event_id: event.event_id,
                            priority: event.priority,
                            channel: channel.clone(),
                            recipient,
                            subject: subject.clone(),
                            body: body.clone(),
                            metadata: metadata.clone(),
                        })
                        .await?;
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    /// Bypass path: every forced channel × every forced recipient
    async fn dispatch_forced(
        &self,
        event: &NotificationEvent,
        channels: &[String],
        descriptors: &[String],
    ) -> AppResult<Vec<i64>> {
        let recipients = recipients::parse_descriptors(descriptors);
        let metadata = Value::Object(event.data.clone());
        let subject = first_scalar(event, &["subject", "title"]).unwrap_or_default();
        let body =
            first_scalar(event, &["message", "body"]).unwrap_or_else(|| metadata.to_string());

        let mut ids = Vec::new();
        for channel in channels.iter().filter(|c| !c.trim().is_empty()) {
            for recipient in &recipients {
                let id = self
                    .deliver(NewNotification {
                        rule_id: None,
                        module_code: event.module.clone(),
                        event_type: event.event.clone(),
                        event_id: event.event_id,
                        priority: event.priority,
                        channel: channel.clone(),
                        recipient: recipient.clone(),
                        subject: subject.clone(),
                        body: body.clone(),
                        metadata: metadata.clone(),
                    })
                    .await?;
                ids.push(id);
            }
        }

        Ok(ids)
    }

    /// Persists a pending notification, sends it and records the outcome
    async fn deliver(&self, input: NewNotification) -> AppResult<i64> {
        let notification = self.store.create(input).await?;
        let result = self.send_via_channel(&notification).await;

        if result.success {
            self.store.mark_sent(notification.id).await?;
        } else {
            let reason = result.error_message.as_deref().unwrap_or(GENERIC_FAILURE);
            log::warn!(
                "Notification {} via {} to {} failed: {}",
                notification.id,
                notification.channel,
                recipient_label(&notification),
                reason
            );
            self.store.mark_failed(notification.id, reason).await?;
        }

        Ok(notification.id)
    }

    /// Invokes the channel's sender. Unknown channels, timeouts and panics
    /// all become failed results.
    async fn send_via_channel(&self, notification: &Notification) -> DeliveryResult {
        let sender = match self.channels.get(&notification.channel) {
            Some(s) => s,
            None => {
                return DeliveryResult::failure(
                    format!("Unsupported channel: {}", notification.channel),
                    None,
                )
            }
        };

        let attempt = AssertUnwindSafe(sender.send(notification)).catch_unwind();
        match tokio::time::timeout(self.send_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => DeliveryResult::failure(
                format!("Channel sender for {} panicked", notification.channel),
                None,
            ),
            Err(_) => DeliveryResult::failure(
                format!(
                    "Channel sender for {} timed out after {}s",
                    notification.channel,
                    self.send_timeout.as_secs_f64()
                ),
                None,
            ),
        }
    }

    async fn record_audit(&self, event: &NotificationEvent, ids: &[i64]) {
        let details = json!({
            "event": event.event,
            "count": ids.len(),
            "notification_ids": ids,
        });

        if let Err(e) = self
            .audit
            .log(
                &event.module,
                DISPATCH_EVENT_CODE,
                "notification",
                event.event_id,
                details,
            )
            .await
        {
            log::warn!(
                "Failed to write activity log for {}.{}: {}",
                event.module,
                event.event,
                e
            );
        }
    }
}

fn first_scalar(event: &NotificationEvent, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| event.data.get(*k))
        .find_map(template::scalar_to_string)
}

fn recipient_label(notification: &Notification) -> String {
    match notification.recipient() {
        Recipient::User(id) => format!("user {}", id),
        Recipient::Custom(address) => address,
    }
}
