//! Channel senders using the Strategy pattern.
//!
//! Each delivery medium (email, Telegram) implements [`ChannelSender`]. The
//! dispatch engine looks senders up by channel name in a [`ChannelRegistry`],
//! so adding a channel never touches the engine.

pub mod email;
pub mod telegram;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Notification, Recipient, User};
use crate::services::dispatch::UserDirectory;

pub use email::EmailSender;
pub use telegram::TelegramSender;

// =============================================================================
// Delivery Result
// =============================================================================

/// Result of a delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Whether the notification was delivered successfully
    pub success: bool,
    /// HTTP status code (if applicable)
    pub http_status: Option<u16>,
    /// Error message (if failed)
    pub error_message: Option<String>,
}

impl DeliveryResult {
    /// Creates a successful result
    pub fn success(http_status: Option<u16>) -> Self {
        Self {
            success: true,
            http_status,
            error_message: None,
        }
    }

    /// Creates a failed result
    pub fn failure(error_message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            success: false,
            http_status,
            error_message: Some(error_message.into()),
        }
    }
}

// =============================================================================
// Channel Sender Trait
// =============================================================================

/// A delivery channel.
///
/// Implementations must never panic or return early with an error: every
/// failure mode (missing credentials, unknown recipient, network error) is
/// reported as a failed [`DeliveryResult`].
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Channel name as it appears on rules and notifications
    fn channel(&self) -> &str;

    /// Delivers one notification
    async fn send(&self, notification: &Notification) -> DeliveryResult;
}

// =============================================================================
// Channel Registry
// =============================================================================

/// Channel name to sender mapping
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    senders: HashMap<String, Arc<dyn ChannelSender>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the production registry (email + telegram) from configuration
    pub fn from_config(config: &Config, directory: Arc<dyn UserDirectory>) -> AppResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(EmailSender::new(
            config.smtp.clone(),
            directory.clone(),
        )));
        registry.register(Arc::new(TelegramSender::new(
            config.telegram.clone(),
            directory,
        )?));
        Ok(registry)
    }

    /// Registers a sender under its channel name, replacing any previous one
    pub fn register(&mut self, sender: Arc<dyn ChannelSender>) -> &mut Self {
        self.senders.insert(sender.channel().to_string(), sender);
        self
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(channel).cloned()
    }

    /// Registered channel names, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.senders.keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// Address Lookup
// =============================================================================

/// Resolves the channel-specific address for a notification's recipient.
///
/// Custom recipients are already addresses. Directory users are looked up and
/// `pick` extracts the field the channel needs.
pub(crate) async fn resolve_address<F>(
    directory: &dyn UserDirectory,
    notification: &Notification,
    pick: F,
) -> Result<String, String>
where
    F: FnOnce(&User) -> Option<String>,
{
    match notification.recipient() {
        Recipient::Custom(address) => Ok(address),
        Recipient::User(user_id) => match directory.contact(user_id).await {
            Ok(Some(user)) => pick(&user)
                .ok_or_else(|| format!("User {} has no address for this channel", user_id)),
            Ok(None) => Err(format!("User {} not found", user_id)),
            Err(e) => Err(format!("User lookup failed: {}", e)),
        },
    }
}
