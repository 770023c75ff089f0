//! Telegram Bot API channel.
//!
//! Sends messages via `POST /bot<token>/sendMessage` with HTML parse mode.
//! Directory users are addressed through their `telegram_chat_id`; custom
//! recipients are raw chat ids.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{resolve_address, ChannelSender, DeliveryResult};
use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Notification, Priority};
use crate::services::dispatch::UserDirectory;

/// Telegram `sendMessage` text limit (characters)
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram channel sender
pub struct TelegramSender {
    client: reqwest::Client,
    config: TelegramConfig,
    directory: Arc<dyn UserDirectory>,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig, directory: Arc<dyn UserDirectory>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            directory,
        })
    }

    /// Builds the HTML message text for a notification
    fn format_message(notification: &Notification) -> String {
        let marker = match notification.priority {
            Priority::Critical => "\u{1f6a8} ",
            Priority::High => "\u{26a0}\u{fe0f} ",
            Priority::Medium | Priority::Low => "",
        };

        let text = if notification.subject.trim().is_empty() {
            format!("{}{}", marker, escape_html(&notification.body))
        } else {
            format!(
                "{}<b>{}</b>\n\n{}",
                marker,
                escape_html(&notification.subject),
                escape_html(&notification.body)
            )
        };

        truncate_message(&text, TELEGRAM_MESSAGE_LIMIT)
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Truncates to at most `limit` characters, marking the cut with an ellipsis
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    truncated.push('\u{2026}');
    truncated
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn channel(&self) -> &str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> DeliveryResult {
        let token = match self.config.bot_token.as_deref() {
            Some(t) => t,
            None => return DeliveryResult::failure("Telegram bot token not configured", None),
        };

        let chat_id = match resolve_address(self.directory.as_ref(), notification, |u| {
            u.telegram_chat_id.clone().filter(|c| !c.is_empty())
        })
        .await
        {
            Ok(c) => c,
            Err(e) => return DeliveryResult::failure(e, None),
        };

        let url = format!("{}/bot{}/sendMessage", self.config.api_url, token);
        let payload = json!({
            "chat_id": chat_id,
            "text": Self::format_message(notification),
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    log::debug!(
                        "Telegram notification {} sent to chat {}",
                        notification.id,
                        chat_id
                    );
                    DeliveryResult::success(Some(status))
                } else {
                    let body: serde_json::Value = response.json().await.unwrap_or_default();
                    let error_msg = match body.get("description").and_then(|d| d.as_str()) {
                        Some(description) => format!("Telegram API error: {}", description),
                        None => format!("Telegram API error: HTTP {}", status),
                    };
                    DeliveryResult::failure(error_msg, Some(status))
                }
            }
            Err(e) => {
                // The URL embeds the bot token, keep it out of stored messages
                let error_msg = if e.is_timeout() {
                    "Request to Telegram timed out".to_string()
                } else if e.is_connect() {
                    "Connection to Telegram failed".to_string()
                } else {
                    format!("Telegram request failed: {}", e.without_url())
                };
                DeliveryResult::failure(error_msg, None)
            }
        }
    }
}
