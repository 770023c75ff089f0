//! Email channel.
//!
//! Sends notifications via SMTP using the lettre crate, as a multipart
//! message with plain text and HTML alternatives.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{resolve_address, ChannelSender, DeliveryResult};
use crate::config::SmtpConfig;
use crate::models::{Notification, Priority};
use crate::services::dispatch::UserDirectory;

/// Email channel sender
pub struct EmailSender {
    smtp: SmtpConfig,
    directory: Arc<dyn UserDirectory>,
}

impl EmailSender {
    pub fn new(smtp: SmtpConfig, directory: Arc<dyn UserDirectory>) -> Self {
        Self { smtp, directory }
    }

    /// Subject line, falling back to `[module] event` when the rule has none
    fn subject(notification: &Notification) -> String {
        if notification.subject.trim().is_empty() {
            format!(
                "[{}] {}",
                notification.module_code, notification.event_type
            )
        } else {
            notification.subject.clone()
        }
    }

    /// Formats a notification as HTML email body
    fn format_html(notification: &Notification) -> String {
        let accent = match notification.priority {
            Priority::Critical => "#dc2626",
            Priority::High => "#f59e0b",
            Priority::Medium => "#3b82f6",
            Priority::Low => "#6b7280",
        };

        let body = html_escape(&notification.body).replace('\n', "<br>\n");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background-color: #f3f4f6;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; overflow: hidden;">
        <div style="background-color: {accent}; padding: 16px 24px;">
            <h1 style="color: #ffffff; margin: 0; font-size: 18px; font-weight: 600;">{subject}</h1>
        </div>
        <div style="padding: 24px; font-size: 14px; color: #374151; line-height: 1.5;">
            {body}
        </div>
        <div style="padding: 16px 24px; background-color: #f9fafb; border-top: 1px solid #e5e7eb;">
            <p style="margin: 0; font-size: 12px; color: #6b7280;">
                Sent for {module} / {event}.
            </p>
        </div>
    </div>
</body>
</html>"#,
            accent = accent,
            subject = html_escape(&Self::subject(notification)),
            body = body,
            module = html_escape(&notification.module_code),
            event = html_escape(&notification.event_type),
        )
    }

    /// Builds the SMTP transport; port 465 uses implicit TLS, anything else STARTTLS
    fn transport(&self, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        let builder = if self.smtp.port == 465 {
            let tls_params = TlsParameters::new(host.to_string())
                .map_err(|e| format!("Invalid TLS parameters for SMTP host: {}", e))?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| format!("Invalid SMTP host: {}", e))?
                .port(self.smtp.port)
                .tls(Tls::Wrapper(tls_params))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| format!("Invalid SMTP host: {}", e))?
                .port(self.smtp.port)
        };

        let mailer = match (&self.smtp.username, &self.smtp.password) {
            (Some(username), Some(password)) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            _ => builder.build(),
        };

        Ok(mailer)
    }

    fn build_message(&self, notification: &Notification, to: Mailbox) -> Result<Message, String> {
        let from: Mailbox = self
            .smtp
            .from_address
            .parse()
            .map_err(|e| format!("Invalid sender address {}: {}", self.smtp.from_address, e))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(Self::subject(notification))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(notification.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(Self::format_html(notification)),
                    ),
            )
            .map_err(|e| format!("Failed to build email: {}", e))
    }
}

/// Simple HTML escaping for email content
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> &str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> DeliveryResult {
        let host = match self.smtp.host.as_deref() {
            Some(h) => h,
            None => return DeliveryResult::failure("SMTP host not configured", None),
        };

        let address =
            match resolve_address(self.directory.as_ref(), notification, |u| Some(u.email.clone()))
                .await
            {
                Ok(a) => a,
                Err(e) => return DeliveryResult::failure(e, None),
            };

        let to: Mailbox = match address.parse() {
            Ok(m) => m,
            Err(_) => {
                return DeliveryResult::failure(
                    format!("Invalid email recipient: {}", address),
                    None,
                )
            }
        };

        let message = match self.build_message(notification, to) {
            Ok(m) => m,
            Err(e) => return DeliveryResult::failure(e, None),
        };

        let mailer = match self.transport(host) {
            Ok(m) => m,
            Err(e) => return DeliveryResult::failure(e, None),
        };

        match mailer.send(message).await {
            Ok(_) => {
                log::debug!(
                    "Email notification {} sent to {}",
                    notification.id,
                    address
                );
                DeliveryResult::success(None)
            }
            Err(e) => DeliveryResult::failure(
                format!("Failed to send email to {}: {}", address, e),
                None,
            ),
        }
    }
}
