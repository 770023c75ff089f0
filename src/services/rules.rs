//! Notification rule management and lookup.
//!
//! Administrators manage rules through the CRUD operations; the dispatch
//! engine only ever calls [`RuleService::fetch_active`].

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{
    CreateNotificationRule, NotificationRule, NotificationRuleRow, RecipientConfig,
    UpdateNotificationRule,
};

pub struct RuleService;

impl RuleService {
    // =========================================================================
    // Dispatch Lookup
    // =========================================================================

    /// Active rules for a module/event, in evaluation order
    pub async fn fetch_active(
        pool: &PgPool,
        module_code: &str,
        event_type: &str,
    ) -> AppResult<Vec<NotificationRule>> {
        let rows = sqlx::query_as::<_, NotificationRuleRow>(
            r#"
            SELECT id, name, module_code, event_type, conditions, channels, recipients,
                   subject_template, body_template, priority, execution_order, is_active,
                   created_at, updated_at
            FROM notification_rules
            WHERE module_code = $1 AND event_type = $2 AND is_active = TRUE
            ORDER BY execution_order ASC, id ASC
            "#,
        )
        .bind(module_code)
        .bind(event_type)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(NotificationRule::from).collect())
    }

    // =========================================================================
    // Rule CRUD
    // =========================================================================

    /// Lists all rules, optionally restricted to one module
    pub async fn list(
        pool: &PgPool,
        module_code: Option<&str>,
    ) -> AppResult<Vec<NotificationRule>> {
        let rows = sqlx::query_as::<_, NotificationRuleRow>(
            r#"
            SELECT id, name, module_code, event_type, conditions, channels, recipients,
                   subject_template, body_template, priority, execution_order, is_active,
                   created_at, updated_at
            FROM notification_rules
            WHERE ($1::text IS NULL OR module_code = $1)
            ORDER BY module_code, event_type, execution_order, id
            "#,
        )
        .bind(module_code)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(NotificationRule::from).collect())
    }

    /// Gets a rule by ID
    pub async fn get(pool: &PgPool, id: i32) -> AppResult<NotificationRule> {
        sqlx::query_as::<_, NotificationRuleRow>(
            r#"
            SELECT id, name, module_code, event_type, conditions, channels, recipients,
                   subject_template, body_template, priority, execution_order, is_active,
                   created_at, updated_at
            FROM notification_rules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(NotificationRule::from)
        .ok_or_else(|| AppError::NotFound(format!("Notification rule {} not found", id)))
    }

    /// Creates a rule
    pub async fn create(
        pool: &PgPool,
        input: CreateNotificationRule,
    ) -> AppResult<NotificationRule> {
        validate_required("name", &input.name)?;
        validate_required("module_code", &input.module_code)?;
        validate_required("event_type", &input.event_type)?;
        validate_channels(&input.channels)?;
        validate_recipients(&input.channels, &input.recipients)?;

        let row = sqlx::query_as::<_, NotificationRuleRow>(
            r#"
            INSERT INTO notification_rules (
                name, module_code, event_type, conditions, channels, recipients,
                subject_template, body_template, priority, execution_order, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::text::varchar, $10, $11)
            RETURNING id, name, module_code, event_type, conditions, channels, recipients,
                      subject_template, body_template, priority, execution_order, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.module_code.trim())
        .bind(input.event_type.trim())
        .bind(Value::Object(input.conditions))
        .bind(to_json(&input.channels)?)
        .bind(to_json(&input.recipients)?)
        .bind(&input.subject_template)
        .bind(&input.body_template)
        .bind(input.priority.to_string())
        .bind(input.execution_order)
        .bind(input.is_active)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    /// Updates a rule; absent fields keep their stored value
    pub async fn update(
        pool: &PgPool,
        id: i32,
        input: UpdateNotificationRule,
    ) -> AppResult<NotificationRule> {
        if let Some(ref name) = input.name {
            validate_required("name", name)?;
        }
        if let Some(ref channels) = input.channels {
            validate_channels(channels)?;
        }
        if let Some(ref recipients) = input.recipients {
            let channels = match input.channels {
                Some(ref channels) => channels.clone(),
                None => Self::get(pool, id).await?.channels,
            };
            validate_recipients(&channels, recipients)?;
        }

        let channels = input.channels.as_ref().map(to_json).transpose()?;
        let recipients = input.recipients.as_ref().map(to_json).transpose()?;

        let row = sqlx::query_as::<_, NotificationRuleRow>(
            r#"
            UPDATE notification_rules
            SET name = COALESCE($2, name),
                conditions = COALESCE($3, conditions),
                channels = COALESCE($4, channels),
                recipients = COALESCE($5, recipients),
                subject_template = COALESCE($6, subject_template),
                body_template = COALESCE($7, body_template),
                priority = COALESCE($8::text::varchar, priority),
                execution_order = COALESCE($9, execution_order),
                is_active = COALESCE($10, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, module_code, event_type, conditions, channels, recipients,
                      subject_template, body_template, priority, execution_order, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.conditions.map(Value::Object))
        .bind(channels)
        .bind(recipients)
        .bind(&input.subject_template)
        .bind(&input.body_template)
        .bind(input.priority.map(|p| p.to_string()))
        .bind(input.execution_order)
        .bind(input.is_active)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification rule {} not found", id)))?;

        Ok(row.into())
    }

    /// Deletes a rule. Past notifications keep their row with `rule_id` cleared.
    pub async fn delete(pool: &PgPool, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notification_rules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Notification rule {} not found",
                id
            )));
        }

        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode rule field: {}", e)))
}

fn validate_required(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_channels(channels: &[String]) -> AppResult<()> {
    if channels.is_empty() {
        return Err(AppError::Validation(
            "At least one channel is required".to_string(),
        ));
    }
    if channels.iter().any(|c| c.trim().is_empty()) {
        return Err(AppError::Validation(
            "Channel names must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Recipient configs may only be keyed by channels the rule targets
fn validate_recipients(
    channels: &[String],
    recipients: &std::collections::HashMap<String, RecipientConfig>,
) -> AppResult<()> {
    if let Some(unknown) = recipients.keys().find(|k| !channels.contains(k)) {
        return Err(AppError::Validation(format!(
            "Recipients configured for channel '{}' which the rule does not target",
            unknown
        )));
    }
    Ok(())
}
