//! Notification record persistence, history and statistics.

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{
    ChannelCount, ListNotificationsQuery, ModuleCount, NewNotification, Notification,
    NotificationStats, StatsFilter, StatusCount,
};
use crate::pagination::page_bounds;

pub struct NotificationService;

impl NotificationService {
    // =========================================================================
    // Delivery Lifecycle
    // =========================================================================

    /// Inserts a pending notification
    pub async fn create(pool: &PgPool, input: NewNotification) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                rule_id, module_code, event_type, event_id, priority, channel,
                recipient_type, recipient_id, subject, body, metadata, status
            )
            VALUES ($1, $2, $3, $4, $5::text::varchar, $6, $7, $8, $9, $10, $11, 'pending')
            RETURNING id, rule_id, module_code, event_type, event_id, priority, channel,
                      recipient_type, recipient_id, subject, body, metadata, status,
                      error_message, created_at, sent_at
            "#,
        )
        .bind(input.rule_id)
        .bind(&input.module_code)
        .bind(&input.event_type)
        .bind(input.event_id)
        .bind(input.priority.to_string())
        .bind(&input.channel)
        .bind(input.recipient.recipient_type())
        .bind(input.recipient.recipient_id())
        .bind(&input.subject)
        .bind(&input.body)
        .bind(&input.metadata)
        .fetch_one(pool)
        .await?;

        Ok(notification)
    }

    /// Moves a pending notification to `sent`
    pub async fn mark_sent(pool: &PgPool, id: i64) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'sent', sent_at = NOW(), error_message = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Notification {} is not pending",
                id
            )));
        }

        Ok(())
    }

    /// Moves a pending notification to `failed` with a reason
    pub async fn mark_failed(pool: &PgPool, id: i64, reason: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Notification {} is not pending",
                id
            )));
        }

        Ok(())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Gets a notification by ID
    pub async fn get(pool: &PgPool, id: i64) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, rule_id, module_code, event_type, event_id, priority, channel,
                   recipient_type, recipient_id, subject, body, metadata, status,
                   error_message, created_at, sent_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    /// Lists notifications newest first, returning the page and total count
    pub async fn list(
        pool: &PgPool,
        query: &ListNotificationsQuery,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let (_, per_page, offset) = page_bounds(query.page, query.per_page);
        let module = query.module.as_deref().filter(|m| !m.is_empty());
        let channel = query.channel.as_deref().filter(|c| !c.is_empty());
        let status = query.status.map(|s| s.to_string());

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR channel = $3)
            "#,
        )
        .bind(module)
        .bind(&status)
        .bind(channel)
        .fetch_one(pool)
        .await?;

        let items = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, rule_id, module_code, event_type, event_id, priority, channel,
                   recipient_type, recipient_id, subject, body, metadata, status,
                   error_message, created_at, sent_at
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR channel = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(module)
        .bind(&status)
        .bind(channel)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((items, total.0))
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Aggregates notification counts by status, channel and module
    pub async fn get_stats(pool: &PgPool, filter: &StatsFilter) -> AppResult<NotificationStats> {
        let module = filter.module();
        let from = filter.from_bound();
        let to = filter.to_bound();

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            "#,
        )
        .bind(module)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await?;

        let by_status = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            GROUP BY status
            ORDER BY count DESC, status
            "#,
        )
        .bind(module)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        let by_channel = sqlx::query_as::<_, ChannelCount>(
            r#"
            SELECT channel, COUNT(*) AS count
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            GROUP BY channel
            ORDER BY count DESC, channel
            "#,
        )
        .bind(module)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        let by_module = sqlx::query_as::<_, ModuleCount>(
            r#"
            SELECT module_code AS module, COUNT(*) AS count
            FROM notifications
            WHERE ($1::text IS NULL OR module_code = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            GROUP BY module_code
            ORDER BY count DESC, module_code
            "#,
        )
        .bind(module)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        Ok(NotificationStats {
            total: total.0,
            by_status,
            by_channel,
            by_module,
        })
    }
}
