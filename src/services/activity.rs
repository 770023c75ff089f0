//! Activity (audit) log writes.

use serde_json::Value;
use sqlx::PgPool;

use crate::error::AppResult;

pub struct ActivityLogService;

impl ActivityLogService {
    /// Appends one activity entry
    pub async fn log(
        pool: &PgPool,
        module_code: &str,
        event_code: &str,
        entity_type: &str,
        entity_id: Option<i64>,
        details: &Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (module_code, event_code, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(module_code)
        .bind(event_code)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Counts entries for a module and event code
    pub async fn count(pool: &PgPool, module_code: &str, event_code: &str) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM activity_log WHERE module_code = $1 AND event_code = $2",
        )
        .bind(module_code)
        .bind(event_code)
        .fetch_one(pool)
        .await?;

        Ok(count.0)
    }
}
