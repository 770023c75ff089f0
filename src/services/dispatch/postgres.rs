//! PostgreSQL implementations of the dispatch collaborators.

use async_trait::async_trait;
use serde_json::Value;

use super::{AuditLog, NotificationStore, RuleStore, UserDirectory};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    NewNotification, Notification, NotificationRule, NotificationStats, StatsFilter, User,
};
use crate::services::{ActivityLogService, NotificationService, RuleService, UsersService};

/// Shared-pool backend implementing every collaborator trait
#[derive(Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgBackend {
    async fn fetch_active_rules(
        &self,
        module: &str,
        event: &str,
    ) -> AppResult<Vec<NotificationRule>> {
        RuleService::fetch_active(&self.pool, module, event).await
    }
}

#[async_trait]
impl UserDirectory for PgBackend {
    async fn users_with_role(&self, role: &str) -> AppResult<Vec<i32>> {
        UsersService::list_ids_by_role(&self.pool, role).await
    }

    async fn contact(&self, user_id: i32) -> AppResult<Option<User>> {
        UsersService::get_by_id(&self.pool, user_id).await
    }
}

#[async_trait]
impl NotificationStore for PgBackend {
    async fn create(&self, notification: NewNotification) -> AppResult<Notification> {
        NotificationService::create(&self.pool, notification).await
    }

    async fn mark_sent(&self, id: i64) -> AppResult<()> {
        NotificationService::mark_sent(&self.pool, id).await
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> AppResult<()> {
        NotificationService::mark_failed(&self.pool, id, reason).await
    }

    async fn stats(&self, filter: &StatsFilter) -> AppResult<NotificationStats> {
        NotificationService::get_stats(&self.pool, filter).await
    }
}

#[async_trait]
impl AuditLog for PgBackend {
    async fn log(
        &self,
        module: &str,
        event_code: &str,
        entity_type: &str,
        entity_id: Option<i64>,
        details: Value,
    ) -> AppResult<()> {
        ActivityLogService::log(
            &self.pool,
            module,
            event_code,
            entity_type,
            entity_id,
            &details,
        )
        .await
    }
}
