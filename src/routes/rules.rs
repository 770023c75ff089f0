//! Notification rule management routes.
//!
//! - GET /api/notification-rules - List rules (optional `?module=`)
//! - POST /api/notification-rules - Create rule
//! - GET /api/notification-rules/{id} - Get rule
//! - PATCH /api/notification-rules/{id} - Update rule
//! - DELETE /api/notification-rules/{id} - Delete rule

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{CreateNotificationRule, UpdateNotificationRule};
use crate::services::RuleService;

#[derive(Deserialize)]
pub struct ListRulesQuery {
    pub module: Option<String>,
}

/// GET /api/notification-rules
pub async fn list_rules(
    pool: web::Data<DbPool>,
    query: web::Query<ListRulesQuery>,
) -> AppResult<HttpResponse> {
    let module = query.module.as_deref().filter(|m| !m.is_empty());
    let rules = RuleService::list(pool.get_ref(), module).await?;
    Ok(HttpResponse::Ok().json(rules))
}

/// POST /api/notification-rules
pub async fn create_rule(
    pool: web::Data<DbPool>,
    body: web::Json<CreateNotificationRule>,
) -> AppResult<HttpResponse> {
    let rule = RuleService::create(pool.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(rule))
}

/// GET /api/notification-rules/{id}
pub async fn get_rule(pool: web::Data<DbPool>, path: web::Path<i32>) -> AppResult<HttpResponse> {
    let rule = RuleService::get(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rule))
}

/// PATCH /api/notification-rules/{id}
pub async fn update_rule(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<UpdateNotificationRule>,
) -> AppResult<HttpResponse> {
    let rule = RuleService::update(pool.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rule))
}

/// DELETE /api/notification-rules/{id}
pub async fn delete_rule(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    RuleService::delete(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configure notification rule routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notification-rules")
            .route("", web::get().to(list_rules))
            .route("", web::post().to(create_rule))
            .route("/{id}", web::get().to(get_rule))
            .route("/{id}", web::patch().to(update_rule))
            .route("/{id}", web::delete().to(delete_rule)),
    );
}
