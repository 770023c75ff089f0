//! Notification dispatch, history and statistics routes.
//!
//! - POST /api/notifications/send - Dispatch an event
//! - GET /api/notifications/stats - Aggregated counts
//! - GET /api/notifications - Paginated history
//! - GET /api/notifications/{id} - Single record

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, HttpRequest, HttpResponse};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{DispatchOutcome, ListNotificationsQuery, NotificationEvent, StatsFilter};
use crate::pagination::{page_bounds, OffsetPaginatedResponse};
use crate::services::{NotificationEngine, NotificationService};

/// POST /api/notifications/send
///
/// Always answers with the dispatch outcome body; a failed dispatch is a 400.
pub async fn send_notification(
    engine: web::Data<NotificationEngine>,
    body: web::Json<NotificationEvent>,
) -> HttpResponse {
    let outcome = engine.send(body.into_inner()).await;

    if outcome.success {
        HttpResponse::Ok().json(outcome)
    } else {
        HttpResponse::BadRequest().json(outcome)
    }
}

/// GET /api/notifications/stats
pub async fn get_stats(
    engine: web::Data<NotificationEngine>,
    query: web::Query<StatsFilter>,
) -> AppResult<HttpResponse> {
    let stats = engine.stats(&query).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/notifications
pub async fn list_notifications(
    pool: web::Data<DbPool>,
    query: web::Query<ListNotificationsQuery>,
) -> AppResult<HttpResponse> {
    let (items, total_count) = NotificationService::list(pool.get_ref(), &query).await?;
    let (page, per_page, _) = page_bounds(query.page, query.per_page);

    Ok(HttpResponse::Ok().json(OffsetPaginatedResponse::new(
        items,
        total_count,
        page,
        per_page,
    )))
}

/// GET /api/notifications/{id}
pub async fn get_notification(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let notification = NotificationService::get(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notification))
}

/// Unreadable send bodies get the same outcome shape as a rejected event
fn send_body_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let outcome = DispatchOutcome::failure(format!("Invalid request body: {}", err));
    InternalError::from_response(err, HttpResponse::BadRequest().json(outcome)).into()
}

/// Configure notification routes. `/send` and `/stats` precede `/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notifications")
            .service(
                web::resource("/send")
                    .app_data(web::JsonConfig::default().error_handler(send_body_error))
                    .route(web::post().to(send_notification)),
            )
            .route("/stats", web::get().to(get_stats))
            .route("", web::get().to(list_notifications))
            .route("/{id}", web::get().to(get_notification)),
    );
}
