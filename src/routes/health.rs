use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};
use crate::services::NotificationEngine;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    database: &'static str,
    channels: Vec<String>,
}

/// Liveness check: 200 while the process is up
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse { status: "ok" })
}

/// Readiness check: 200 when the database answers, 503 otherwise.
/// Also reports which delivery channels are registered.
pub async fn readiness(
    pool: web::Data<DbPool>,
    engine: web::Data<NotificationEngine>,
) -> HttpResponse {
    let db_healthy = db::health_check(pool.get_ref()).await;

    let (status, db_status, http_status) = if db_healthy {
        ("ready", "ok", StatusCode::OK)
    } else {
        ("not_ready", "error", StatusCode::SERVICE_UNAVAILABLE)
    };

    HttpResponse::build(http_status).json(ReadinessResponse {
        status,
        checks: ReadinessChecks {
            database: db_status,
            channels: engine.channels(),
        },
    })
}

/// Configure health routes (no authentication)
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(liveness))
            .route("/ready", web::get().to(readiness)),
    );
}
