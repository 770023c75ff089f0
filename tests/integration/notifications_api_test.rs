//! Integration tests for the Notifications API
//!
//! Dispatches events through the HTTP surface against a real PostgreSQL
//! database. Channel senders are scripted so no SMTP or Telegram traffic
//! leaves the test.

use std::sync::Arc;

use actix_web::{test, web, App};
use opsnotify::error::AppError;
use opsnotify::models::{CreateNotificationRule, NotificationStatus};
use opsnotify::routes;
use opsnotify::services::{
    ActivityLogService, ChannelRegistry, NotificationEngine, NotificationService, PgBackend,
    RuleService, UsersService,
};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::common::{Behavior, ScriptedSender, TestDb};

fn engine(pool: &PgPool, senders: Vec<Arc<ScriptedSender>>) -> NotificationEngine {
    let backend = Arc::new(PgBackend::new(pool.clone()));
    let mut channels = ChannelRegistry::new();
    for sender in senders {
        channels.register(sender);
    }
    NotificationEngine::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend,
        channels,
    )
}

macro_rules! init_app {
    ($pool:expr, $engine:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new($engine))
                .configure(routes::notifications::configure),
        )
        .await
    };
}

async fn create_rule(pool: &PgPool, input: Value) -> i32 {
    let input: CreateNotificationRule = serde_json::from_value(input).unwrap();
    RuleService::create(pool, input).await.unwrap().id
}

// =============================================================================
// Send Endpoint Tests
// =============================================================================

#[actix_web::test]
async fn test_send_end_to_end_with_role_recipients() {
    let db = TestDb::new().await;
    let agent = db.create_user("agent@example.com", &["sales"]).await;
    db.create_user("support@example.com", &["support"]).await;
    let rule_id = create_rule(
        &db.pool,
        json!({
            "name": "Hot leads",
            "module_code": "leads",
            "event_type": "created",
            "conditions": {"status": "hot"},
            "channels": ["email"],
            "recipients": {"email": {"type": "role", "roles": ["sales"]}},
            "subject_template": "New lead {{name}}",
            "body_template": "{{name}} scored {{score}}"
        }),
    )
    .await;

    let sender = Arc::new(ScriptedSender::new("email", Behavior::Succeed));
    let app = init_app!(db.pool, engine(&db.pool, vec![sender.clone()]));

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({
            "module": "leads",
            "event": "created",
            "event_id": 501,
            "data": {"status": "hot", "name": "Ada", "score": 91}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    let id = body["notification_ids"][0].as_i64().unwrap();

    let stored = NotificationService::get(&db.pool, id).await.unwrap();
    assert_eq!(stored.rule_id, Some(rule_id));
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert!(stored.sent_at.is_some());
    assert_eq!(stored.recipient_id, agent.id.to_string());
    assert_eq!(stored.subject, "New lead Ada");
    assert_eq!(stored.body, "Ada scored 91");
    assert_eq!(sender.calls().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/notifications/stats?module=leads")
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_channel"], json!([{"channel": "email", "count": 1}]));
    assert_eq!(stats["by_status"], json!([{"status": "sent", "count": 1}]));
    assert_eq!(stats["by_module"], json!([{"module": "leads", "count": 1}]));

    let audits = ActivityLogService::count(&db.pool, "leads", "notification_dispatch")
        .await
        .unwrap();
    assert_eq!(audits, 1);
}

#[actix_web::test]
async fn test_deactivated_users_are_not_notified() {
    let db = TestDb::new().await;
    let leaver = db.create_user("leaver@example.com", &["sales"]).await;
    let stayer = db.create_user("stayer@example.com", &["sales"]).await;
    UsersService::deactivate(&db.pool, leaver.id).await.unwrap();
    create_rule(
        &db.pool,
        json!({
            "name": "Won deals",
            "module_code": "leads",
            "event_type": "won",
            "channels": ["email"],
            "recipients": {"email": {"type": "role", "roles": ["sales"]}}
        }),
    )
    .await;

    let sender = Arc::new(ScriptedSender::new("email", Behavior::Succeed));
    let app = init_app!(db.pool, engine(&db.pool, vec![sender.clone()]));

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({"module": "leads", "event": "won"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["count"], 1);
    assert_eq!(sender.calls()[0].0, format!("user:{}", stayer.id));
}

#[actix_web::test]
async fn test_send_without_module_returns_bad_request() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool, engine(&db.pool, vec![]));

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({"event": "created"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let stats = NotificationService::get_stats(&db.pool, &Default::default())
        .await
        .unwrap();
    assert_eq!(stats.total, 0);
}

#[actix_web::test]
async fn test_send_with_unreadable_body_returns_outcome() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool, engine(&db.pool, vec![]));

    for payload in [
        test::TestRequest::post()
            .uri("/api/notifications/send")
            .set_json(json!({"module": 5, "event": "created"})),
        test::TestRequest::post()
            .uri("/api/notifications/send")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"module\": \"leads\","),
    ] {
        let resp = test::call_service(&app, payload.to_request()).await;
        assert_eq!(resp.status(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .is_some_and(|e| e.starts_with("Invalid request body")));
    }
}

#[actix_web::test]
async fn test_forced_send_creates_single_notification() {
    let db = TestDb::new().await;
    create_rule(
        &db.pool,
        json!({
            "name": "All leads",
            "module_code": "leads",
            "event_type": "created",
            "channels": ["email"],
            "recipients": {"email": {"type": "custom", "custom": ["team@example.com"]}}
        }),
    )
    .await;
    let app = init_app!(
        db.pool,
        engine(
            &db.pool,
            vec![Arc::new(ScriptedSender::new("email", Behavior::Succeed))]
        )
    );

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({
            "module": "leads",
            "event": "created",
            "data": {"message": "Call back today"},
            "force_channels": ["email"],
            "force_recipients": ["user:5"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);

    let id = body["notification_ids"][0].as_i64().unwrap();
    let stored = NotificationService::get(&db.pool, id).await.unwrap();
    assert_eq!(stored.rule_id, None);
    assert_eq!(stored.recipient_type, "user");
    assert_eq!(stored.recipient_id, "5");
    assert_eq!(stored.body, "Call back today");
}

#[actix_web::test]
async fn test_channel_failure_is_recorded_and_isolated() {
    let db = TestDb::new().await;
    create_rule(
        &db.pool,
        json!({
            "name": "Escalations",
            "module_code": "tickets",
            "event_type": "escalated",
            "channels": ["telegram", "email"],
            "recipients": {
                "telegram": {"type": "custom", "custom": ["-100200"]},
                "email": {"type": "custom", "custom": ["oncall@example.com"]}
            }
        }),
    )
    .await;
    let app = init_app!(
        db.pool,
        engine(
            &db.pool,
            vec![
                Arc::new(ScriptedSender::new(
                    "telegram",
                    Behavior::Fail(Some("Telegram API error: chat not found".to_string())),
                )),
                Arc::new(ScriptedSender::new("email", Behavior::Succeed)),
            ]
        )
    );

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({"module": "tickets", "event": "escalated"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);

    let req = test::TestRequest::get()
        .uri("/api/notifications?status=failed")
        .to_request();
    let failed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(failed["total_count"], 1);
    assert_eq!(failed["items"][0]["channel"], "telegram");
    assert_eq!(
        failed["items"][0]["error_message"],
        "Telegram API error: chat not found"
    );

    let req = test::TestRequest::get()
        .uri("/api/notifications?status=sent&channel=email")
        .to_request();
    let sent: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(sent["total_count"], 1);
}

// =============================================================================
// History and Stats Tests
// =============================================================================

#[actix_web::test]
async fn test_get_notification_not_found() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool, engine(&db.pool, vec![]));

    let req = test::TestRequest::get()
        .uri("/api/notifications/999")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_list_notifications_paginates() {
    let db = TestDb::new().await;
    let app = init_app!(
        db.pool,
        engine(
            &db.pool,
            vec![Arc::new(ScriptedSender::new("email", Behavior::Succeed))]
        )
    );

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({
            "module": "ops",
            "event": "digest",
            "force_channels": ["email"],
            "force_recipients": ["a@example.com", "b@example.com", "c@example.com"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 3);

    let req = test::TestRequest::get()
        .uri("/api/notifications?module=ops&per_page=2&page=2")
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(page["total_count"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["page"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_stats_date_range_excludes_other_days() {
    let db = TestDb::new().await;
    let app = init_app!(
        db.pool,
        engine(
            &db.pool,
            vec![Arc::new(ScriptedSender::new("email", Behavior::Succeed))]
        )
    );

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({
            "module": "ops",
            "event": "digest",
            "force_channels": ["email"],
            "force_recipients": ["a@example.com"]
        }))
        .to_request();
    test::call_service(&app, req).await;

    let today = chrono::Utc::now().date_naive();
    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/notifications/stats?date_from={}&date_to={}",
            today, today
        ))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total"], 1);

    let yesterday = today.pred_opt().unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/api/notifications/stats?date_to={}", yesterday))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total"], 0);
    assert_eq!(stats["by_channel"], json!([]));
}

// =============================================================================
// Status Transition Tests
// =============================================================================

#[actix_web::test]
async fn test_status_leaves_pending_only_once() {
    let db = TestDb::new().await;
    let app = init_app!(
        db.pool,
        engine(
            &db.pool,
            vec![Arc::new(ScriptedSender::new("email", Behavior::Succeed))]
        )
    );

    let req = test::TestRequest::post()
        .uri("/api/notifications/send")
        .set_json(json!({
            "module": "ops",
            "event": "digest",
            "force_channels": ["email"],
            "force_recipients": ["a@example.com"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["notification_ids"][0].as_i64().unwrap();

    let again = NotificationService::mark_failed(&db.pool, id, "late failure").await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let stored = NotificationService::get(&db.pool, id).await.unwrap();
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert!(stored.error_message.is_none());
}
