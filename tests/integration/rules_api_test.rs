//! Integration tests for the Notification Rules API
//!
//! Tests rule CRUD with a real PostgreSQL database, plus rule lookup as
//! seen by the dispatch engine.

use actix_web::{test, web, App};
use opsnotify::models::RecipientConfig;
use opsnotify::routes;
use opsnotify::services::{PgBackend, RuleStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestDb;

macro_rules! init_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .configure(routes::rules::configure),
        )
        .await
    };
}

fn rule_body(name: &str, event: &str, order: i32) -> Value {
    json!({
        "name": name,
        "module_code": "leads",
        "event_type": event,
        "channels": ["email"],
        "recipients": {"email": {"type": "role", "roles": ["sales"]}},
        "execution_order": order
    })
}

// =============================================================================
// Create Tests
// =============================================================================

#[actix_web::test]
async fn test_create_rule() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(json!({
            "name": "Hot leads",
            "module_code": "leads",
            "event_type": "created",
            "conditions": {"status": "hot"},
            "channels": ["email", "telegram"],
            "recipients": {
                "email": {"type": "role", "roles": ["sales"]},
                "telegram": {"type": "user", "users": [3]}
            },
            "subject_template": "New lead {{name}}",
            "priority": "high"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["channels"], json!(["email", "telegram"]));
    assert_eq!(body["conditions"], json!({"status": "hot"}));
    assert_eq!(body["recipients"]["telegram"], json!({"type": "user", "users": [3]}));
    assert_eq!(body["template"]["subject"], "New lead {{name}}");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["is_active"], true);
}

#[actix_web::test]
async fn test_create_rule_without_channels_fails() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(json!({
            "name": "Nothing",
            "module_code": "leads",
            "event_type": "created",
            "channels": []
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "ValidationError");
}

#[actix_web::test]
async fn test_create_rule_with_recipients_for_untargeted_channel_fails() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(json!({
            "name": "Mismatch",
            "module_code": "leads",
            "event_type": "created",
            "channels": ["email"],
            "recipients": {"telegram": {"type": "custom", "custom": ["1"]}}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
}

// =============================================================================
// Read / Update / Delete Tests
// =============================================================================

#[actix_web::test]
async fn test_list_rules_filters_by_module() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    for body in [
        rule_body("a", "created", 0),
        rule_body("b", "won", 0),
        json!({
            "name": "c",
            "module_code": "tickets",
            "event_type": "opened",
            "channels": ["email"]
        }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/notification-rules")
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let req = test::TestRequest::get()
        .uri("/api/notification-rules?module=leads")
        .to_request();
    let rules: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(rules.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/notification-rules")
        .to_request();
    let rules: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(rules.as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn test_update_rule_keeps_absent_fields() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(rule_body("Original", "created", 5))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/notification-rules/{}", id))
        .set_json(json!({"name": "Renamed", "is_active": false}))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["execution_order"], 5);
    assert_eq!(updated["channels"], json!(["email"]));
}

#[actix_web::test]
async fn test_delete_rule() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(rule_body("Doomed", "created", 0))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/notification-rules/{}", id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/notification-rules/{}", id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/notification-rules/{}", id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

// =============================================================================
// Rule Store Tests
// =============================================================================

#[actix_web::test]
async fn test_active_rules_ordered_for_dispatch() {
    let db = TestDb::new().await;
    let app = init_app!(db.pool);

    let mut ids = Vec::new();
    for (name, order) in [("third", 9), ("first", 1), ("second", 1)] {
        let req = test::TestRequest::post()
            .uri("/api/notification-rules")
            .set_json(rule_body(name, "created", order))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(created["id"].as_i64().unwrap());
    }

    let req = test::TestRequest::post()
        .uri("/api/notification-rules")
        .set_json(json!({
            "name": "inactive",
            "module_code": "leads",
            "event_type": "created",
            "channels": ["email"],
            "is_active": false
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let backend = PgBackend::new(db.pool.clone());
    let rules = backend.fetch_active_rules("leads", "created").await.unwrap();

    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert_eq!(
        rules[0].recipients_for("email"),
        RecipientConfig::Role {
            roles: vec!["sales".to_string()]
        }
    );
}

#[actix_web::test]
async fn test_malformed_recipient_json_is_tolerated() {
    let db = TestDb::new().await;

    sqlx::query(
        r#"
        INSERT INTO notification_rules
            (name, module_code, event_type, conditions, channels, recipients)
        VALUES ('legacy', 'leads', 'created', '[]'::jsonb, '["email"]'::jsonb,
                '{"email": {"type": "group", "groups": [1]}}'::jsonb)
        "#,
    )
    .execute(&db.pool)
    .await
    .unwrap();

    let backend = PgBackend::new(db.pool.clone());
    let rules = backend.fetch_active_rules("leads", "created").await.unwrap();

    assert_eq!(rules.len(), 1);
    assert!(rules[0].conditions.is_empty());
    assert_eq!(rules[0].recipients_for("email"), RecipientConfig::default());
}
