//! Runs the service against a live MongoDB. Requires `MONGODB_URI`:
//! `cargo test -- --ignored`.

mod common;

use std::time::Duration;

use common::TestApp;
use mongodb::bson::doc;
use platform_service::config::{PersistenceBackend, PlatformConfig};
use platform_service::models::RoleScope;
use platform_service::rbac::RbacStore;
use platform_service::services::MongoDb;
use serde_json::json;
use uuid::Uuid;

fn mongo_config() -> PlatformConfig {
    let mut config = PlatformConfig::in_memory();
    config.persistence = PersistenceBackend::Mongodb;
    config.mongodb.uri =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    config.mongodb.database = format!("platform_test_{}", Uuid::new_v4().simple());
    config
}

async fn spawn_mongo() -> TestApp {
    TestApp::spawn_with(mongo_config()).await
}

async fn cleanup(app: &TestApp) {
    if let Some(db) = &app.state.db {
        db.database().drop(None).await.ok();
    }
}

#[tokio::test]
#[ignore]
async fn mongo_backend_round_trips_roles_and_decisions() {
    let app = spawn_mongo().await;
    let db = app.state.db.clone().expect("MongoDB backend expected");

    let seeded = db
        .permissions()
        .count_documents(doc! { "is_built_in": true }, None)
        .await
        .unwrap();
    assert_eq!(seeded, 31);

    let tenant_id = app.create_tenant().await;
    let stored = db
        .roles()
        .count_documents(doc! { "tenant_id": tenant_id.as_str() }, None)
        .await
        .unwrap();
    assert_eq!(stored, 8);

    app.assign_tenant_role("u1", &tenant_id, "moderator").await;
    let decision = app
        .decision(
            "u1",
            Some(&tenant_id),
            &json!({ "permission": "DELETE_COMMENTS", "resource_type": "comment" }),
        )
        .await;
    assert_eq!(decision, "granted");

    cleanup(&app).await;
}

#[tokio::test]
#[ignore]
async fn mongo_unique_index_blocks_duplicate_role_names() {
    let app = spawn_mongo().await;
    let tenant_id = app.create_tenant().await;

    let body = json!({
        "name": "reviewer",
        "display_name": "Reviewer",
        "role_type": "custom",
        "tenant_id": tenant_id,
        "created_by": common::TEST_USER_ID,
    });
    assert_eq!(app.post("/roles", &body).await.status().as_u16(), 201);
    assert_eq!(app.post("/roles", &body).await.status().as_u16(), 400);

    cleanup(&app).await;
}

#[tokio::test]
#[ignore]
async fn mongo_health_reports_healthy() {
    let app = spawn_mongo().await;

    let response = app.get("/health").await;

    assert!(response.status().is_success());
    cleanup(&app).await;
}

#[tokio::test]
#[ignore]
async fn mongo_scope_lock_spans_instances() {
    let config = mongo_config();
    let first = MongoDb::connect(&config.mongodb).await.unwrap();
    let second = MongoDb::connect(&config.mongodb).await.unwrap();
    let scope = RoleScope::Tenant("t1".to_string());

    let lease = first.lock_scope(&scope).await.unwrap();
    let waiter = {
        let second = second.clone();
        let scope = scope.clone();
        tokio::spawn(async move { second.lock_scope(&scope).await.map(drop) })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    drop(lease);
    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("second instance should take the scope once released")
        .unwrap()
        .unwrap();

    first.database().drop(None).await.ok();
}
