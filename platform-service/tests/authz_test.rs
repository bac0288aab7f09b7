mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn reader_may_comment_but_not_delete_comments() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;
    app.assign_tenant_role("u1", &tenant_id, "reader").await;

    let denied = app
        .decision(
            "u1",
            Some(&tenant_id),
            &json!({ "permission": "DELETE_COMMENTS", "resource_type": "comment" }),
        )
        .await;
    assert_eq!(denied, "denied");

    let response = app
        .check(
            "u1",
            Some(&tenant_id),
            &json!({ "permission": "comment", "resource_type": "comment", "resource_id": "c-9" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["decision"], "granted");
    assert_eq!(body["permission"], "COMMENT");
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["tenant_id"], tenant_id.as_str());
    assert_eq!(body["resource_id"], "c-9");
}

#[tokio::test]
async fn grant_requires_matching_resource_type() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;
    app.assign_tenant_role("u1", &tenant_id, "editor").await;

    let on_story = app
        .decision(
            "u1",
            Some(&tenant_id),
            &json!({ "permission": "EDIT_STORY", "resource_type": "story" }),
        )
        .await;
    let on_chapter = app
        .decision(
            "u1",
            Some(&tenant_id),
            &json!({ "permission": "EDIT_STORY", "resource_type": "chapter" }),
        )
        .await;

    assert_eq!(on_story, "granted");
    assert_eq!(on_chapter, "denied");
}

#[tokio::test]
async fn tenant_role_does_not_reach_other_tenants() {
    let app = TestApp::spawn().await;
    let home = app.create_tenant().await;
    let other = app.create_tenant().await;
    app.assign_tenant_role("u1", &home, "tenant_owner").await;

    let body = json!({ "permission": "CREATE_STORY", "resource_type": "story" });
    assert_eq!(app.decision("u1", Some(&home), &body).await, "granted");
    assert_eq!(app.decision("u1", Some(&other), &body).await, "denied");
    assert_eq!(app.decision("u1", None, &body).await, "denied");
}

#[tokio::test]
async fn deactivated_tenant_denies_everything() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;
    app.assign_tenant_role("u1", &tenant_id, "tenant_owner").await;
    let body = json!({ "permission": "EDIT_STORY", "resource_type": "story" });
    assert_eq!(app.decision("u1", Some(&tenant_id), &body).await, "granted");

    let response = app
        .patch(
            &format!("/tenants/{}/status", tenant_id),
            &json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(app.decision("u1", Some(&tenant_id), &body).await, "denied");
}

#[tokio::test]
async fn system_role_only_grants_system_level_permissions() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;

    let response = app
        .put(
            "/users/admin/assignments",
            &json!({ "system_role_id": "super_admin" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let manage = app
        .decision(
            "admin",
            None,
            &json!({ "permission": "MANAGE_TENANTS", "resource_type": "tenant" }),
        )
        .await;
    let edit = app
        .decision(
            "admin",
            Some(&tenant_id),
            &json!({ "permission": "EDIT_STORY", "resource_type": "story" }),
        )
        .await;

    assert_eq!(manage, "granted");
    assert_eq!(edit, "denied");
}

#[tokio::test]
async fn owner_only_grant_checks_resource_owner() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;

    let response = app
        .post(
            "/roles",
            &json!({
                "name": "own_story_editor",
                "display_name": "Own story editor",
                "role_type": "tenant",
                "tenant_id": tenant_id,
                "permissions": [{
                    "permission": "EDIT_STORY",
                    "resource_type": "story",
                    "conditions": { "owner_only": true, "status": ["draft"] }
                }],
                "created_by": common::TEST_USER_ID,
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let role: Value = response.json().await.unwrap();
    let role_id = role["id"].as_str().unwrap();

    let response = app
        .put(
            "/users/u1/assignments",
            &json!({ "tenant_roles": { (tenant_id.as_str()): role_id } }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let check = |owner: &str, status: &str| {
        json!({
            "permission": "EDIT_STORY",
            "resource_type": "story",
            "resource_id": "s-1",
            "context": { "owner_id": owner, "status": status }
        })
    };

    assert_eq!(app.decision("u1", Some(&tenant_id), &check("u1", "draft")).await, "granted");
    assert_eq!(app.decision("u1", Some(&tenant_id), &check("u2", "draft")).await, "denied");
    assert_eq!(app.decision("u1", Some(&tenant_id), &check("u1", "published")).await, "denied");

    let no_context = json!({ "permission": "EDIT_STORY", "resource_type": "story" });
    assert_eq!(app.decision("u1", Some(&tenant_id), &no_context).await, "denied");
}

#[tokio::test]
async fn unassigned_user_is_denied() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;

    let decision = app
        .decision(
            "stranger",
            Some(&tenant_id),
            &json!({ "permission": "COMMENT", "resource_type": "comment" }),
        )
        .await;

    assert_eq!(decision, "denied");

    let assignments: Value = app.get("/users/stranger/assignments").await.json().await.unwrap();
    assert_eq!(assignments["system_role_id"], Value::Null);
    assert_eq!(assignments["custom_role_ids"], json!([]));
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/authz/check"))
        .json(&json!({ "permission": "COMMENT", "resource_type": "comment" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn assignment_rejects_role_from_another_tenant() {
    let app = TestApp::spawn().await;
    let home = app.create_tenant().await;
    let other = app.create_tenant().await;

    let response = app
        .put(
            "/users/u1/assignments",
            &json!({ "tenant_roles": { (home.as_str()): format!("{}:reader", other) } }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn assignment_rejects_tenant_role_as_system_role() {
    let app = TestApp::spawn().await;
    let tenant_id = app.create_tenant().await;

    let response = app
        .put(
            "/users/u1/assignments",
            &json!({ "system_role_id": format!("{}:tenant_owner", tenant_id) }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}
