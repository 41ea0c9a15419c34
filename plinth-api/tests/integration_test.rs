/// Integration tests for the Plinth API
///
/// These tests verify the full system works end-to-end:
/// - Registration and login
/// - Project lifecycle (create, provision, delete)
/// - Membership invitations and role changes
/// - Table and row CRUD through the data plane
/// - Quota enforcement and rate limit headers
///
/// They require a running PostgreSQL database and S3-compatible object
/// store, configured via the usual environment variables.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestContext;
use plinth_shared::models::membership::{InvitationStatus, ProjectMembership, ProjectRole};
use plinth_shared::models::project::{CreateProject, Project, ProvisioningStatus};
use plinth_shared::notify::WebhookNotifier;
use plinth_worker::provisioner::{Provisioner, ProvisionerConfig};
use serde_json::json;
use tower::Service as _;
use uuid::Uuid;

/// Test registration followed by login with the same credentials
#[tokio::test]
async fn test_register_and_login() {
    let ctx = TestContext::new().await.unwrap();

    let email = format!("register-{}@example.com", Uuid::new_v4());
    let password = "Str0ng-Passw0rd!";

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": email,
                "password": password,
                "name": "Registered User"
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let registered: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(registered["user_id"].is_string());
    assert!(registered["access_token"].is_string());
    assert!(registered["refresh_token"].is_string());

    // Login with the same credentials
    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": email,
                "password": password
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let logged_in: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(logged_in["user_id"], registered["user_id"]);

    ctx.cleanup().await.unwrap();
}

/// Test that we can create a project via the API
#[tokio::test]
async fn test_create_project() {
    let ctx = TestContext::new().await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/projects")
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": format!("My App {}", Uuid::new_v4()),
                "description": "Integration test project"
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if status != StatusCode::OK {
        panic!(
            "Expected 200 OK, got {}: {}",
            status,
            String::from_utf8_lossy(&body)
        );
    }

    let response_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // The plaintext key is only shown once, on creation
    let api_key = response_json["api_key"].as_str().unwrap();
    assert!(api_key.starts_with("plinth_"));
    assert_eq!(response_json["project"]["provisioning_status"], "pending");
    assert!(response_json["project"]["slug"].is_string());

    // Cleanup the extra project before the context project
    let project_id = Uuid::parse_str(response_json["project"]["id"].as_str().unwrap()).unwrap();
    Project::delete(&ctx.db, project_id).await.unwrap();

    ctx.cleanup().await.unwrap();
}

/// Test authentication requirement on the control plane
#[tokio::test]
async fn test_authentication_required() {
    let ctx = TestContext::new().await.unwrap();

    // Request without auth header
    let request = Request::builder()
        .method("POST")
        .uri("/v1/projects")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "no-auth" }).to_string()))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

/// Test that the provisioner takes a pending project to completed
#[tokio::test]
async fn test_project_provisioning() {
    let ctx = TestContext::new().await.unwrap();

    // Start provisioner in background
    let provisioner = Provisioner::with_config(
        ctx.db.clone(),
        ctx.storage.clone(),
        WebhookNotifier::new(None),
        ProvisionerConfig {
            poll_interval_secs: 1,
        },
    );

    let shutdown_token = provisioner.shutdown_token();
    let worker_handle = tokio::spawn(async move { provisioner.run().await });

    // Wait for the test project to leave the pending state
    common::wait_for(
        || async {
            let project = Project::find_by_id(&ctx.db, ctx.project.id)
                .await
                .unwrap()
                .unwrap();
            project.provisioning_status == ProvisioningStatus::Completed
        },
        15,
    )
    .await
    .unwrap();

    // Verify the data space exists
    let bucket_exists = ctx
        .storage
        .bucket_exists(&ctx.project.bucket_name)
        .await
        .unwrap();
    assert!(bucket_exists, "Provisioner should create the bucket");

    // Shutdown worker
    shutdown_token.cancel();
    let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), worker_handle).await;

    ctx.cleanup().await.unwrap();
}

/// Test invitation lifecycle: invite, accept, and last-owner protection
#[tokio::test]
async fn test_invitation_lifecycle() {
    let ctx = TestContext::new().await.unwrap();
    let (invitee, invitee_token) = common::create_second_user(&ctx).await.unwrap();

    // Invite as editor
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/members", ctx.project.id))
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": invitee.email,
                "role": "editor",
                "message": "Join my project"
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let invitation: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(invitation["status"], "pending");
    let membership_id = invitation["id"].as_str().unwrap();

    // Invitee sees it in their pending list
    let request = Request::builder()
        .method("GET")
        .uri("/v1/invitations")
        .header("authorization", format!("Bearer {}", invitee_token))
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Invitee accepts
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/invitations/{}/accept", membership_id))
        .header("authorization", format!("Bearer {}", invitee_token))
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let role = ProjectMembership::get_role(&ctx.db, ctx.project.id, invitee.id)
        .await
        .unwrap();
    assert_eq!(role, Some(ProjectRole::Editor));

    // The project now shows up in the invitee's listing with their role
    let request = Request::builder()
        .method("GET")
        .uri("/v1/projects")
        .header("authorization", format!("Bearer {}", invitee_token))
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let listing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let entry = listing["projects"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == ctx.project.id.to_string())
        .expect("Accepted project should appear in the invitee's listing");
    assert_eq!(entry["role"], "editor");

    // The owner cannot revoke their own last-owner membership
    let owner_membership = ProjectMembership::find(&ctx.db, ctx.project.id, ctx.user.id)
        .await
        .unwrap()
        .unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri(format!(
            "/v1/projects/{}/members/{}",
            ctx.project.id, owner_membership.id
        ))
        .header("authorization", ctx.auth_header())
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    plinth_shared::models::user::User::delete(&ctx.db, invitee.id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

/// Test that a rejected invitation can be re-sent
#[tokio::test]
async fn test_reject_and_reinvite() {
    let ctx = TestContext::new().await.unwrap();
    let (invitee, invitee_token) = common::create_second_user(&ctx).await.unwrap();

    let invite = |role: &'static str| {
        let uri = format!("/v1/projects/{}/members", ctx.project.id);
        let auth = ctx.auth_header();
        let email = invitee.email.clone();
        let mut app = ctx.app.clone();
        async move {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", auth)
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "email": email, "role": role }).to_string(),
                ))
                .unwrap();
            app.call(request).await.unwrap()
        }
    };

    let response = invite("viewer").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let invitation: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let membership_id = invitation["id"].as_str().unwrap().to_string();

    // Reject
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/invitations/{}/reject", membership_id))
        .header("authorization", format!("Bearer {}", invitee_token))
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Re-invite resets the same row to pending with the new role
    let response = invite("editor").await;
    assert_eq!(response.status(), StatusCode::OK);

    let membership = ProjectMembership::find(&ctx.db, ctx.project.id, invitee.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.status, InvitationStatus::Pending);
    assert_eq!(membership.role, ProjectRole::Editor);

    plinth_shared::models::user::User::delete(&ctx.db, invitee.id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

/// Test table DDL and row CRUD through the data plane with an API key
#[tokio::test]
async fn test_table_and_row_crud() {
    let mut ctx = TestContext::new().await.unwrap();
    ctx.provision().await.unwrap();

    // Create table
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "notes",
                "columns": [
                    { "name": "title", "type": "text", "nullable": false },
                    { "name": "stars", "type": "integer" }
                ]
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if status != StatusCode::OK {
        panic!(
            "Expected 200 OK, got {}: {}",
            status,
            String::from_utf8_lossy(&body)
        );
    }

    // Insert a row
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/tables/notes/rows", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "title": "hello", "stars": 5 }).to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let row: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(row["title"], "hello");
    let row_id = row["id"].as_str().unwrap();

    // List rows
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/tables/notes/rows", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let listed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed["rows"].as_array().unwrap().len(), 1);

    // Update the row
    let request = Request::builder()
        .method("PATCH")
        .uri(format!(
            "/v1/projects/{}/tables/notes/rows/{}",
            ctx.project.id, row_id
        ))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "stars": 4 }).to_string()))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete the row
    let request = Request::builder()
        .method("DELETE")
        .uri(format!(
            "/v1/projects/{}/tables/notes/rows/{}",
            ctx.project.id, row_id
        ))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let deleted: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(deleted["deleted"], true);

    ctx.cleanup().await.unwrap();
}

/// Test row quota enforcement at max_items
#[tokio::test]
async fn test_row_quota_enforced() {
    let mut ctx = TestContext::with_project(CreateProject {
        max_items: Some(1),
        ..Default::default()
    })
    .await
    .unwrap();
    ctx.provision().await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "items",
                "columns": [{ "name": "label", "type": "text" }]
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let insert = |label: &'static str| {
        let uri = format!("/v1/projects/{}/tables/items/rows", ctx.project.id);
        let key = ctx.api_key.clone();
        let mut app = ctx.app.clone();
        async move {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("x-api-key", key)
                .header("content-type", "application/json")
                .body(Body::from(json!({ "label": label }).to_string()))
                .unwrap();
            app.call(request).await.unwrap()
        }
    };

    // First row fits the quota
    let response = insert("first").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Second row exceeds max_items
    let response = insert("second").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "quota_exceeded");

    ctx.cleanup().await.unwrap();
}

/// Test that rotating the API key invalidates the old one immediately
#[tokio::test]
async fn test_rotate_api_key() {
    let mut ctx = TestContext::new().await.unwrap();
    ctx.provision().await.unwrap();

    let list_tables = |key: String| {
        let uri = format!("/v1/projects/{}/tables", ctx.project.id);
        let mut app = ctx.app.clone();
        async move {
            let request = Request::builder()
                .method("GET")
                .uri(uri)
                .header("x-api-key", key)
                .body(Body::empty())
                .unwrap();
            app.call(request).await.unwrap()
        }
    };

    // The original key works before rotation
    let response = list_tables(ctx.api_key.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/rotate-key", ctx.project.id))
        .header("authorization", ctx.auth_header())
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let rotated: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let new_key = rotated["api_key"].as_str().unwrap().to_string();
    assert!(new_key.starts_with("plinth_"));
    assert_ne!(new_key, ctx.api_key);

    // Old key is dead, new key works
    let response = list_tables(ctx.api_key.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = list_tables(new_key).await;
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

/// Test that quotas cannot be reduced below measured usage
#[tokio::test]
async fn test_quota_update_below_usage() {
    let mut ctx = TestContext::new().await.unwrap();
    ctx.provision().await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "entries",
                "columns": [{ "name": "label", "type": "text" }]
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for label in ["one", "two"] {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/v1/projects/{}/tables/entries/rows", ctx.project.id))
            .header("x-api-key", &ctx.api_key)
            .header("content-type", "application/json")
            .body(Body::from(json!({ "label": label }).to_string()))
            .unwrap();

        let response = ctx.app.clone().call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Two rows exist, so max_items = 1 is rejected
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/v1/projects/{}", ctx.project.id))
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from(json!({ "max_items": 1 }).to_string()))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_quota");

    // A quota at or above usage is accepted
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/v1/projects/{}", ctx.project.id))
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from(json!({ "max_items": 2 }).to_string()))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

/// Test rate limit headers on data plane responses
#[tokio::test]
async fn test_rate_limit_headers() {
    let mut ctx = TestContext::new().await.unwrap();
    ctx.provision().await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Verify rate limit headers are present
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    ctx.cleanup().await.unwrap();
}

/// Test anonymous access to a public project is read-only
#[tokio::test]
async fn test_public_read_anonymous() {
    let mut ctx = TestContext::with_project(CreateProject {
        is_public: true,
        ..Default::default()
    })
    .await
    .unwrap();
    ctx.provision().await.unwrap();

    // Anonymous read succeeds on a public project
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Anonymous write is rejected
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/tables", ctx.project.id))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "secrets",
                "columns": [{ "name": "value", "type": "text" }]
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

/// Test file upload, download, list, and delete through the storage proxy
#[tokio::test]
async fn test_file_storage_roundtrip() {
    let mut ctx = TestContext::new().await.unwrap();
    ctx.provision().await.unwrap();

    let content = b"hello from plinth".to_vec();

    // Upload
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/v1/projects/{}/files/docs/readme.txt", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .header("content-type", "text/plain")
        .body(Body::from(content.clone()))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if status != StatusCode::OK {
        panic!(
            "Expected 200 OK, got {}: {}",
            status,
            String::from_utf8_lossy(&body)
        );
    }
    let stored: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stored["key"], "docs/readme.txt");

    // Download returns the bytes with the stored content type
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/files/docs/readme.txt", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), content.as_slice());

    // List
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/files", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let listed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed["files"].as_array().unwrap().len(), 1);

    // Delete
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/projects/{}/files/docs/readme.txt", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Download after delete is a 404
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/projects/{}/files/docs/readme.txt", ctx.project.id))
        .header("x-api-key", &ctx.api_key)
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

/// Test storage quota enforcement on upload
#[tokio::test]
async fn test_storage_quota_enforced() {
    let mut ctx = TestContext::with_project(CreateProject {
        storage_limit_mb: Some(1),
        ..Default::default()
    })
    .await
    .unwrap();
    ctx.provision().await.unwrap();

    let upload = |key: &'static str| {
        let uri = format!("/v1/projects/{}/files/{}", ctx.project.id, key);
        let api_key = ctx.api_key.clone();
        let mut app = ctx.app.clone();
        async move {
            let request = Request::builder()
                .method("PUT")
                .uri(uri)
                .header("x-api-key", api_key)
                .header("content-type", "application/octet-stream")
                .body(Body::from(vec![0u8; 600 * 1024]))
                .unwrap();
            app.call(request).await.unwrap()
        }
    };

    // First upload fits under the 1 MB limit
    let response = upload("first.bin").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Second upload would push usage past the limit
    let response = upload("second.bin").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "quota_exceeded");

    ctx.cleanup().await.unwrap();
}

/// Test that the sweeper expires stale pending invitations
#[tokio::test]
async fn test_invitation_expiry() {
    let ctx = TestContext::new().await.unwrap();
    let (invitee, _token) = common::create_second_user(&ctx).await.unwrap();

    let membership = ProjectMembership::invite(
        &ctx.db,
        plinth_shared::models::membership::InviteMember {
            project_id: ctx.project.id,
            user_id: invitee.id,
            role: ProjectRole::Viewer,
            invited_by: Some(ctx.user.id),
            message: None,
        },
    )
    .await
    .unwrap();

    // Backdate the invitation past the TTL
    sqlx::query("UPDATE project_memberships SET invited_at = NOW() - INTERVAL '30 days' WHERE id = $1")
        .bind(membership.id)
        .execute(&ctx.db)
        .await
        .unwrap();

    let expired = ProjectMembership::expire_stale(&ctx.db, 14).await.unwrap();
    assert!(expired >= 1);

    let membership = ProjectMembership::find_by_id(&ctx.db, membership.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.status, InvitationStatus::Expired);
    assert!(membership.status.allows_reinvite());

    plinth_shared::models::user::User::delete(&ctx.db, invitee.id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}
