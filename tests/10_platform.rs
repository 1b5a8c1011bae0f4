mod common;

use anyhow::Result;
use common::TestServer;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn health_and_root_respond() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");

    let body: Value = server.client.get(server.url("/")).send().await?.json().await?;
    assert_eq!(body["name"], "SchemaCraft API");
    assert!(body["endpoints"].is_object());
    Ok(())
}

#[tokio::test]
async fn signup_then_signin_returns_tokens() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.signup_owner("Owner@Example.com").await?;
    assert_eq!(owner.api_key.len(), 64);

    let res = server
        .client
        .post(server.url("/auth/signin"))
        .json(&json!({ "email": "owner@example.com", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["token"].as_str().is_some());
    assert!(body["user"].get("password").is_none());

    let res = server
        .client
        .post(server.url("/auth/signin"))
        .json(&json!({ "email": "owner@example.com", "password": "wrong-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_conflicts() -> Result<()> {
    let server = TestServer::start().await?;
    server.signup_owner("dup@example.com").await?;

    let res = server
        .client
        .post(server.url("/auth/signup"))
        .json(&json!({ "name": "Again", "email": "dup@example.com", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "User already exists");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_bearer() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/auth/me")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Missing Authorization header");

    let res = server
        .client
        .get(server.url("/schemas"))
        .header("Authorization", "Token abc")
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Authorization header must use Bearer token format");

    let res = server.client.get(server.url("/schemas")).bearer_auth("garbage").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn me_usage_and_key_rotation() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.signup_owner("me@example.com").await?;

    let body: Value = server.platform(&owner, Method::GET, "/auth/me").send().await?.json().await?;
    assert_eq!(body["user"]["email"], "me@example.com");
    assert_eq!(body["user"]["mongodb_configured"], false);

    let body: Value = server.platform(&owner, Method::GET, "/user/api-usage").send().await?.json().await?;
    assert_eq!(body["monthly_quota"], 1000);
    assert_eq!(body["used_this_month"], 0);
    assert_eq!(body["remaining"], 1000);

    let res = server.platform(&owner, Method::POST, "/user/regenerate-api-key").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let new_key = body["api_key"].as_str().unwrap_or_default().to_string();
    assert_eq!(new_key.len(), 64);
    assert_ne!(new_key, owner.api_key);

    // The old key stops working
    let res = server.api(&owner, Method::GET, "/anything").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid API key");
    Ok(())
}

#[tokio::test]
async fn connecting_a_database_notifies_and_logs() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.connected_owner("connect@example.com").await?;
    server.settle().await;

    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    let notifications = body["notifications"].as_array().cloned().unwrap_or_default();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "success");
    assert_eq!(body["pagination"]["total"], 1);

    let id = notifications[0]["id"].as_str().unwrap_or_default().to_string();
    let res = server
        .platform(&owner, Method::PUT, &format!("/notifications/{}/read", id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    assert_eq!(body["notifications"][0]["is_read"], true);

    let body: Value = server.platform(&owner, Method::GET, "/activities").send().await?.json().await?;
    let actions: Vec<&str> = body["activities"]
        .as_array()
        .map(|a| a.iter().filter_map(|x| x["action"].as_str()).collect())
        .unwrap_or_default();
    assert!(actions.contains(&"MongoDB database connected"));
    assert!(actions.contains(&"signup"));
    Ok(())
}

#[tokio::test]
async fn rejected_connection_is_a_client_error() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.signup_owner("badconn@example.com").await?;

    let res = server
        .platform(&owner, Method::PUT, "/auth/mongodb-uri")
        .json(&json!({ "mongodb_uri": "postgres://nope", "database_name": "shop" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Failed to connect to MongoDB"));

    server.settle().await;
    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    assert_eq!(body["notifications"][0]["type"], "error");
    Ok(())
}

#[tokio::test]
async fn notification_housekeeping() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.connected_owner("feed@example.com").await?;

    // A failed check adds an error notification and saves nothing
    let res = server
        .platform(&owner, Method::POST, "/auth/test-mongodb")
        .json(&json!({ "mongodb_uri": "postgres://nope", "database_name": "shop" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    server.settle().await;

    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    assert_eq!(body["unread_count"], 2);
    let body: Value = server
        .platform(&owner, Method::GET, "/notifications/unread-count")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["unread_count"], 2);

    let res = server.platform(&owner, Method::PUT, "/notifications/read-all").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "All notifications marked as read");

    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    assert_eq!(body["unread_count"], 0);
    let id = body["notifications"][0]["id"].as_str().unwrap_or_default().to_string();

    let res = server
        .platform(&owner, Method::DELETE, &format!("/notifications/{}", id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Notification deleted successfully");

    let res = server
        .platform(&owner, Method::DELETE, &format!("/notifications/{}", id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.platform(&owner, Method::DELETE, "/notifications/not-an-id").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid notification ID");

    // Another account cannot touch this feed
    let other = server.signup_owner("other-feed@example.com").await?;
    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    let remaining = body["notifications"][0]["id"].as_str().unwrap_or_default().to_string();
    let res = server
        .platform(&other, Method::DELETE, &format!("/notifications/{}", remaining))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn connection_check_does_not_save() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.signup_owner("check@example.com").await?;

    let res = server
        .platform(&owner, Method::POST, "/auth/test-mongodb")
        .json(&json!({ "mongodb_uri": "mongodb://localhost:27017", "database_name": "shop" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["connected"], true);
    assert_eq!(body["message"], "MongoDB connection successful");

    let body: Value = server.platform(&owner, Method::GET, "/auth/me").send().await?.json().await?;
    assert_eq!(body["user"]["mongodb_configured"], false);

    let res = server
        .platform(&owner, Method::POST, "/auth/test-mongodb")
        .json(&json!({ "mongodb_uri": "", "database_name": "shop" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn dashboard_and_reported_activity() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.connected_owner("dash@example.com").await?;
    let (customers, _) = common::orders_schemas();
    server.create_schema(&owner, customers).await?;

    let res = server
        .platform(&owner, Method::POST, "/activities")
        .header("User-Agent", "dashboard-test")
        .json(&json!({
            "type": "api",
            "action": "Exported customers",
            "resource": "schema",
            "metadata": { "rows": 3 }
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["type"], "api");
    assert_eq!(body["user_agent"], "dashboard-test");
    assert_eq!(body["metadata"]["rows"], 3);

    let res = server
        .platform(&owner, Method::POST, "/activities")
        .json(&json!({ "type": "teleport", "action": "x" }))
        .send()
        .await?;
    assert!(res.status().is_client_error());

    server.settle().await;
    let body: Value = server.platform(&owner, Method::GET, "/user/dashboard").send().await?.json().await?;
    assert_eq!(body["user"]["email"], "dash@example.com");
    assert_eq!(body["user"]["mongodb_uri"], true);
    assert_eq!(body["stats"]["total_schemas"], 1);
    assert_eq!(body["stats"]["has_custom_db"], true);
    assert_eq!(body["stats"]["api_usage"]["monthly_quota"], 1000);
    assert_eq!(body["schemas"][0]["collection_name"], "customers");
    let recent = body["recent_activities"].as_array().cloned().unwrap_or_default();
    assert!(!recent.is_empty() && recent.len() <= 5);
    Ok(())
}
