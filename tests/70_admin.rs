mod common;

use anyhow::Result;
use common::{test_config, TestServer};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

const ADMIN_EMAIL: &str = "root@example.com";

async fn start_with_admin() -> Result<TestServer> {
    let mut config = test_config();
    config.security.admin_emails = vec![ADMIN_EMAIL.to_string()];
    TestServer::start_with(config).await
}

#[tokio::test]
async fn admin_routes_need_an_admin_account() -> Result<()> {
    let server = start_with_admin().await?;
    let owner = server.signup_owner("plain@example.com").await?;

    let res = server.client.get(server.url("/admin/users")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.platform(&owner, Method::GET, "/admin/users").send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Admin access required");
    Ok(())
}

#[tokio::test]
async fn admin_lists_and_inspects_users() -> Result<()> {
    let server = start_with_admin().await?;
    let admin = server.signup_owner(ADMIN_EMAIL).await?;
    let owner = server.signup_owner("listed@example.com").await?;

    let res = server.platform(&admin, Method::GET, "/admin/users?page=1&limit=1").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["users"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["pagination"]["total"], 2);
    assert!(body["users"][0].get("password").is_none());

    let body: Value = server
        .platform(&admin, Method::GET, &format!("/admin/users/{}", owner.id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["email"], "listed@example.com");

    let res = server.platform(&admin, Method::GET, "/admin/users/nope").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid user ID");

    let res = server
        .platform(&admin, Method::GET, "/admin/users/0123456789abcdef01234567")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "User not found");
    Ok(())
}

#[tokio::test]
async fn deactivation_locks_the_account_out() -> Result<()> {
    let server = start_with_admin().await?;
    let admin = server.signup_owner(ADMIN_EMAIL).await?;
    let owner = server.signup_owner("locked@example.com").await?;

    let res = server
        .platform(&admin, Method::PUT, &format!("/admin/users/{}/toggle-status", owner.id))
        .json(&json!({ "is_active": false }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "User deactivated successfully");

    let res = server
        .client
        .post(server.url("/auth/signin"))
        .json(&json!({ "email": "locked@example.com", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.api(&owner, Method::GET, "/anything").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = server
        .platform(&admin, Method::PUT, &format!("/admin/users/{}/toggle-status", owner.id))
        .json(&json!({ "is_active": true }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["message"], "User activated successfully");

    let res = server
        .client
        .post(server.url("/auth/signin"))
        .json(&json!({ "email": "locked@example.com", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn revoke_key_and_reset_quota() -> Result<()> {
    let server = start_with_admin().await?;
    let admin = server.signup_owner(ADMIN_EMAIL).await?;
    let owner = server.connected_owner("keyed@example.com").await?;
    let (customers, _) = common::orders_schemas();
    server.create_schema(&owner, customers).await?;

    let res = server.api(&owner, Method::GET, "/customers").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    server.settle().await;
    let body: Value = server.platform(&owner, Method::GET, "/user/api-usage").send().await?.json().await?;
    assert_eq!(body["used_this_month"], 1);

    let res = server
        .platform(&admin, Method::POST, &format!("/admin/users/{}/reset-quota", owner.id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "User quota reset successfully");
    let body: Value = server.platform(&owner, Method::GET, "/user/api-usage").send().await?.json().await?;
    assert_eq!(body["used_this_month"], 0);

    let res = server
        .platform(&admin, Method::POST, &format!("/admin/users/{}/revoke-api-key", owner.id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "API key revoked successfully");

    let res = server.api(&owner, Method::GET, "/customers").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The owner can still issue a fresh key
    let body: Value = server
        .platform(&owner, Method::POST, "/user/regenerate-api-key")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["api_key"].as_str().map(str::len), Some(64));
    Ok(())
}

#[tokio::test]
async fn demoted_admin_token_stops_working() -> Result<()> {
    let server = start_with_admin().await?;
    let admin = server.signup_owner(ADMIN_EMAIL).await?;
    let other = server.signup_owner("second@example.com").await?;

    // Deactivating the admin's own account revokes access for the token it still holds
    let res = server
        .platform(&admin, Method::PUT, &format!("/admin/users/{}/toggle-status", admin.id))
        .json(&json!({ "is_active": false }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .platform(&admin, Method::GET, &format!("/admin/users/{}", other.id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
