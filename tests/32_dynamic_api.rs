mod common;

use anyhow::Result;
use common::{orders_schemas, Owner, TestServer};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

async fn shop(server: &TestServer, email: &str) -> Result<Owner> {
    let owner = server.connected_owner(email).await?;
    let (customers, orders) = orders_schemas();
    server.create_schema(&owner, customers).await?;
    server.create_schema(&owner, orders).await?;
    Ok(owner)
}

#[tokio::test]
async fn order_with_customer_is_populated() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = shop(&server, "orders@example.com").await?;

    let res = server
        .api(&owner, Method::POST, "/customers")
        .json(&json!({ "data": { "name": "Ada", "notes": "vip" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let customer: Value = res.json().await?;
    assert_eq!(customer["message"], "Document created successfully");
    assert!(customer["data"].get("notes").is_none());
    let customer_id = customer["id"].as_str().unwrap_or_default().to_string();

    let res = server
        .api(&owner, Method::POST, "/orders")
        .json(&json!({ "data": { "amount": 100, "customer": customer_id } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await?;
    assert_eq!(created["data"]["status"], "pending");
    let order_id = created["id"].as_str().unwrap_or_default().to_string();

    let res = server.api(&owner, Method::GET, &format!("/orders/{}", order_id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let order: Value = res.json().await?;
    assert_eq!(order["id"], order_id);
    assert_eq!(order["amount"], 100);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["customer"]["id"], customer_id);
    assert_eq!(order["customer"]["name"], "Ada");
    assert!(order["customer"].get("notes").is_none());
    assert!(order["created_at"].is_string());
    assert!(order["updated_at"].is_string());

    let res = server.api(&owner, Method::GET, "/customers").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await?;
    assert_eq!(listed["data"][0]["name"], "Ada");
    assert!(listed["data"][0].get("notes").is_none());
    Ok(())
}

#[tokio::test]
async fn writes_are_validated_before_anything_is_stored() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = shop(&server, "validate@example.com").await?;

    let res = server
        .api(&owner, Method::POST, "/orders")
        .json(&json!({ "data": { "status": "new" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field"], "amount");

    let res = server
        .api(&owner, Method::POST, "/orders")
        .json(&json!({ "amount": "lots" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // A well-formed id that points nowhere aborts the whole write
    let res = server
        .api(&owner, Method::POST, "/orders")
        .json(&json!({ "amount": 5, "customer": "64b7f0c2a1b2c3d4e5f60718" }))
        .send()
        .await?;
    assert!(res.status().is_client_error());

    let body: Value = server.api(&owner, Method::GET, "/orders").send().await?.json().await?;
    assert_eq!(body["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn list_paginates_newest_first() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = shop(&server, "pages@example.com").await?;

    for amount in 1..=3 {
        let res = server
            .api(&owner, Method::POST, "/orders")
            .json(&json!({ "data": { "amount": amount } }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let body: Value = server.api(&owner, Method::GET, "/orders?page=1&limit=2").send().await?.json().await?;
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 2, "total": 3, "total_pages": 2 }));
    assert_eq!(body["data"][0]["amount"], 3);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let body: Value = server.api(&owner, Method::GET, "/orders?page=2&limit=2").send().await?.json().await?;
    assert_eq!(body["data"][0]["amount"], 1);

    // Pages far past the end are empty, never a wrapped offset
    for page in ["9223372036854775807", "100000000000000000"] {
        let res = server
            .api(&owner, Method::GET, &format!("/orders?page={}&limit=100", page))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await?;
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["pagination"]["total"], 3);
    }
    Ok(())
}

#[tokio::test]
async fn update_and_delete() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = shop(&server, "update@example.com").await?;

    let created: Value = server
        .api(&owner, Method::POST, "/orders")
        .json(&json!({ "data": { "amount": 10 } }))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let res = server
        .api(&owner, Method::PUT, &format!("/orders/{}", id))
        .json(&json!({ "data": { "status": "shipped" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Document updated successfully");

    let order: Value = server.api(&owner, Method::GET, &format!("/orders/{}", id)).send().await?.json().await?;
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["amount"], 10);

    let res = server.api(&owner, Method::DELETE, &format!("/orders/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Document deleted successfully");

    let res = server.api(&owner, Method::GET, &format!("/orders/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Document not found");

    let res = server.api(&owner, Method::GET, "/orders/xyz").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid document ID");
    Ok(())
}

#[tokio::test]
async fn owners_are_isolated() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = shop(&server, "alice@example.com").await?;
    let bob = server.connected_owner("bob@example.com").await?;

    let res = server
        .api(&alice, Method::POST, "/customers")
        .json(&json!({ "name": "Only Alice" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server.api(&bob, Method::GET, "/customers").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Schema not found");
    Ok(())
}

#[tokio::test]
async fn api_key_is_required() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/api/orders")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "API key required");
    Ok(())
}

#[tokio::test]
async fn unconnected_owner_gets_configuration_error() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.signup_owner("lonely@example.com").await?;

    let res = server.api(&owner, Method::GET, "/orders").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Please configure your MongoDB connection first");
    Ok(())
}

#[tokio::test]
async fn monthly_quota_is_enforced() -> Result<()> {
    let mut config = common::test_config();
    config.api.default_monthly_quota = 3;
    config.api.usage_warning_threshold = 2;
    let server = TestServer::start_with(config).await?;
    let owner = shop(&server, "quota@example.com").await?;

    for _ in 0..3 {
        let res = server.api(&owner, Method::GET, "/orders").send().await?;
        assert_eq!(res.status(), StatusCode::OK);
        server.settle().await;
    }

    let res = server.api(&owner, Method::GET, "/orders").send().await?;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "API quota exceeded");
    assert_eq!(body["quota_info"]["used"], 3);
    assert_eq!(body["quota_info"]["limit"], 3);

    let usage: Value = server.platform(&owner, Method::GET, "/user/api-usage").send().await?.json().await?;
    assert_eq!(usage["used_this_month"], 3);
    assert_eq!(usage["total_requests"], 3);
    assert_eq!(usage["remaining"], 0);

    let body: Value = server.platform(&owner, Method::GET, "/notifications").send().await?.json().await?;
    let titles: Vec<&str> = body["notifications"]
        .as_array()
        .map(|n| n.iter().filter_map(|x| x["title"].as_str()).collect())
        .unwrap_or_default();
    assert!(titles.contains(&"API Usage Warning"));
    assert!(titles.contains(&"API Quota Exceeded"));
    Ok(())
}
