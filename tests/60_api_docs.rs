mod common;

use anyhow::Result;
use common::{accounts_schema, orders_schemas, TestServer};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn docs_reflect_schemas_and_protection() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.connected_owner("docs@example.com").await?;
    let (customers, orders) = orders_schemas();
    server.create_schema(&owner, customers).await?;
    server.create_schema(&owner, orders).await?;

    let res = server
        .platform(&owner, Method::GET, "/user/api-docs")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let doc: Value = res.json().await?;

    assert_eq!(doc["swagger"], "2.0");
    assert_eq!(doc["basePath"], "/api");
    assert_eq!(doc["schemes"], json!(["https"]));
    assert_eq!(doc["host"], format!("127.0.0.1:{}", server.port));
    assert!(doc["securityDefinitions"]["ApiKeyAuth"].is_object());
    assert!(doc["securityDefinitions"].get("BearerAuth").is_none());

    assert!(doc["paths"]["/orders"]["post"].is_object());
    assert!(doc["paths"]["/orders/{id}"]["delete"].is_object());
    assert_eq!(doc["definitions"]["Orders"]["properties"]["customer"]["x-relation-target"], "customers");
    assert!(doc["definitions"]["Customers"]["properties"].get("notes").is_none());
    assert!(doc["definitions"]["OrdersInput"].is_object());

    let text = doc.to_string();
    assert!(!text.contains(&owner.api_key));
    Ok(())
}

#[tokio::test]
async fn docs_accept_query_token_and_list_bearer_security() -> Result<()> {
    let server = TestServer::start().await?;
    let owner = server.connected_owner("docs-auth@example.com").await?;
    server.create_schema(&owner, accounts_schema(json!({ "delete": true }))).await?;

    let res = server
        .client
        .get(server.url(&format!("/user/api-docs?token={}", owner.token)))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let doc: Value = res.json().await?;

    assert_eq!(doc["schemes"], json!(["http"]));
    assert!(doc["securityDefinitions"]["BearerAuth"].is_object());
    assert!(doc["paths"]["/accounts/auth/signup"]["post"].is_object());
    assert!(doc["paths"]["/accounts/auth/login"]["post"].is_object());
    assert_eq!(
        doc["paths"]["/accounts/{id}"]["delete"]["security"],
        json!([{ "ApiKeyAuth": [], "BearerAuth": [] }])
    );
    assert!(doc["paths"]["/accounts/{id}"]["get"].get("security").is_none());

    let res = server.client.get(server.url("/user/api-docs")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
