#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use schemacraft_api::config::AppConfig;
use schemacraft_api::{app, AppState};

/// The real router on a free local port, backed by in-memory storage
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// A platform account created through the public API
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: String,
    pub email: String,
    pub token: String,
    pub api_key: String,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.security.bcrypt_cost = 4;
    config
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state = AppState::in_memory(config);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self { port, base_url, state, client: reqwest::Client::new() };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request authenticated with a platform token
    pub fn platform(&self, owner: &Owner, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(&owner.token)
    }

    /// Request against the dynamic API, keyed by the owner's API key
    pub fn api(&self, owner: &Owner, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(&format!("/api{}", path)))
            .header("X-API-Key", &owner.api_key)
    }

    pub async fn signup_owner(&self, email: &str) -> Result<Owner> {
        let resp = self
            .client
            .post(self.url("/auth/signup"))
            .json(&json!({ "name": "Test Owner", "email": email, "password": "password123" }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "signup failed: {}", resp.status());
        let body: Value = resp.json().await?;

        Ok(Owner {
            id: body["user"]["id"].as_str().context("user id")?.to_string(),
            email: email.to_string(),
            token: body["token"].as_str().context("token")?.to_string(),
            api_key: body["user"]["api_key"].as_str().context("api key")?.to_string(),
        })
    }

    /// Owner with a connected tenant database
    pub async fn connected_owner(&self, email: &str) -> Result<Owner> {
        let owner = self.signup_owner(email).await?;
        let database = format!("tenant_{}", &owner.id[owner.id.len() - 8..]);
        let resp = self
            .platform(&owner, Method::PUT, "/auth/mongodb-uri")
            .json(&json!({ "mongodb_uri": "mongodb://localhost:27017", "database_name": database }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "connect failed: {}", resp.status());
        Ok(owner)
    }

    pub async fn create_schema(&self, owner: &Owner, definition: Value) -> Result<Value> {
        let resp = self
            .platform(owner, Method::POST, "/schemas")
            .json(&definition)
            .send()
            .await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        anyhow::ensure!(status == StatusCode::CREATED, "schema create failed: {} {}", status, body);
        Ok(body)
    }

    /// Wait for queued side effects (usage, activities, notifications)
    pub async fn settle(&self) {
        self.state.observers.flush().await;
    }
}

/// `customers` + `orders` with a relation between them
pub fn orders_schemas() -> (Value, Value) {
    let customers = json!({
        "collection_name": "customers",
        "fields": [
            { "name": "name", "type": "string", "required": true },
            { "name": "notes", "type": "string", "visibility": "private" }
        ]
    });
    let orders = json!({
        "collection_name": "orders",
        "fields": [
            { "name": "amount", "type": "number", "required": true },
            { "name": "status", "type": "string", "default": "pending" },
            { "name": "customer", "type": "relation", "target": "customers" }
        ]
    });
    (customers, orders)
}

/// Auth-enabled `accounts` collection
pub fn accounts_schema(protection: Value) -> Value {
    json!({
        "collection_name": "accounts",
        "fields": [
            { "name": "email", "type": "string", "required": true },
            { "name": "pwd", "type": "string", "required": true },
            { "name": "nickname", "type": "string" }
        ],
        "auth_config": {
            "enabled": true,
            "login_fields": { "email_field": "email", "username_field": "nickname", "allow_both": true },
            "password_field": "pwd"
        },
        "endpoint_protection": protection
    })
}
