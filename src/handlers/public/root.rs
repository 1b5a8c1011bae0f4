use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service name, version and endpoint map
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "SchemaCraft API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Define a collection schema, get authenticated CRUD endpoints over your own MongoDB",
        "endpoints": {
            "health": "/health (public)",
            "auth": "/auth/signup, /auth/signin (public), /auth/me, /auth/mongodb-uri, /auth/test-mongodb (platform token)",
            "user": "/user/dashboard, /user/regenerate-api-key, /user/api-usage, /user/api-docs (platform token)",
            "schemas": "/schemas[/:id] (platform token)",
            "activities": "/activities (platform token)",
            "notifications": "/notifications[/unread-count|/read-all|/:id[/read]] (platform token)",
            "admin": "/admin/users[/:id[/toggle-status|/revoke-api-key|/reset-quota]] (admin token)",
            "data": "/api/:collection[/:id] (API key, collection token when protected)",
            "dynamic_auth": "/api/:collection/auth/signup|login|validate (API key)",
        }
    }))
}

/// GET /health - pings the platform database
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.platform.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
