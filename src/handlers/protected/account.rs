use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use bson::doc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{Activity, ActivityType, ApiUsageView, Notification, NotificationType, PlatformUser, Schema};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::observer::ObserverEvent;
use crate::state::AppState;

const RECENT_ACTIVITY_LIMIT: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct ConnectionRequest {
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub database_name: String,
}

impl ConnectionRequest {
    fn parts(&self) -> Result<(&str, &str), ApiError> {
        let uri = self.mongodb_uri.trim();
        let database = self.database_name.trim();
        if uri.is_empty() || database.is_empty() {
            return Err(ApiError::bad_request("MongoDB URI and database name are required"));
        }
        Ok((uri, database))
    }
}

/// GET /auth/me - the signed-in account
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let user = state.accounts().find(auth.user_id).await?;
    Ok(ApiResponse::success(json!({ "user": user.to_view() })))
}

/// Tries the connection; a failure also lands in the account's notifications
async fn check_connection(state: &AppState, user: &PlatformUser, uri: &str, database: &str) -> Result<(), ApiError> {
    if let Err(e) = state.tenants.test_connection(uri, database).await {
        tracing::warn!("Account {} failed to connect its database: {}", user.id, e);
        state.observers.emit(ObserverEvent::Notification(Notification::new(
            user.id,
            "MongoDB Connection Failed",
            format!("Hi {}, we could not connect to your MongoDB database: {}", user.name, e),
            NotificationType::Error,
        )));
        return Err(ApiError::bad_request(format!("Failed to connect to MongoDB: {}", e)));
    }
    Ok(())
}

/// POST /auth/test-mongodb - check a connection without saving it
pub async fn test_mongodb(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ConnectionRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (uri, database) = request.parts()?;
    let user = state.accounts().find(auth.user_id).await?;

    check_connection(&state, &user, uri, database).await?;
    Ok(ApiResponse::success(json!({
        "message": "MongoDB connection successful",
        "connected": true,
    })))
}

/// PUT /auth/mongodb-uri - test and store the tenant database connection
pub async fn update_mongodb_uri(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ConnectionRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (uri, database) = request.parts()?;

    let accounts = state.accounts();
    let user = accounts.find(auth.user_id).await?;

    check_connection(&state, &user, uri, database).await?;
    accounts.set_connection(user.id, uri, database).await?;

    state.observers.emit(ObserverEvent::Notification(Notification::new(
        user.id,
        "MongoDB Connected",
        format!("Hi {}, your database '{}' is connected and ready to use.", user.name, database),
        NotificationType::Success,
    )));
    state.observers.emit(ObserverEvent::Activity(
        Activity::new(user.id, ActivityType::Connect, "MongoDB database connected")
            .describe("Custom MongoDB database connection configured")
            .on("database", database)
            .with_metadata(doc! { "database_name": database }),
    ));

    Ok(ApiResponse::success(json!({ "message": "MongoDB URI updated successfully" })))
}

/// GET /user/dashboard - account summary with its schemas and latest activity
pub async fn dashboard(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let accounts = state.accounts();
    let user = accounts.find(auth.user_id).await?;
    let schemas = state.schemas().list(user.id).await?;
    let recent = accounts.recent_activities(user.id, RECENT_ACTIVITY_LIMIT).await?;
    let has_custom_db = user.mongodb_uri.as_deref().is_some_and(|uri| !uri.is_empty());

    Ok(ApiResponse::success(json!({
        "user": {
            "id": user.id.to_hex(),
            "name": user.name,
            "email": user.email,
            "api_key": user.api_key,
            "mongodb_uri": has_custom_db,
            "database_name": user.database_name,
            "created_at": user.created_at.to_chrono(),
            "last_login": user.last_login.map(|d| d.to_chrono()),
        },
        "stats": {
            "total_schemas": schemas.len(),
            "api_usage": ApiUsageView::from(&user.api_usage),
            "has_custom_db": has_custom_db,
        },
        "schemas": schemas.iter().map(Schema::to_view).collect::<Vec<_>>(),
        "recent_activities": recent.iter().map(Activity::to_view).collect::<Vec<_>>(),
    })))
}

/// POST /user/regenerate-api-key
pub async fn regenerate_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    let api_key = state.accounts().regenerate_api_key(auth.user_id).await?;

    state.observers.emit(ObserverEvent::Activity(
        Activity::new(auth.user_id, ActivityType::Security, "Generated new API key")
            .describe("API key regenerated for security"),
    ));

    Ok(ApiResponse::success(json!({
        "message": "API key regenerated successfully",
        "api_key": api_key,
    })))
}

/// GET /user/api-usage
pub async fn api_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<ApiUsageView> {
    let user = state.accounts().find(auth.user_id).await?;
    Ok(ApiResponse::success(ApiUsageView::from(&user.api_usage)))
}
