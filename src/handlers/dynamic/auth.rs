use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Schema;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ApiUser, TenantStore};
use crate::services::dynamic_auth::{AuthSession, DynamicAuthError, DynamicAuthService};
use crate::state::AppState;

use super::document_body;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "email")]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

async fn auth_schema(state: &AppState, owner: &ApiUser, collection: &str) -> Result<Schema, ApiError> {
    state
        .schemas()
        .find_active_by_name(owner.0.id, collection)
        .await?
        .filter(|schema| schema.auth().is_some())
        .ok_or_else(|| DynamicAuthError::NotEnabled.into())
}

fn service(state: &AppState, owner: &ApiUser, tenant: &TenantStore) -> DynamicAuthService {
    DynamicAuthService::new(
        state.platform.clone(),
        tenant.0.clone(),
        owner.0.id,
        state.config.security.bcrypt_cost,
    )
}

fn session_body(message: &str, session: AuthSession) -> Value {
    json!({
        "message": message,
        "token": session.token,
        "user": session.user,
        "expires_at": session.expires_at,
    })
}

/// POST /api/:collection/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Path(collection): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let input = document_body(body)?;
    let schema = auth_schema(&state, &owner, &collection).await?;

    let session = service(&state, &owner, &tenant).signup(&schema, &input).await?;
    Ok(ApiResponse::created(session_body("User created successfully", session)))
}

/// POST /api/:collection/auth/login
pub async fn login(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Path(collection): Path<String>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let schema = auth_schema(&state, &owner, &collection).await?;

    let session = service(&state, &owner, &tenant)
        .login(&schema, &request.identifier, &request.password)
        .await?;
    Ok(ApiResponse::success(session_body("Login successful", session)))
}

/// GET /api/:collection/auth/validate
pub async fn validate(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let schema = auth_schema(&state, &owner, &collection).await?;

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Authorization header required"))?;
    let token = crate::auth::bearer_token(header).ok_or_else(|| ApiError::unauthorized("Bearer token required"))?;

    let claims = service(&state, &owner, &tenant).validate(&schema, token)?;
    Ok(ApiResponse::success(json!({
        "valid": true,
        "user_id": claims.schema_user_id,
        "collection": claims.collection,
        "expires_at": claims.expires_at(),
    })))
}
