use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{Activity, ActivityType, PlatformUser, PlatformUserView};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::observer::ObserverEvent;
use crate::state::AppState;
use crate::types::PageQuery;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub is_active: bool,
}

fn parse_user_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid user ID"))
}

/// Admin actions are kept in the acting admin's own audit trail
fn audit(state: &AppState, admin: &AuthUser, action: &str, target: ObjectId) {
    state.observers.emit(ObserverEvent::Activity(
        Activity::new(admin.user_id, ActivityType::Security, action).on("user", target.to_hex()),
    ));
}

/// GET /admin/users?page&limit
pub async fn list_users(State(state): State<AppState>, Query(query): Query<PageQuery>) -> ApiResult<Value> {
    let page = state.page(query);
    let (users, total) = state.accounts().list_users(page).await?;

    Ok(ApiResponse::success(json!({
        "users": users.iter().map(PlatformUser::to_view).collect::<Vec<_>>(),
        "pagination": page.pagination(total),
    })))
}

/// GET /admin/users/:id
pub async fn show_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PlatformUserView> {
    let user = state.accounts().find(parse_user_id(&id)?).await?;
    Ok(ApiResponse::success(user.to_view()))
}

/// PUT /admin/users/:id/toggle-status
pub async fn toggle_status(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_user_id(&id)?;
    let Json(request) = payload?;
    state.accounts().set_active(id, request.is_active).await?;

    let message = if request.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    tracing::info!("Admin {} set account {} active={}", admin.user_id, id, request.is_active);
    audit(&state, &admin, message, id);
    Ok(ApiResponse::success(json!({ "message": message })))
}

/// POST /admin/users/:id/revoke-api-key
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_user_id(&id)?;
    state.accounts().revoke_api_key(id).await?;

    tracing::info!("Admin {} revoked the API key of account {}", admin.user_id, id);
    audit(&state, &admin, "Revoked user API key", id);
    Ok(ApiResponse::success(json!({ "message": "API key revoked successfully" })))
}

/// POST /admin/users/:id/reset-quota
pub async fn reset_quota(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_user_id(&id)?;
    state.accounts().reset_quota(id).await?;

    audit(&state, &admin, "Reset user quota", id);
    Ok(ApiResponse::success(json!({ "message": "User quota reset successfully" })))
}
