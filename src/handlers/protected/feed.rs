use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::database::convert::json_object_to_document;
use crate::database::models::{Activity, ActivityType, ActivityView, Notification};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;
use crate::types::PageQuery;

use super::user_agent;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

fn parse_notification_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid notification ID"))
}

/// GET /activities?page&limit
pub async fn activities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Value> {
    let page = state.page(query);
    let (items, total) = state.accounts().activities(auth.user_id, page).await?;

    Ok(ApiResponse::success(json!({
        "activities": items.iter().map(Activity::to_view).collect::<Vec<_>>(),
        "pagination": page.pagination(total),
    })))
}

/// POST /activities - client-reported audit entry
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    payload: Result<Json<ActivityRequest>, JsonRejection>,
) -> ApiResult<ActivityView> {
    let Json(request) = payload?;
    if request.action.trim().is_empty() {
        return Err(ApiError::validation_error("Action is required", Some("action".into())));
    }

    let mut activity = Activity::new(auth.user_id, request.activity_type, request.action.trim())
        .with_user_agent(user_agent(&headers));
    activity.description = request.description;
    activity.resource = request.resource;
    activity.resource_id = request.resource_id;
    activity.metadata = request.metadata.as_ref().map(json_object_to_document);

    state.accounts().record_activity(&activity).await?;
    Ok(ApiResponse::created(activity.to_view()))
}

/// GET /notifications?page&limit
pub async fn notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Value> {
    let page = state.page(query);
    let accounts = state.accounts();
    let (items, total) = accounts.notifications(auth.user_id, page).await?;
    let unread = accounts.unread_count(auth.user_id).await?;

    Ok(ApiResponse::success(json!({
        "notifications": items.iter().map(Notification::to_view).collect::<Vec<_>>(),
        "pagination": page.pagination(total),
        "unread_count": unread,
    })))
}

/// GET /notifications/unread-count
pub async fn unread_count(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let unread = state.accounts().unread_count(auth.user_id).await?;
    Ok(ApiResponse::success(json!({ "unread_count": unread })))
}

/// PUT /notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_notification_id(&id)?;
    state.accounts().mark_notification_read(auth.user_id, id).await?;
    Ok(ApiResponse::success(json!({ "message": "Notification marked as read" })))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let changed = state.accounts().mark_all_notifications_read(auth.user_id).await?;
    tracing::debug!("Account {} marked {} notifications read", auth.user_id, changed);
    Ok(ApiResponse::success(json!({ "message": "All notifications marked as read" })))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_notification_id(&id)?;
    state.accounts().delete_notification(auth.user_id, id).await?;
    Ok(ApiResponse::success(json!({ "message": "Notification deleted successfully" })))
}
