use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use bson::{doc, oid::ObjectId};
use serde_json::{json, Value};

use crate::database::models::{Activity, ActivityType, Schema, SchemaView};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::observer::ObserverEvent;
use crate::services::schema_service::{CreateOutcome, SchemaRequest};
use crate::state::AppState;
use super::user_agent;

fn parse_schema_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid schema ID"))
}

fn schema_activity(
    schema: &Schema,
    kind: ActivityType,
    action: &str,
    description: String,
    headers: &HeaderMap,
) -> ObserverEvent {
    ObserverEvent::Activity(
        Activity::new(schema.owner_id, kind, action)
            .describe(description)
            .on("schema", schema.id.to_hex())
            .with_metadata(doc! {
                "collection_name": &schema.collection_name,
                "fields_count": schema.fields.len() as i64,
            })
            .with_user_agent(user_agent(headers)),
    )
}

/// POST /schemas - create, or reactivate a soft-deleted schema of the same name
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    payload: Result<Json<SchemaRequest>, JsonRejection>,
) -> ApiResult<SchemaView> {
    let Json(request) = payload?;
    let owner = state.accounts().find(auth.user_id).await?;
    let (schema, outcome) = state.schemas().create(&owner, &request).await?;

    let event = match outcome {
        CreateOutcome::Created => schema_activity(
            &schema,
            ActivityType::Create,
            "schema_created",
            format!("Created table \"{}\"", schema.collection_name),
            &headers,
        ),
        CreateOutcome::Reactivated => schema_activity(
            &schema,
            ActivityType::Update,
            "schema_reactivated",
            format!("Reactivated table \"{}\"", schema.collection_name),
            &headers,
        ),
    };
    state.observers.emit(event);

    Ok(ApiResponse::created(schema.to_view()))
}

/// GET /schemas - active schemas, newest first
pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<SchemaView>> {
    let schemas = state.schemas().list(auth.user_id).await?;
    Ok(ApiResponse::success(schemas.iter().map(Schema::to_view).collect()))
}

/// GET /schemas/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<SchemaView> {
    let schema = state.schemas().get(auth.user_id, parse_schema_id(&id)?).await?;
    Ok(ApiResponse::success(schema.to_view()))
}

/// PUT /schemas/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<SchemaRequest>, JsonRejection>,
) -> ApiResult<SchemaView> {
    let id = parse_schema_id(&id)?;
    let Json(request) = payload?;
    let schema = state.schemas().update(auth.user_id, id, &request).await?;

    state.observers.emit(schema_activity(
        &schema,
        ActivityType::Update,
        "schema_updated",
        format!("Updated table \"{}\"", schema.collection_name),
        &headers,
    ));

    Ok(ApiResponse::success(schema.to_view()))
}

/// DELETE /schemas/:id - soft delete; documents in the tenant database are kept
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let schema = state.schemas().delete(auth.user_id, parse_schema_id(&id)?).await?;

    state.observers.emit(schema_activity(
        &schema,
        ActivityType::Delete,
        "schema_deleted",
        format!("Deleted table \"{}\"", schema.collection_name),
        &headers,
    ));

    Ok(ApiResponse::success(json!({ "message": "Schema deleted successfully" })))
}

/// POST /schemas/:id/rotate-secret - invalidates every token issued for the collection
pub async fn rotate_secret(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let schema = state.schemas().rotate_secret(auth.user_id, parse_schema_id(&id)?).await?;

    state.observers.emit(schema_activity(
        &schema,
        ActivityType::Security,
        "schema_secret_rotated",
        format!("Rotated the token secret of \"{}\"", schema.collection_name),
        &headers,
    ));

    Ok(ApiResponse::success(json!({
        "message": "JWT secret rotated successfully",
        "schema": schema.to_view(),
    })))
}
