use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use bson::oid::ObjectId;
use serde_json::{json, Map, Value};

use crate::database::convert::format_datetime;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ApiUser, ResolvedSchema, TenantStore};
use crate::services::documents::DocumentService;
use crate::state::AppState;
use crate::types::PageQuery;

use super::document_body;

fn documents(state: &AppState, owner: &ApiUser, tenant: &TenantStore) -> DocumentService {
    DocumentService::new(state.platform.clone(), tenant.0.clone(), owner.0.id)
}

fn parse_document_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid document ID"))
}

/// POST /api/:collection
pub async fn create(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Extension(ResolvedSchema(schema)): Extension<ResolvedSchema>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let input = document_body(body)?;
    let created = documents(&state, &owner, &tenant).create(&schema, &input).await?;

    Ok(ApiResponse::created(json!({
        "message": "Document created successfully",
        "id": created.id.to_hex(),
        "created_at": format_datetime(created.created_at),
        "data": created.view,
    })))
}

/// GET /api/:collection?page&limit
pub async fn list(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Extension(ResolvedSchema(schema)): Extension<ResolvedSchema>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Value> {
    let page = state.page(query);
    let result = documents(&state, &owner, &tenant).list(&schema, page).await?;

    Ok(ApiResponse::success(json!({
        "data": result.items,
        "pagination": page.pagination(result.total),
    })))
}

/// GET /api/:collection/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Extension(ResolvedSchema(schema)): Extension<ResolvedSchema>,
    Path((_collection, id)): Path<(String, String)>,
) -> ApiResult<Map<String, Value>> {
    let id = parse_document_id(&id)?;
    let document = documents(&state, &owner, &tenant)
        .get(&schema, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(ApiResponse::success(document))
}

/// PUT /api/:collection/:id - merges the fields present in the body
pub async fn update(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Extension(ResolvedSchema(schema)): Extension<ResolvedSchema>,
    Path((_collection, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_document_id(&id)?;
    let Json(body) = payload?;
    let input = document_body(body)?;

    let updated_at = documents(&state, &owner, &tenant)
        .update(&schema, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    Ok(ApiResponse::success(json!({
        "message": "Document updated successfully",
        "updated_at": format_datetime(updated_at),
    })))
}

/// DELETE /api/:collection/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(owner): Extension<ApiUser>,
    Extension(tenant): Extension<TenantStore>,
    Extension(ResolvedSchema(schema)): Extension<ResolvedSchema>,
    Path((_collection, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = parse_document_id(&id)?;
    if !documents(&state, &owner, &tenant).delete(&schema, id).await? {
        return Err(ApiError::not_found("Document not found"));
    }
    Ok(ApiResponse::success(json!({ "message": "Document deleted successfully" })))
}
