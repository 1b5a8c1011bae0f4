use axum::{extract::State, http::HeaderMap, Extension};
use serde_json::Value;

use crate::api::docs::build_api_document;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /user/api-docs - Swagger 2.0 document for the caller's active schemas
pub async fn api_docs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let owner = state.accounts().find(auth.user_id).await?;
    let schemas = state.schemas().list(owner.id).await?;

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let scheme = request_scheme(&headers, state.config.security.require_https);

    Ok(ApiResponse::success(build_api_document(&owner, &schemas, &host, scheme)))
}

fn request_scheme(headers: &HeaderMap, require_https: bool) -> &'static str {
    let forwarded = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("").trim().to_ascii_lowercase());
    match forwarded.as_deref() {
        Some("https") => "https",
        Some("http") => "http",
        _ if require_https => "https",
        _ => "http",
    }
}
