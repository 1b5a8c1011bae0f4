use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::sync::Arc;

use crate::database::convert::format_datetime;
use crate::database::models::PlatformUser;
use crate::database::DocumentStore;
use crate::error::ApiError;
use crate::observer::ObserverEvent;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Platform account that owns the API key of the current request
#[derive(Clone, Debug)]
pub struct ApiUser(pub PlatformUser);

/// Handle to the API user's own database
#[derive(Clone)]
pub struct TenantStore(pub Arc<dyn DocumentStore>);

/// Resolves `X-API-Key`, enforces the monthly quota and counts the call
pub async fn validate_api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::unauthorized("API key required"))?
        .to_string();

    let user = state
        .accounts()
        .find_by_api_key(&api_key)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;

    let usage = &user.api_usage;
    if usage.is_exhausted() {
        tracing::info!("Account {} is over its monthly quota", user.id);
        return Err(ApiError::quota_exceeded(json!({
            "used": usage.used_this_month,
            "limit": usage.monthly_quota,
            "reset_at": usage.quota_reset_at.map(format_datetime),
        })));
    }

    state.observers.emit(ObserverEvent::ApiCall {
        user_id: user.id,
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
    });

    request.extensions_mut().insert(ApiUser(user));
    Ok(next.run(request).await)
}

/// Opens the API user's tenant database. Runs after `validate_api_key_middleware`.
pub async fn tenant_store_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ApiUser(user) = request
        .extensions()
        .get::<ApiUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("API key required"))?;

    let store = state.tenant_store(&user).await?;
    request.extensions_mut().insert(TenantStore(store));
    Ok(next.run(request).await)
}
