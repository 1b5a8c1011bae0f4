use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use crate::database::models::Schema;
use crate::error::ApiError;
use crate::services::protection::{EndpointGate, GateDecision};
use crate::state::AppState;
use crate::types::CrudVerb;

use super::validate_api_key::ApiUser;

/// Active schema addressed by the `:collection` path segment
#[derive(Clone, Debug)]
pub struct ResolvedSchema(pub Schema);

/// Loads the collection's schema and applies its per-verb protection.
/// Must be installed with `route_layer` so the path is already matched.
pub async fn endpoint_protection_middleware(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ApiUser(owner) = request
        .extensions()
        .get::<ApiUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("API key required"))?;

    let collection = params
        .get("collection")
        .ok_or_else(|| ApiError::not_found("Schema not found"))?;
    let schema = state
        .schemas()
        .find_active_by_name(owner.id, collection)
        .await?
        .ok_or_else(|| ApiError::not_found("Schema not found"))?;

    // Methods outside plain CRUD are never protected
    if let Some(verb) = CrudVerb::from_method(request.method()) {
        let authorization = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let gate = EndpointGate::new(state.platform.clone(), owner.id);
        if let GateDecision::Authenticated(principal) = gate.authorize(&schema, verb, authorization.as_deref()).await? {
            tracing::debug!(
                "Collection {} {} authorized for schema user {}",
                schema.collection_name,
                verb.as_str(),
                principal.schema_user_id
            );
            request.extensions_mut().insert(principal);
        }
    }

    request.extensions_mut().insert(ResolvedSchema(schema));
    Ok(next.run(request).await)
}
