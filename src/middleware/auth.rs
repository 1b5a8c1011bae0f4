use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use bson::oid::ObjectId;
use serde::Deserialize;

use crate::auth::{verify_jwt, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Platform account resolved from a platform JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub email: String,
    pub is_admin: bool,
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid token"))?;
        Ok(Self {
            user_id,
            email: claims.email,
            is_admin: claims.is_admin,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// JWT authentication middleware for the platform routes
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let auth_user = authenticate(&state, &token)?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Same as `jwt_auth_middleware`, but also takes `?token=` so the API docs
/// can be opened straight from a browser
pub async fn jwt_or_query_auth_middleware(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match (headers.contains_key("authorization"), query.token) {
        (false, Some(token)) if !token.trim().is_empty() => token,
        _ => extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?,
    };
    let auth_user = authenticate(&state, &token)?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = verify_jwt(token, &state.config.security).map_err(|e| {
        tracing::debug!("Rejected platform token: {}", e);
        ApiError::unauthorized("Invalid token")
    })?;
    AuthUser::try_from(claims)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers.get("authorization").ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header must use Bearer token format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err("Authorization header must use Bearer token format"),
    }
}
