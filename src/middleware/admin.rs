use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::services::accounts::PlatformAuthError;
use crate::state::AppState;

use super::auth::AuthUser;

/// Admin gate for `/admin/*`. Runs after `jwt_auth_middleware`.
///
/// The token's `is_admin` claim is only a hint: the account is re-read so a
/// demoted or deactivated admin loses access before the token expires.
pub async fn require_admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before admin validation"))?;

    if !auth_user.is_admin {
        return Err(ApiError::forbidden("Admin access required"));
    }

    let current = state.accounts().find(auth_user.user_id).await;
    match current {
        Ok(user) if user.is_admin && user.is_active => Ok(next.run(request).await),
        Ok(_) | Err(PlatformAuthError::NotFound) => {
            tracing::warn!("Admin access refused for account {}", auth_user.user_id);
            Err(ApiError::forbidden("Admin access required"))
        }
        Err(e) => Err(e.into()),
    }
}
