use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::{json, Value};

use crate::database::models::{Activity, ActivityType};
use crate::middleware::{ApiResponse, ApiResult};
use crate::observer::ObserverEvent;
use crate::services::accounts::{SigninRequest, SignupRequest};
use crate::state::AppState;

/// POST /auth/signup - create a platform account
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (user, token) = state.accounts().signup(&request).await?;

    state.observers.emit(ObserverEvent::Activity(
        Activity::new(user.id, ActivityType::Auth, "signup").describe("Account created"),
    ));

    Ok(ApiResponse::created(json!({
        "user": user.to_view(),
        "token": token,
    })))
}

/// POST /auth/signin - exchange email and password for a platform token
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (user, token) = state.accounts().signin(&request).await?;

    state.observers.emit(ObserverEvent::Activity(
        Activity::new(user.id, ActivityType::Login, "signin").describe("Signed in"),
    ));

    Ok(ApiResponse::success(json!({
        "user": user.to_view(),
        "token": token,
    })))
}
