use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{dynamic, protected, public};
use crate::middleware::{
    endpoint_protection_middleware, jwt_auth_middleware, jwt_or_query_auth_middleware, require_admin_middleware,
    tenant_store_middleware, validate_api_key_middleware,
};
use crate::state::AppState;

/// The complete HTTP surface
pub fn app(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.api.max_request_size_bytes);
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(public::root::root))
        .route("/health", get(public::root::health))
        .merge(auth_public_routes())
        // Platform token
        .merge(account_routes(&state))
        .merge(schema_routes(&state))
        .merge(docs_routes(&state))
        .merge(admin_routes(&state))
        // API key
        .merge(dynamic_routes(&state))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
}

fn account_routes(state: &AppState) -> Router<AppState> {
    use protected::{account, feed};

    Router::new()
        .route("/auth/me", get(account::me))
        .route("/auth/mongodb-uri", put(account::update_mongodb_uri))
        .route("/auth/test-mongodb", post(account::test_mongodb))
        .route("/user/dashboard", get(account::dashboard))
        .route("/user/regenerate-api-key", post(account::regenerate_api_key))
        .route("/user/api-usage", get(account::api_usage))
        .route("/activities", get(feed::activities).post(feed::create_activity))
        .route("/notifications", get(feed::notifications))
        .route("/notifications/unread-count", get(feed::unread_count))
        .route("/notifications/read-all", put(feed::mark_all_read))
        .route("/notifications/:id", delete(feed::delete_notification))
        .route("/notifications/:id/read", put(feed::mark_read))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    use protected::admin;

    // Layers run bottom-up: JWT first, then the admin check
    Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", get(admin::show_user))
        .route("/admin/users/:id/toggle-status", put(admin::toggle_status))
        .route("/admin/users/:id/revoke-api-key", post(admin::revoke_api_key))
        .route("/admin/users/:id/reset-quota", post(admin::reset_quota))
        .route_layer(from_fn_with_state(state.clone(), require_admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn schema_routes(state: &AppState) -> Router<AppState> {
    use protected::schemas;

    Router::new()
        .route("/schemas", get(schemas::list).post(schemas::create))
        .route(
            "/schemas/:id",
            get(schemas::show).put(schemas::update).delete(schemas::delete),
        )
        .route("/schemas/:id/rotate-secret", post(schemas::rotate_secret))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn docs_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/user/api-docs", get(protected::api_docs::api_docs))
        .route_layer(from_fn_with_state(state.clone(), jwt_or_query_auth_middleware))
}

fn dynamic_routes(state: &AppState) -> Router<AppState> {
    use dynamic::{auth, data};

    // Per-verb protection only guards the generated CRUD endpoints
    let crud = Router::new()
        .route("/api/:collection", get(data::list).post(data::create))
        .route(
            "/api/:collection/:id",
            get(data::show).put(data::update).delete(data::delete),
        )
        .route_layer(from_fn_with_state(state.clone(), endpoint_protection_middleware));

    let collection_auth = Router::new()
        .route("/api/:collection/auth/signup", post(auth::signup))
        .route("/api/:collection/auth/login", post(auth::login))
        .route("/api/:collection/auth/validate", get(auth::validate));

    // Layers run bottom-up: API key first, then the tenant database
    crud.merge(collection_auth)
        .route_layer(from_fn_with_state(state.clone(), tenant_store_middleware))
        .route_layer(from_fn_with_state(state.clone(), validate_api_key_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
