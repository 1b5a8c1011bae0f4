// Protected handlers: everything behind a platform JWT (see middleware::auth)

pub mod account;
pub mod admin;
pub mod api_docs;
pub mod feed;
pub mod schemas;

use axum::http::HeaderMap;

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
