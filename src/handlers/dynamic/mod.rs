// Dynamic handlers: generated CRUD and per-collection auth, keyed by the
// owner's API key (see middleware::validate_api_key)

pub mod auth;
pub mod data;

use serde_json::{Map, Value};

use crate::error::ApiError;

/// Accepts `{"data": {...}}` or a bare object. The wrapper is only
/// recognised when `data` is the sole key.
pub(crate) fn document_body(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(mut object) => {
            if object.len() == 1 && object.get("data").is_some_and(Value::is_object) {
                if let Some(Value::Object(inner)) = object.remove("data") {
                    return Ok(inner);
                }
            }
            Ok(object)
        }
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}
