// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::JwtError;
use crate::database::manager::DatabaseError;
use crate::services::accounts::PlatformAuthError;
use crate::services::dynamic_auth::DynamicAuthError;
use crate::services::protection::ProtectionError;
use crate::services::schema_service::SchemaError;
use crate::services::shaper::ShapeError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field: Option<String>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    QuotaExceeded {
        message: String,
        quota_info: Value,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::QuotaExceeded { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::QuotaExceeded { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.message(),
            "code": self.error_code(),
        });
        match self {
            ApiError::ValidationError { field: Some(field), .. } => {
                body["field"] = json!(field);
            }
            ApiError::QuotaExceeded { quota_info, .. } => {
                body["quota_info"] = quota_info.clone();
            }
            _ => {}
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field: Option<String>) -> Self {
        ApiError::ValidationError { message: message.into(), field }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn quota_exceeded(quota_info: Value) -> Self {
        ApiError::QuotaExceeded { message: "API quota exceeded".to_string(), quota_info }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert component error types to ApiError

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotConfigured => ApiError::bad_request("Please configure your MongoDB connection first"),
            DatabaseError::InvalidConnectionUri(_)
            | DatabaseError::InvalidDatabaseName(_)
            | DatabaseError::Unreachable(_) => {
                tracing::warn!("Tenant database unavailable: {}", err);
                ApiError::bad_request("Unable to connect to your MongoDB database")
            }
            DatabaseError::Timeout(operation) => {
                tracing::error!("Database operation timed out: {}", operation);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            other => {
                // Don't expose driver errors to clients
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<ShapeError> for ApiError {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::Database(db) => db.into(),
            other => {
                let field = other.field().map(str::to_string);
                ApiError::validation_error(other.to_string(), field)
            }
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation { field, message } => ApiError::validation_error(message, field),
            SchemaError::NotFound | SchemaError::TargetNotFound { .. } => ApiError::not_found(err.to_string()),
            SchemaError::Conflict(_) => ApiError::conflict(err.to_string()),
            SchemaError::TenantNotConfigured | SchemaError::AuthNotEnabled => ApiError::bad_request(err.to_string()),
            SchemaError::Database(db) => db.into(),
        }
    }
}

impl From<DynamicAuthError> for ApiError {
    fn from(err: DynamicAuthError) -> Self {
        match err {
            DynamicAuthError::NotEnabled => ApiError::not_found(err.to_string()),
            DynamicAuthError::SignupDisabled => ApiError::forbidden(err.to_string()),
            DynamicAuthError::MissingFields(_) | DynamicAuthError::InvalidEmail | DynamicAuthError::InvalidPassword => {
                ApiError::bad_request(err.to_string())
            }
            DynamicAuthError::AlreadyExists => ApiError::conflict(err.to_string()),
            DynamicAuthError::InvalidCredentials
            | DynamicAuthError::InvalidToken
            | DynamicAuthError::TokenExpired
            | DynamicAuthError::WrongScope => ApiError::unauthorized(err.to_string()),
            DynamicAuthError::SecretMissing => {
                tracing::error!("Auth-enabled schema has no signing secret");
                ApiError::internal_server_error(err.to_string())
            }
            DynamicAuthError::Shape(shape) => shape.into(),
            DynamicAuthError::Hash(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("Failed to create user")
            }
            DynamicAuthError::Encode(e) => {
                tracing::error!("Token encoding failed: {}", e);
                ApiError::internal_server_error("Failed to generate token")
            }
            DynamicAuthError::Database(db) => db.into(),
        }
    }
}

impl From<ProtectionError> for ApiError {
    fn from(err: ProtectionError) -> Self {
        match err {
            ProtectionError::MissingToken
            | ProtectionError::NotBearer
            | ProtectionError::NoAuthSource
            | ProtectionError::InvalidToken => {
                ApiError::unauthorized(err.to_string())
            }
            ProtectionError::SecretMissing => ApiError::internal_server_error(err.to_string()),
            ProtectionError::Database(db) => db.into(),
        }
    }
}

impl From<PlatformAuthError> for ApiError {
    fn from(err: PlatformAuthError) -> Self {
        match err {
            PlatformAuthError::MissingFields | PlatformAuthError::WeakPassword => ApiError::bad_request(err.to_string()),
            PlatformAuthError::AlreadyExists => ApiError::conflict(err.to_string()),
            PlatformAuthError::InvalidCredentials | PlatformAuthError::Deactivated => {
                ApiError::unauthorized(err.to_string())
            }
            PlatformAuthError::NotFound | PlatformAuthError::NotificationNotFound => ApiError::not_found(err.to_string()),
            PlatformAuthError::Jwt(e) => e.into(),
            PlatformAuthError::Hash(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("Failed to process password")
            }
            PlatformAuthError::Database(db) => db.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::bad_request("Invalid request body")
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::Invalid => ApiError::unauthorized("Invalid token"),
            JwtError::InvalidSecret | JwtError::TokenGeneration(_) => {
                tracing::error!("Platform token error: {}", err);
                ApiError::internal_server_error("Failed to generate token")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
