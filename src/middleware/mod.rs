pub mod admin;
pub mod auth;
pub mod endpoint_protection;
pub mod response;
pub mod validate_api_key;

pub use admin::require_admin_middleware;
pub use auth::{jwt_auth_middleware, jwt_or_query_auth_middleware, AuthUser};
pub use endpoint_protection::{endpoint_protection_middleware, ResolvedSchema};
pub use response::{ApiResponse, ApiResult};
pub use validate_api_key::{tenant_store_middleware, validate_api_key_middleware, ApiUser, TenantStore};
