pub mod accounts;
pub mod documents;
pub mod dynamic_auth;
pub mod protection;
pub mod relations;
pub mod schema_service;
pub mod shaper;

pub use accounts::AccountService;
pub use documents::DocumentService;
pub use dynamic_auth::DynamicAuthService;
pub use protection::EndpointGate;
pub use relations::RelationResolver;
pub use schema_service::SchemaService;
