// Endpoint protection gate
//
// Per-verb decision for dynamic CRUD. A protected schema without its own
// auth config borrows the secret of the owner's oldest auth-enabled schema.

use bson::oid::ObjectId;
use std::sync::Arc;
use thiserror::Error;

use crate::database::models::Schema;
use crate::database::{DatabaseError, DocumentStore};
use crate::auth::bearer_token;
use crate::services::dynamic_auth::{check_scope, decode_token};
use crate::services::schema_service::SchemaService;
use crate::types::CrudVerb;

#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("Authorization header required")]
    MissingToken,

    #[error("Bearer token required")]
    NotBearer,

    #[error("Authentication required but no auth system configured")]
    NoAuthSource,

    #[error("JWT secret not configured")]
    SecretMissing,

    #[error("Invalid token")]
    InvalidToken,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// End user authenticated by a collection token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicPrincipal {
    pub schema_user_id: String,
    pub schema_id: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    Authenticated(DynamicPrincipal),
}

#[derive(Clone)]
pub struct EndpointGate {
    schemas: SchemaService,
    owner_id: ObjectId,
}

impl EndpointGate {
    pub fn new(platform: Arc<dyn DocumentStore>, owner_id: ObjectId) -> Self {
        Self { schemas: SchemaService::new(platform), owner_id }
    }

    /// Secret that verifies tokens for `schema`
    async fn signing_secret(&self, schema: &Schema) -> Result<String, ProtectionError> {
        if let Some(auth) = schema.auth() {
            return auth.secret().map(str::to_string).ok_or(ProtectionError::SecretMissing);
        }

        let source = self
            .schemas
            .find_auth_source(self.owner_id)
            .await?
            .ok_or(ProtectionError::NoAuthSource)?;
        source
            .auth()
            .and_then(|a| a.secret())
            .map(str::to_string)
            .ok_or(ProtectionError::SecretMissing)
    }

    /// `authorization` is the raw `Authorization` header, if any
    pub async fn authorize(
        &self,
        schema: &Schema,
        verb: CrudVerb,
        authorization: Option<&str>,
    ) -> Result<GateDecision, ProtectionError> {
        if !schema.requires_auth(verb) {
            return Ok(GateDecision::Open);
        }

        let header = authorization.ok_or(ProtectionError::MissingToken)?;
        let token = bearer_token(header).ok_or(ProtectionError::NotBearer)?;
        let secret = self.signing_secret(schema).await?;
        let claims = decode_token(&secret, token).map_err(|_| ProtectionError::InvalidToken)?;
        check_scope(&claims, self.owner_id, None).map_err(|_| ProtectionError::InvalidToken)?;

        Ok(GateDecision::Authenticated(DynamicPrincipal {
            schema_user_id: claims.schema_user_id,
            schema_id: claims.schema_id,
            collection: claims.collection,
        }))
    }
}
