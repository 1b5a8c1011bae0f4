// Per-collection authentication for end users of a generated API.
//
// Tokens are HS256, signed with the schema's own secret, and scoped to the
// (owner, collection) pair they were minted for.

use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::api::format::is_password_like;
use crate::auth::{hash_password, verify_against_decoy, verify_password};
use crate::database::convert::{bson_to_json, document_to_json};
use crate::database::models::{AuthConfig, Schema};
use crate::database::{DatabaseError, DocumentStore, DynamicRepository};
use crate::services::relations::RelationResolver;
use crate::services::schema_service::SchemaService;
use crate::services::shaper::{shape, ShapeError, ShapeMode};

#[derive(Debug, Error)]
pub enum DynamicAuthError {
    #[error("Authentication not enabled for this collection")]
    NotEnabled,

    #[error("Signup is disabled for this collection")]
    SignupDisabled,

    #[error("Required fields missing: {0}")]
    MissingFields(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid password format")]
    InvalidPassword,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("JWT secret not configured")]
    SecretMissing,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not valid for this collection")]
    WrongScope,

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicClaims {
    /// Platform owner (hex)
    pub user_id: String,
    /// Record id in the auth collection (hex)
    pub schema_user_id: String,
    pub collection: String,
    pub schema_id: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl DynamicClaims {
    pub fn new(schema: &Schema, auth: &AuthConfig, record_id: ObjectId) -> Self {
        let now = Utc::now();
        Self {
            user_id: schema.owner_id.to_hex(),
            schema_user_id: record_id.to_hex(),
            collection: schema.collection_name.clone(),
            schema_id: schema.id.to_hex(),
            exp: (now + Duration::hours(auth.token_expiration_hours)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn expires_at(&self) -> Option<chrono::DateTime<Utc>> {
        chrono::DateTime::from_timestamp(self.exp, 0)
    }
}

pub fn issue_token(secret: &str, claims: &DynamicClaims) -> Result<String, DynamicAuthError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(DynamicAuthError::Encode)
}

pub fn decode_token(secret: &str, token: &str) -> Result<DynamicClaims, DynamicAuthError> {
    decode::<DynamicClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => DynamicAuthError::TokenExpired,
            _ => DynamicAuthError::InvalidToken,
        })
}

/// Reject tokens minted for another owner, or for another collection when one is given
pub fn check_scope(claims: &DynamicClaims, owner_id: ObjectId, collection: Option<&str>) -> Result<(), DynamicAuthError> {
    if claims.user_id != owner_id.to_hex() {
        return Err(DynamicAuthError::WrongScope);
    }
    match collection {
        Some(expected) if claims.collection != expected => Err(DynamicAuthError::WrongScope),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: Map<String, Value>,
    pub expires_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DynamicAuthService {
    schemas: SchemaService,
    records: DynamicRepository,
    resolver: RelationResolver,
    owner_id: ObjectId,
    bcrypt_cost: u32,
}

impl DynamicAuthService {
    pub fn new(
        platform: Arc<dyn DocumentStore>,
        tenant: Arc<dyn DocumentStore>,
        owner_id: ObjectId,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            schemas: SchemaService::new(platform.clone()),
            records: DynamicRepository::new(tenant, owner_id),
            resolver: RelationResolver::new(platform, owner_id),
            owner_id,
            bcrypt_cost,
        }
    }

    pub async fn signup(&self, schema: &Schema, payload: &Map<String, Value>) -> Result<AuthSession, DynamicAuthError> {
        let auth = schema.auth().ok_or(DynamicAuthError::NotEnabled)?;
        if !auth.allow_signup {
            return Err(DynamicAuthError::SignupDisabled);
        }

        let email_key = auth.login_fields.email_field.as_str();
        let password_key = auth.password_field.as_str();
        let missing: Vec<&str> = [email_key, password_key]
            .into_iter()
            .filter(|key| payload.get(*key).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(DynamicAuthError::MissingFields(missing.join(", ")));
        }

        let email = payload
            .get(email_key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DynamicAuthError::InvalidEmail)?;
        let password = payload
            .get(password_key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(DynamicAuthError::InvalidPassword)?;

        if self.records.find_flat(&auth.user_collection, doc! { email_key: email }).await?.is_some() {
            return Err(DynamicAuthError::AlreadyExists);
        }
        if let Some(username_key) = auth.username_login_field() {
            if let Some(username) = payload.get(username_key).and_then(Value::as_str) {
                let taken = self
                    .records
                    .find_flat(&auth.user_collection, doc! { username_key: username })
                    .await?;
                if taken.is_some() {
                    return Err(DynamicAuthError::AlreadyExists);
                }
            }
        }

        let mut shaped = shape(schema, payload, ShapeMode::Create)?;
        self.resolver
            .verify_references(self.records.store(), schema, &shaped.references)
            .await?;

        let secret = self.schemas.ensure_secret(schema).await?.ok_or(DynamicAuthError::SecretMissing)?;

        shaped.data.insert(email_key, email);
        shaped.data.insert(password_key, hash_password(password, self.bcrypt_cost)?);
        let record = self.records.insert_flat(&auth.user_collection, shaped.data).await?;
        let record_id = record.get_object_id("_id").map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        tracing::info!("Signed up {} user {} for owner {}", schema.collection_name, record_id, self.owner_id);
        let claims = DynamicClaims::new(schema, auth, record_id);
        let token = issue_token(&secret, &claims)?;
        Ok(AuthSession { token, user: public_user(&record, schema, auth), expires_at: claims.expires_at() })
    }

    /// Unknown identifier and wrong password fail the same way
    pub async fn login(&self, schema: &Schema, identifier: &str, password: &str) -> Result<AuthSession, DynamicAuthError> {
        let auth = schema.auth().ok_or(DynamicAuthError::NotEnabled)?;
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(DynamicAuthError::MissingFields("identifier, password".to_string()));
        }

        let email_key = auth.login_fields.email_field.as_str();
        let filter = match auth.username_login_field() {
            Some(username_key) => doc! { "$or": [ { email_key: identifier }, { username_key: identifier } ] },
            None => doc! { email_key: identifier },
        };

        let Some(record) = self.records.find_flat(&auth.user_collection, filter).await? else {
            verify_against_decoy(password, self.bcrypt_cost);
            return Err(DynamicAuthError::InvalidCredentials);
        };
        let hash = record.get_str(&auth.password_field).unwrap_or_default();
        if !verify_password(password, hash) {
            return Err(DynamicAuthError::InvalidCredentials);
        }

        let secret = auth.secret().ok_or(DynamicAuthError::SecretMissing)?;
        let record_id = record.get_object_id("_id").map_err(|_| DynamicAuthError::InvalidCredentials)?;
        let claims = DynamicClaims::new(schema, auth, record_id);
        let token = issue_token(secret, &claims)?;
        Ok(AuthSession { token, user: public_user(&record, schema, auth), expires_at: claims.expires_at() })
    }

    pub fn validate(&self, schema: &Schema, token: &str) -> Result<DynamicClaims, DynamicAuthError> {
        let auth = schema.auth().ok_or(DynamicAuthError::NotEnabled)?;
        let secret = auth.secret().ok_or(DynamicAuthError::SecretMissing)?;
        let claims = decode_token(secret, token)?;
        check_scope(&claims, self.owner_id, Some(&schema.collection_name))?;
        Ok(claims)
    }
}

/// What a signup/login response exposes of a user record.
/// With `response_fields` set, only those (plus `id`); otherwise everything
/// except credentials and private fields.
pub fn public_user(record: &Document, schema: &Schema, auth: &AuthConfig) -> Map<String, Value> {
    let mut user = Map::new();
    if let Some(Bson::ObjectId(id)) = record.get("_id") {
        user.insert("id".to_string(), Value::String(id.to_hex()));
    }

    if !auth.response_fields.is_empty() {
        for name in auth.response_fields.iter().filter(|n| **n != auth.password_field) {
            if let Some(value) = record.get(name) {
                user.insert(name.clone(), bson_to_json(value));
            }
        }
        return user;
    }

    let private: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| !f.is_public())
        .map(|f| f.name.as_str())
        .collect();
    for (key, value) in document_to_json(record) {
        if key == "_id" || key == auth.password_field || is_password_like(&key) || private.contains(&key.as_str()) {
            continue;
        }
        user.insert(key, value);
    }
    user
}
