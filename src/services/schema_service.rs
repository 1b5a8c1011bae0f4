// Schema registry
//
// Owns schema documents: validation of definitions, create-or-reactivate,
// update with rename collision checks, soft delete with protection cascade,
// and the per-schema signing secret.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::generate_secret;
use crate::database::models::{
    AuthConfig, EndpointProtection, FieldType, LoginFields, PlatformUser, Schema, SchemaField, Visibility,
};
use crate::database::{DatabaseError, DocumentStore, FindOptions, Repository};
use crate::services::shaper::coerce_value;

const MAX_COLLECTION_NAME_LEN: usize = 64;
const MAX_TOKEN_EXPIRATION_HOURS: i64 = 24 * 365;
const DEFAULT_TOKEN_EXPIRATION_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{message}")]
    Validation { field: Option<String>, message: String },

    #[error("Schema not found")]
    NotFound,

    #[error("Collection name already exists: {0}")]
    Conflict(String),

    #[error("Target schema '{target}' not found for relation field: {field}")]
    TargetNotFound { field: String, target: String },

    #[error("Please first add a MongoDB connection")]
    TenantNotConfigured,

    #[error("Authentication is not enabled for this schema")]
    AuthNotEnabled,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SchemaError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Validation { field: Some(field.into()), message: message.into() }
    }
}

fn default_true() -> bool {
    true
}

/// Body of `POST /schemas` and `PUT /schemas/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRequest {
    pub collection_name: String,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
    #[serde(default)]
    pub auth_config: Option<AuthConfigInput>,
    #[serde(default)]
    pub endpoint_protection: Option<EndpointProtection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginFieldsInput {
    #[serde(default)]
    pub email_field: String,
    #[serde(default)]
    pub username_field: Option<String>,
    #[serde(default)]
    pub allow_both: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfigInput {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub user_collection: Option<String>,
    #[serde(default)]
    pub login_fields: LoginFieldsInput,
    #[serde(default)]
    pub password_field: String,
    #[serde(default)]
    pub response_fields: Vec<String>,
    #[serde(default, alias = "token_expiration")]
    pub token_expiration_hours: Option<i64>,
    #[serde(default = "default_true")]
    pub allow_signup: bool,
}

/// A request that passed every local check
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDefinition {
    pub collection_name: String,
    pub fields: Vec<SchemaField>,
    pub auth_config: Option<AuthConfig>,
    pub endpoint_protection: Option<EndpointProtection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Reactivated,
}

pub fn validate_collection_name(name: &str, field: &str) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::invalid(field, format!("{} is required", field)));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(SchemaError::invalid(
            field,
            format!("{} must be at most {} characters", field, MAX_COLLECTION_NAME_LEN),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(SchemaError::invalid(
            field,
            format!("{} may only contain letters, digits, '_' and '-': {}", field, name),
        ));
    }
    if name.starts_with("system") {
        return Err(SchemaError::invalid(field, format!("{} is reserved: {}", field, name)));
    }
    Ok(())
}

/// Local validation of a schema request: names, types, defaults, auth wiring
pub fn validate_definition(request: &SchemaRequest) -> Result<SchemaDefinition, SchemaError> {
    let collection_name = request.collection_name.trim().to_string();
    validate_collection_name(&collection_name, "collection_name")?;

    if request.fields.is_empty() {
        return Err(SchemaError::invalid("fields", "At least one field is required"));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(request.fields.len());
    for input in &request.fields {
        fields.push(validate_field(input, &mut seen)?);
    }

    let auth_config = match &request.auth_config {
        Some(input) if input.enabled => Some(validate_auth_config(input, &collection_name, &fields)?),
        _ => None,
    };

    Ok(SchemaDefinition {
        collection_name,
        fields,
        auth_config,
        endpoint_protection: request.endpoint_protection,
    })
}

fn validate_field(input: &FieldInput, seen: &mut HashSet<String>) -> Result<SchemaField, SchemaError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(SchemaError::invalid("fields", "Field name is required"));
    }
    if name.contains('.') || name.starts_with('$') {
        return Err(SchemaError::invalid(name, format!("Invalid field name: {}", name)));
    }
    if name == "id" || name == "_id" {
        return Err(SchemaError::invalid(name, format!("Field name is reserved: {}", name)));
    }
    if !seen.insert(name.to_string()) {
        return Err(SchemaError::invalid(name, format!("Duplicate field name: {}", name)));
    }

    let field_type = FieldType::parse(&input.field_type).ok_or_else(|| {
        SchemaError::invalid(name, format!("Invalid field type for {}: {}", name, input.field_type))
    })?;

    let visibility = match input.visibility.as_deref() {
        None | Some("") => Visibility::Public,
        Some(raw) => Visibility::parse(raw)
            .ok_or_else(|| SchemaError::invalid(name, format!("Invalid visibility for {}: {}", name, raw)))?,
    };

    let target = if field_type == FieldType::Relation {
        let target = input.target.as_deref().map(str::trim).unwrap_or_default();
        if target.is_empty() {
            return Err(SchemaError::invalid(name, format!("Relation field {} requires a target", name)));
        }
        validate_collection_name(target, name)?;
        Some(target.to_string())
    } else {
        None
    };

    let mut field = SchemaField {
        name: name.to_string(),
        field_type,
        visibility,
        required: input.required,
        default: None,
        description: input.description.clone().filter(|d| !d.is_empty()),
        target,
    };

    if let Some(raw) = input.default.as_ref().filter(|v| !v.is_null()) {
        let coerced = coerce_value(&field, raw)
            .map_err(|_| SchemaError::invalid(name, format!("Invalid default value for field: {}", name)))?;
        field.default = Some(coerced);
    }

    Ok(field)
}

fn validate_auth_config(
    input: &AuthConfigInput,
    collection_name: &str,
    fields: &[SchemaField],
) -> Result<AuthConfig, SchemaError> {
    let string_field = |key: &str, role: &str, value: &str| -> Result<String, SchemaError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SchemaError::invalid(key, format!("{} is required when auth is enabled", key)));
        }
        match fields.iter().find(|f| f.name == value) {
            None => Err(SchemaError::invalid(key, format!("{} field '{}' is not declared in fields", role, value))),
            Some(f) if f.field_type != FieldType::String => Err(SchemaError::invalid(
                key,
                format!("{} field '{}' must be of type string", role, value),
            )),
            Some(_) => Ok(value.to_string()),
        }
    };

    let email_field = string_field("email_field", "Email", &input.login_fields.email_field)?;
    let password_field = string_field("password_field", "Password", &input.password_field)?;
    if email_field == password_field {
        return Err(SchemaError::invalid("password_field", "password_field must differ from email_field"));
    }

    let username_field = match input.login_fields.username_field.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(string_field("username_field", "Username", name)?),
        _ => None,
    };
    if input.login_fields.allow_both && username_field.is_none() {
        return Err(SchemaError::invalid("username_field", "allow_both requires a username_field"));
    }

    let user_collection = match input.user_collection.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => AuthConfig::default_user_collection(collection_name),
    };
    validate_collection_name(&user_collection, "user_collection")?;
    if user_collection == collection_name {
        return Err(SchemaError::invalid("user_collection", "user_collection must differ from collection_name"));
    }

    for name in &input.response_fields {
        if !fields.iter().any(|f| &f.name == name) {
            return Err(SchemaError::invalid("response_fields", format!("Unknown response field: {}", name)));
        }
    }

    let token_expiration_hours = input.token_expiration_hours.unwrap_or(DEFAULT_TOKEN_EXPIRATION_HOURS);
    if !(1..=MAX_TOKEN_EXPIRATION_HOURS).contains(&token_expiration_hours) {
        return Err(SchemaError::invalid(
            "token_expiration_hours",
            format!("token_expiration_hours must be between 1 and {}", MAX_TOKEN_EXPIRATION_HOURS),
        ));
    }

    Ok(AuthConfig {
        enabled: true,
        user_collection,
        login_fields: LoginFields {
            email_field,
            username_field,
            allow_both: input.login_fields.allow_both,
        },
        password_field,
        response_fields: input.response_fields.clone(),
        token_expiration_hours,
        allow_signup: input.allow_signup,
        jwt_secret: None,
    })
}

/// Persistence side of the registry, scoped to nothing: every call names its owner
#[derive(Clone)]
pub struct SchemaService {
    schemas: Repository<Schema>,
}

impl SchemaService {
    pub fn new(platform: Arc<dyn DocumentStore>) -> Self {
        Self { schemas: Repository::new(platform) }
    }

    pub async fn list(&self, owner_id: ObjectId) -> Result<Vec<Schema>, SchemaError> {
        Ok(self
            .schemas
            .select_any(
                doc! { "user_id": owner_id, "is_active": true },
                FindOptions::sorted(doc! { "created_at": -1, "_id": -1 }),
            )
            .await?)
    }

    pub async fn get(&self, owner_id: ObjectId, id: ObjectId) -> Result<Schema, SchemaError> {
        self.schemas
            .select_one(doc! { "_id": id, "user_id": owner_id, "is_active": true })
            .await?
            .ok_or(SchemaError::NotFound)
    }

    pub async fn find_active_by_name(&self, owner_id: ObjectId, collection: &str) -> Result<Option<Schema>, DatabaseError> {
        self.schemas
            .select_one(doc! { "user_id": owner_id, "collection_name": collection, "is_active": true })
            .await
    }

    /// Oldest active auth-enabled schema of the owner
    pub async fn find_auth_source(&self, owner_id: ObjectId) -> Result<Option<Schema>, DatabaseError> {
        let mut found = self
            .schemas
            .select_any(
                doc! { "user_id": owner_id, "is_active": true, "auth_config.enabled": true },
                FindOptions::sorted(doc! { "created_at": 1, "_id": 1 }).window(0, 1),
            )
            .await?;
        Ok(found.pop())
    }

    async fn ensure_targets_exist(&self, owner_id: ObjectId, definition: &SchemaDefinition) -> Result<(), SchemaError> {
        for field in definition.fields.iter().filter(|f| f.is_relation()) {
            let Some(target) = field.target.as_deref() else {
                continue;
            };
            if target == definition.collection_name {
                continue;
            }
            if self.find_active_by_name(owner_id, target).await?.is_none() {
                return Err(SchemaError::TargetNotFound { field: field.name.clone(), target: target.to_string() });
            }
        }
        Ok(())
    }

    fn with_fresh_secret(auth: Option<AuthConfig>) -> Option<AuthConfig> {
        auth.map(|mut auth| {
            auth.jwt_secret = Some(generate_secret());
            auth
        })
    }

    fn definition_update(definition: &SchemaDefinition, now: DateTime) -> Result<Document, SchemaError> {
        let to_bson = |value: Result<Bson, bson::ser::Error>| value.map_err(|e| SchemaError::from(DatabaseError::from(e)));
        Ok(doc! {
            "collection_name": definition.collection_name.clone(),
            "fields": to_bson(bson::to_bson(&definition.fields))?,
            "auth_config": to_bson(bson::to_bson(&definition.auth_config))?,
            "endpoint_protection": to_bson(bson::to_bson(&definition.endpoint_protection))?,
            "is_active": true,
            "updated_at": now,
        })
    }

    /// Create a schema, or reactivate a soft-deleted one with the same name
    pub async fn create(
        &self,
        owner: &PlatformUser,
        request: &SchemaRequest,
    ) -> Result<(Schema, CreateOutcome), SchemaError> {
        if owner.tenant_target().is_none() {
            return Err(SchemaError::TenantNotConfigured);
        }

        let mut definition = validate_definition(request)?;
        self.ensure_targets_exist(owner.id, &definition).await?;

        if self.find_active_by_name(owner.id, &definition.collection_name).await?.is_some() {
            return Err(SchemaError::Conflict(definition.collection_name));
        }

        // Secrets are issued eagerly, a reactivated schema gets a new one
        definition.auth_config = Self::with_fresh_secret(definition.auth_config.take());
        let now = DateTime::now();

        let inactive = self
            .schemas
            .select_one(doc! {
                "user_id": owner.id,
                "collection_name": &definition.collection_name,
                "is_active": false,
            })
            .await?;

        if let Some(previous) = inactive {
            self.schemas
                .update_one(doc! { "_id": previous.id }, doc! { "$set": Self::definition_update(&definition, now)? })
                .await?;
            info!("Reactivated schema {} for owner {}", definition.collection_name, owner.id);

            let schema = Schema {
                collection_name: definition.collection_name,
                fields: definition.fields,
                auth_config: definition.auth_config,
                endpoint_protection: definition.endpoint_protection,
                active: true,
                updated_at: now,
                ..previous
            };
            return Ok((schema, CreateOutcome::Reactivated));
        }

        let schema = Schema {
            id: ObjectId::new(),
            owner_id: owner.id,
            collection_name: definition.collection_name,
            fields: definition.fields,
            auth_config: definition.auth_config,
            endpoint_protection: definition.endpoint_protection,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.schemas.insert(&schema).await?;
        info!("Created schema {} for owner {}", schema.collection_name, owner.id);
        Ok((schema, CreateOutcome::Created))
    }

    pub async fn update(
        &self,
        owner_id: ObjectId,
        id: ObjectId,
        request: &SchemaRequest,
    ) -> Result<Schema, SchemaError> {
        let existing = self.get(owner_id, id).await?;
        let mut definition = validate_definition(request)?;
        self.ensure_targets_exist(owner_id, &definition).await?;

        if definition.collection_name != existing.collection_name {
            let collision = self
                .schemas
                .select_one(doc! {
                    "user_id": owner_id,
                    "collection_name": &definition.collection_name,
                    "is_active": true,
                    "_id": { "$ne": id },
                })
                .await?;
            if collision.is_some() {
                return Err(SchemaError::Conflict(definition.collection_name));
            }
        }

        // Keep the current secret so outstanding tokens stay valid
        let current_secret = existing.auth().and_then(|a| a.secret()).map(str::to_string);
        definition.auth_config = match (definition.auth_config.take(), current_secret) {
            (Some(mut auth), Some(secret)) => {
                auth.jwt_secret = Some(secret);
                Some(auth)
            }
            (auth, None) => Self::with_fresh_secret(auth),
            (None, Some(_)) => None,
        };

        let now = DateTime::now();
        self.schemas
            .update_one(
                doc! { "_id": id, "user_id": owner_id },
                doc! { "$set": Self::definition_update(&definition, now)? },
            )
            .await?;

        Ok(Schema {
            collection_name: definition.collection_name,
            fields: definition.fields,
            auth_config: definition.auth_config,
            endpoint_protection: definition.endpoint_protection,
            updated_at: now,
            ..existing
        })
    }

    /// Soft delete. Deleting an auth source clears protection flags on the
    /// owner's other schemas; that cascade is best effort.
    pub async fn delete(&self, owner_id: ObjectId, id: ObjectId) -> Result<Schema, SchemaError> {
        let existing = self.get(owner_id, id).await?;
        let now = DateTime::now();
        self.schemas
            .update_one(doc! { "_id": id, "user_id": owner_id }, doc! { "$set": { "is_active": false, "updated_at": now } })
            .await?;

        if existing.auth().is_some() {
            let cascade = self
                .schemas
                .update_many(
                    doc! {
                        "user_id": owner_id,
                        "is_active": true,
                        "_id": { "$ne": id },
                        "$or": [
                            { "endpoint_protection.get": true },
                            { "endpoint_protection.post": true },
                            { "endpoint_protection.put": true },
                            { "endpoint_protection.delete": true },
                        ],
                    },
                    doc! { "$set": { "endpoint_protection": Bson::Null, "updated_at": now } },
                )
                .await;
            match cascade {
                Ok(outcome) if outcome.modified > 0 => {
                    info!("Cleared endpoint protection on {} schemas after deleting {}", outcome.modified, existing.collection_name);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to clear endpoint protection after deleting {}: {}", existing.collection_name, e),
            }
        }

        Ok(Schema { active: false, updated_at: now, ..existing })
    }

    /// Replace the signing secret; every outstanding token for the schema dies
    pub async fn rotate_secret(&self, owner_id: ObjectId, id: ObjectId) -> Result<Schema, SchemaError> {
        let mut schema = self.get(owner_id, id).await?;
        let Some(auth) = schema.auth_config.as_mut().filter(|a| a.enabled) else {
            return Err(SchemaError::AuthNotEnabled);
        };

        let secret = generate_secret();
        let now = DateTime::now();
        self.schemas
            .update_one(
                doc! { "_id": id, "user_id": owner_id },
                doc! { "$set": { "auth_config.jwt_secret": secret.clone(), "updated_at": now } },
            )
            .await?;

        auth.jwt_secret = Some(secret);
        schema.updated_at = now;
        Ok(schema)
    }

    /// Secret of an auth-enabled schema. Schemas stored without one get a
    /// secret through a conditional write; concurrent callers all re-read
    /// whichever write landed first.
    pub async fn ensure_secret(&self, schema: &Schema) -> Result<Option<String>, DatabaseError> {
        let Some(auth) = schema.auth() else {
            return Ok(None);
        };
        if let Some(secret) = auth.secret() {
            return Ok(Some(secret.to_string()));
        }

        self.schemas
            .update_one(
                doc! { "_id": schema.id, "auth_config.jwt_secret": Bson::Null },
                doc! { "$set": { "auth_config.jwt_secret": generate_secret() } },
            )
            .await?;

        let stored = self.schemas.select_one(doc! { "_id": schema.id }).await?;
        Ok(stored
            .as_ref()
            .and_then(|s| s.auth())
            .and_then(|a| a.secret())
            .map(str::to_string))
    }
}
