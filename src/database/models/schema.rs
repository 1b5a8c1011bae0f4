use bson::{oid::ObjectId, Bson, DateTime};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::convert::bson_to_json;
use crate::database::repository::Entity;
use crate::types::CrudVerb;

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Relation,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Object,
        FieldType::Array,
        FieldType::Relation,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub required: bool,
    /// Already coerced to the field's storage representation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Bson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target collection name, relation fields only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl SchemaField {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_relation(&self) -> bool {
        self.field_type == FieldType::Relation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginFields {
    pub email_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_field: Option<String>,
    #[serde(default)]
    pub allow_both: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub user_collection: String,
    pub login_fields: LoginFields,
    pub password_field: String,
    #[serde(default)]
    pub response_fields: Vec<String>,
    pub token_expiration_hours: i64,
    pub allow_signup: bool,
    /// Signing key for this collection's tokens. Never leaves the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    pub fn default_user_collection(collection_name: &str) -> String {
        format!("{}_users", collection_name)
    }

    pub fn secret(&self) -> Option<&str> {
        self.jwt_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Field used as the login identifier alongside the email, if enabled
    pub fn username_login_field(&self) -> Option<&str> {
        if self.login_fields.allow_both {
            self.login_fields.username_field.as_deref().filter(|f| !f.is_empty())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointProtection {
    #[serde(default)]
    pub get: bool,
    #[serde(default)]
    pub post: bool,
    #[serde(default)]
    pub put: bool,
    #[serde(default)]
    pub delete: bool,
}

impl EndpointProtection {
    pub fn requires(&self, verb: CrudVerb) -> bool {
        match verb {
            CrudVerb::Get => self.get,
            CrudVerb::Post => self.post,
            CrudVerb::Put => self.put,
            CrudVerb::Delete => self.delete,
        }
    }

    pub fn any(&self) -> bool {
        self.get || self.post || self.put || self.delete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "user_id")]
    pub owner_id: ObjectId,
    pub collection_name: String,
    pub fields: Vec<SchemaField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_protection: Option<EndpointProtection>,
    #[serde(rename = "is_active")]
    pub active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Entity for Schema {
    const COLLECTION: &'static str = "schemas";
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Auth configuration, only when enabled
    pub fn auth(&self) -> Option<&AuthConfig> {
        self.auth_config.as_ref().filter(|a| a.enabled)
    }

    pub fn requires_auth(&self, verb: CrudVerb) -> bool {
        self.endpoint_protection.is_some_and(|p| p.requires(verb))
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter().filter(|f| f.is_relation())
    }

    pub fn to_view(&self) -> SchemaView {
        SchemaView {
            id: self.id.to_hex(),
            user_id: self.owner_id.to_hex(),
            collection_name: self.collection_name.clone(),
            fields: self.fields.iter().map(FieldView::from).collect(),
            auth_config: self.auth_config.as_ref().map(AuthConfigView::from),
            endpoint_protection: self.endpoint_protection,
            is_active: self.active,
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
        }
    }
}

/// Client-facing schema. Carries no signing secret.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaView {
    pub id: String,
    pub user_id: String,
    pub collection_name: String,
    pub fields: Vec<FieldView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfigView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_protection: Option<EndpointProtection>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub visibility: Visibility,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl From<&SchemaField> for FieldView {
    fn from(field: &SchemaField) -> Self {
        Self {
            name: field.name.clone(),
            field_type: field.field_type,
            visibility: field.visibility,
            required: field.required,
            default: field.default.as_ref().map(bson_to_json),
            description: field.description.clone(),
            target: field.target.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthConfigView {
    pub enabled: bool,
    pub user_collection: String,
    pub login_fields: LoginFields,
    pub password_field: String,
    pub response_fields: Vec<String>,
    pub token_expiration_hours: i64,
    pub allow_signup: bool,
    pub has_secret: bool,
}

impl From<&AuthConfig> for AuthConfigView {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            enabled: auth.enabled,
            user_collection: auth.user_collection.clone(),
            login_fields: auth.login_fields.clone(),
            password_field: auth.password_field.clone(),
            response_fields: auth.response_fields.clone(),
            token_expiration_hours: auth.token_expiration_hours,
            allow_signup: auth.allow_signup,
            has_secret: auth.secret().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(auth_secret: Option<&str>) -> Schema {
        let now = DateTime::now();
        Schema {
            id: ObjectId::new(),
            owner_id: ObjectId::new(),
            collection_name: "accounts".to_string(),
            fields: vec![SchemaField {
                name: "email".to_string(),
                field_type: FieldType::String,
                visibility: Visibility::Public,
                required: true,
                default: None,
                description: None,
                target: None,
            }],
            auth_config: Some(AuthConfig {
                enabled: true,
                user_collection: AuthConfig::default_user_collection("accounts"),
                login_fields: LoginFields {
                    email_field: "email".to_string(),
                    username_field: None,
                    allow_both: false,
                },
                password_field: "pwd".to_string(),
                response_fields: vec![],
                token_expiration_hours: 24,
                allow_signup: true,
                jwt_secret: auth_secret.map(str::to_string),
            }),
            endpoint_protection: Some(EndpointProtection { post: true, ..Default::default() }),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("relation"), Some(FieldType::Relation));
        assert_eq!(FieldType::parse("String"), None);
        assert_eq!(Visibility::parse("private"), Some(Visibility::Private));
    }

    #[test]
    fn test_view_never_carries_secret() {
        let schema = sample(Some("deadbeef"));
        let json = serde_json::to_value(schema.to_view()).unwrap();

        assert_eq!(json["auth_config"]["has_secret"], true);
        assert_eq!(json["auth_config"]["user_collection"], "accounts_users");
        assert!(!json.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_protection_per_verb() {
        let schema = sample(None);
        assert!(schema.requires_auth(CrudVerb::Post));
        assert!(!schema.requires_auth(CrudVerb::Get));
        assert!(schema.auth().unwrap().secret().is_none());
    }

    #[test]
    fn test_bson_round_trip_keeps_storage_names() {
        let schema = sample(Some("s3cret"));
        let document = bson::to_document(&schema).unwrap();
        assert!(document.contains_key("user_id"));
        assert!(document.contains_key("is_active"));
        assert_eq!(document.get_document("auth_config").unwrap().get_str("jwt_secret").unwrap(), "s3cret");

        let back: Schema = bson::from_document(document).unwrap();
        assert_eq!(back, schema);
    }
}
