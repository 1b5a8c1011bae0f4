// Swagger 2.0 document for one owner's dynamic surface.
//
// Derived only from the active schemas passed in; nothing here touches storage.

use serde_json::{json, Map, Value};

use crate::database::convert::bson_to_json;
use crate::database::models::{FieldType, PlatformUser, Schema, SchemaField};
use crate::types::CrudVerb;

fn definition_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn reference(name: &str) -> Value {
    json!({ "$ref": format!("#/definitions/{}", name) })
}

/// Property schema for one field
fn field_property(field: &SchemaField) -> Value {
    let mut property = match field.field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::Object => json!({ "type": "object" }),
        FieldType::Array => json!({ "type": "array", "items": {} }),
        FieldType::Relation => json!({
            "type": "string",
            "format": "objectid",
            "x-relation-target": field.target.clone().unwrap_or_default(),
        }),
    };

    if let Some(object) = property.as_object_mut() {
        if let Some(description) = &field.description {
            object.insert("description".into(), json!(description));
        }
        if let Some(default) = &field.default {
            object.insert("default".into(), bson_to_json(default));
        }
    }
    property
}

/// Client-visible shape: public fields plus identity and timestamps
fn output_definition(schema: &Schema) -> Value {
    let mut properties = Map::new();
    properties.insert("id".into(), json!({ "type": "string", "format": "objectid" }));
    for field in schema.fields.iter().filter(|f| f.is_public()) {
        properties.insert(field.name.clone(), field_property(field));
    }
    properties.insert("created_at".into(), json!({ "type": "string", "format": "date-time" }));
    properties.insert("updated_at".into(), json!({ "type": "string", "format": "date-time" }));
    json!({ "type": "object", "properties": properties })
}

fn input_definition(schema: &Schema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in &schema.fields {
        properties.insert(field.name.clone(), field_property(field));
        if field.required {
            required.push(json!(field.name));
        }
    }

    let mut definition = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        definition["required"] = Value::Array(required);
    }
    definition
}

fn id_parameter() -> Value {
    json!({ "name": "id", "in": "path", "required": true, "type": "string", "description": "Document ID" })
}

fn body_parameter(description: &str, definition: &str) -> Value {
    json!({
        "name": "body",
        "in": "body",
        "required": true,
        "description": description,
        "schema": {
            "type": "object",
            "properties": { "data": reference(definition) },
            "required": ["data"],
        },
    })
}

fn operation(schema: &Schema, verb: CrudVerb, mut operation: Value) -> Value {
    operation["tags"] = json!([schema.collection_name]);
    if schema.requires_auth(verb) {
        operation["security"] = json!([{ "ApiKeyAuth": [], "BearerAuth": [] }]);
        if let Some(responses) = operation["responses"].as_object_mut() {
            responses.entry("401").or_insert_with(|| json!({ "description": "Bearer token missing or invalid" }));
        }
    }
    operation
}

fn collection_paths(schema: &Schema, paths: &mut Map<String, Value>) {
    let name = &schema.collection_name;
    let output = definition_name(name);
    let input = format!("{}Input", output);

    let list = operation(schema, CrudVerb::Get, json!({
        "summary": format!("List {}", name),
        "parameters": [
            { "name": "page", "in": "query", "type": "integer", "description": "Page number (default: 1)" },
            { "name": "limit", "in": "query", "type": "integer", "description": "Items per page (default: 10, max: 100)" },
        ],
        "responses": {
            "200": {
                "description": "Success",
                "schema": {
                    "type": "object",
                    "properties": {
                        "data": { "type": "array", "items": reference(&output) },
                        "pagination": reference("Pagination"),
                    },
                },
            },
        },
    }));

    let create = operation(schema, CrudVerb::Post, json!({
        "summary": format!("Create {}", name),
        "parameters": [body_parameter("Document data", &input)],
        "responses": {
            "201": { "description": "Document created successfully" },
            "400": { "description": "Validation error" },
            "404": { "description": "Schema not found" },
        },
    }));

    let show = operation(schema, CrudVerb::Get, json!({
        "summary": format!("Get {} by ID", name),
        "parameters": [id_parameter()],
        "responses": {
            "200": { "description": "Success", "schema": reference(&output) },
            "400": { "description": "Invalid document ID" },
            "404": { "description": "Document not found" },
        },
    }));

    let update = operation(schema, CrudVerb::Put, json!({
        "summary": format!("Update {}", name),
        "parameters": [id_parameter(), body_parameter("Fields to update", &input)],
        "responses": {
            "200": { "description": "Document updated successfully" },
            "400": { "description": "Validation error" },
            "404": { "description": "Document not found" },
        },
    }));

    let delete = operation(schema, CrudVerb::Delete, json!({
        "summary": format!("Delete {}", name),
        "parameters": [id_parameter()],
        "responses": {
            "200": { "description": "Document deleted successfully" },
            "404": { "description": "Document not found" },
        },
    }));

    paths.insert(format!("/{}", name), json!({ "get": list, "post": create }));
    paths.insert(format!("/{}/{{id}}", name), json!({ "get": show, "put": update, "delete": delete }));
}

fn auth_paths(schema: &Schema, paths: &mut Map<String, Value>) {
    let name = &schema.collection_name;
    let tag = json!([format!("{} Auth", name)]);
    let input = format!("{}Input", definition_name(name));

    paths.insert(format!("/{}/auth/signup", name), json!({
        "post": {
            "summary": format!("Sign up for {}", name),
            "tags": tag,
            "parameters": [body_parameter("User signup data", &input)],
            "responses": {
                "201": { "description": "User created successfully", "schema": reference("AuthResponse") },
                "400": { "description": "Validation error" },
                "403": { "description": "Signup is disabled for this collection" },
                "409": { "description": "User already exists" },
            },
        },
    }));

    paths.insert(format!("/{}/auth/login", name), json!({
        "post": {
            "summary": format!("Login to {}", name),
            "tags": tag,
            "parameters": [{
                "name": "body",
                "in": "body",
                "required": true,
                "schema": reference("LoginRequest"),
            }],
            "responses": {
                "200": { "description": "Login successful", "schema": reference("AuthResponse") },
                "401": { "description": "Invalid credentials" },
            },
        },
    }));

    paths.insert(format!("/{}/auth/validate", name), json!({
        "get": {
            "summary": format!("Validate a {} token", name),
            "tags": tag,
            "security": [{ "ApiKeyAuth": [], "BearerAuth": [] }],
            "responses": {
                "200": {
                    "description": "Token is valid",
                    "schema": {
                        "type": "object",
                        "properties": {
                            "valid": { "type": "boolean" },
                            "user_id": { "type": "string" },
                            "collection": { "type": "string" },
                            "expires_at": { "type": "string", "format": "date-time" },
                        },
                    },
                },
                "401": { "description": "Invalid token" },
            },
        },
    }));
}

fn shared_definitions(definitions: &mut Map<String, Value>) {
    definitions.insert("Pagination".into(), json!({
        "type": "object",
        "properties": {
            "page": { "type": "integer" },
            "limit": { "type": "integer" },
            "total": { "type": "integer" },
            "total_pages": { "type": "integer" },
        },
    }));
    definitions.insert("LoginRequest".into(), json!({
        "type": "object",
        "properties": {
            "identifier": { "type": "string", "description": "Email or username" },
            "password": { "type": "string" },
        },
        "required": ["identifier", "password"],
    }));
    definitions.insert("AuthResponse".into(), json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "token": { "type": "string", "description": "Collection-scoped bearer token" },
            "user": { "type": "object" },
        },
    }));
}

/// Build the document. `schemas` must already be filtered to the owner's active ones.
pub fn build_api_document(owner: &PlatformUser, schemas: &[Schema], host: &str, scheme: &str) -> Value {
    let mut paths = Map::new();
    let mut definitions = Map::new();
    shared_definitions(&mut definitions);

    let mut needs_bearer = false;
    for schema in schemas {
        let output = definition_name(&schema.collection_name);
        definitions.insert(format!("{}Input", output), input_definition(schema));
        definitions.insert(output, output_definition(schema));

        collection_paths(schema, &mut paths);
        if schema.auth().is_some() {
            auth_paths(schema, &mut paths);
            needs_bearer = true;
        }
        if schema.endpoint_protection.is_some_and(|p| p.any()) {
            needs_bearer = true;
        }
    }

    let mut security_definitions = Map::new();
    security_definitions.insert("ApiKeyAuth".into(), json!({
        "type": "apiKey",
        "name": "X-API-Key",
        "in": "header",
        "description": "Your platform API key",
    }));
    if needs_bearer {
        security_definitions.insert("BearerAuth".into(), json!({
            "type": "apiKey",
            "name": "Authorization",
            "in": "header",
            "description": "Collection token. Format: Bearer {token}",
        }));
    }

    json!({
        "swagger": "2.0",
        "info": {
            "title": "Your SchemaCraft API",
            "description": "API documentation generated from your schemas",
            "version": "1.0",
            "contact": { "name": owner.name, "email": owner.email },
        },
        "host": host,
        "basePath": "/api",
        "schemes": [scheme],
        "consumes": ["application/json"],
        "produces": ["application/json"],
        "security": [{ "ApiKeyAuth": [] }],
        "securityDefinitions": security_definitions,
        "paths": paths,
        "definitions": definitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{ApiUsage, AuthConfig, EndpointProtection, LoginFields, Visibility};
    use bson::{oid::ObjectId, DateTime};

    fn owner() -> PlatformUser {
        let now = DateTime::now();
        PlatformUser {
            id: ObjectId::new(),
            name: "Owner".into(),
            email: "owner@example.com".into(),
            password: "hash".into(),
            api_key: "key-that-must-not-leak".into(),
            mongodb_uri: None,
            database_name: None,
            is_admin: false,
            is_active: true,
            api_usage: ApiUsage::new(1000, chrono::Utc::now()),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn field(name: &str, field_type: FieldType, visibility: Visibility, required: bool) -> SchemaField {
        SchemaField {
            name: name.into(),
            field_type,
            visibility,
            required,
            default: None,
            description: None,
            target: (field_type == FieldType::Relation).then(|| "customers".to_string()),
        }
    }

    fn schema(name: &str, fields: Vec<SchemaField>) -> Schema {
        let now = DateTime::now();
        Schema {
            id: ObjectId::new(),
            owner_id: ObjectId::new(),
            collection_name: name.into(),
            fields,
            auth_config: None,
            endpoint_protection: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_definitions_and_type_mapping() {
        let orders = schema("orders", vec![
            field("amount", FieldType::Number, Visibility::Public, true),
            field("placed", FieldType::Date, Visibility::Public, false),
            field("customer", FieldType::Relation, Visibility::Public, false),
            field("tags", FieldType::Array, Visibility::Public, false),
            field("note", FieldType::String, Visibility::Private, false),
        ]);
        let doc = build_api_document(&owner(), &[orders], "api.example.com", "https");

        assert_eq!(doc["swagger"], "2.0");
        assert_eq!(doc["host"], "api.example.com");
        assert_eq!(doc["schemes"][0], "https");
        assert!(doc["securityDefinitions"].get("BearerAuth").is_none());
        assert!(!doc.to_string().contains("key-that-must-not-leak"));

        let output = &doc["definitions"]["Orders"]["properties"];
        assert_eq!(output["placed"]["format"], "date-time");
        assert_eq!(output["customer"]["x-relation-target"], "customers");
        assert_eq!(output["tags"]["type"], "array");
        assert!(output.get("note").is_none());
        assert!(output.get("id").is_some());

        let input = &doc["definitions"]["OrdersInput"];
        assert!(input["properties"].get("note").is_some());
        assert_eq!(input["required"], json!(["amount"]));

        assert!(doc["paths"].get("/orders").is_some());
        assert!(doc["paths"].get("/orders/{id}").is_some());
        assert!(doc["paths"].get("/orders/auth/signup").is_none());
    }

    #[test]
    fn test_protection_and_auth_paths() {
        let mut accounts = schema("accounts", vec![
            field("email", FieldType::String, Visibility::Public, true),
            field("pwd", FieldType::String, Visibility::Private, true),
        ]);
        accounts.auth_config = Some(AuthConfig {
            enabled: true,
            user_collection: "accounts_users".into(),
            login_fields: LoginFields { email_field: "email".into(), username_field: None, allow_both: false },
            password_field: "pwd".into(),
            response_fields: vec![],
            token_expiration_hours: 24,
            allow_signup: true,
            jwt_secret: Some("s".into()),
        });
        let mut notes = schema("notes", vec![field("body", FieldType::String, Visibility::Public, false)]);
        notes.endpoint_protection = Some(EndpointProtection { post: true, ..Default::default() });

        let doc = build_api_document(&owner(), &[accounts, notes], "localhost:8080", "http");
        assert!(doc["securityDefinitions"].get("BearerAuth").is_some());
        assert!(doc["paths"].get("/accounts/auth/login").is_some());
        assert!(doc["paths"]["/notes"]["post"]["security"].is_array());
        assert!(doc["paths"]["/notes"]["get"].get("security").is_none());
    }
}
