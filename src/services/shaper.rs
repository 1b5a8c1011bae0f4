// Field validator / document shaper
//
// Interprets a schema's field list against an input map. Undeclared keys
// are dropped. Relation identifiers are collected so the relation resolver
// can check them for existence before anything is written.

use bson::{oid::ObjectId, Bson, Document};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::convert::{json_object_to_document, json_to_bson, number_to_bson};
use crate::database::manager::DatabaseError;
use crate::database::models::{FieldType, Schema, SchemaField};

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': expected {expected}")]
    InvalidType { field: String, expected: &'static str },

    #[error("Relation field must be a valid ObjectID: {0}")]
    InvalidRelationId(String),

    #[error("Referenced document not found for field: {0}")]
    DanglingReference(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ShapeError {
    /// Name of the offending field, if the error is about one
    pub fn field(&self) -> Option<&str> {
        match self {
            ShapeError::MissingField(field)
            | ShapeError::InvalidRelationId(field)
            | ShapeError::DanglingReference(field) => Some(field),
            ShapeError::InvalidType { field, .. } => Some(field),
            ShapeError::Database(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeMode {
    /// Required and default handling applies
    Create,
    /// Only fields present in the payload are touched
    Update,
}

/// A relation identifier that must exist before the write proceeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: String,
    pub id: ObjectId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedDocument {
    pub data: Document,
    pub references: Vec<Reference>,
}

/// Build the persisted data map for `input`, in schema field order
pub fn shape(schema: &Schema, input: &Map<String, Value>, mode: ShapeMode) -> Result<ShapedDocument, ShapeError> {
    let mut shaped = ShapedDocument::default();

    for field in &schema.fields {
        let value = match input.get(&field.name) {
            Some(Value::Null) if field.required && mode == ShapeMode::Create => {
                return Err(ShapeError::MissingField(field.name.clone()));
            }
            Some(raw) => coerce_value(field, raw)?,
            None => match (mode, &field.default) {
                (ShapeMode::Update, _) => continue,
                (ShapeMode::Create, Some(default)) => default.clone(),
                (ShapeMode::Create, None) if field.required => {
                    return Err(ShapeError::MissingField(field.name.clone()));
                }
                (ShapeMode::Create, None) => continue,
            },
        };

        if let (true, Bson::ObjectId(id)) = (field.is_relation(), &value) {
            shaped.references.push(Reference { field: field.name.clone(), id: *id });
        }
        shaped.data.insert(field.name.clone(), value);
    }

    Ok(shaped)
}

/// Check and convert one value to the field's storage representation
pub fn coerce_value(field: &SchemaField, value: &Value) -> Result<Bson, ShapeError> {
    if value.is_null() {
        return Ok(Bson::Null);
    }

    let invalid = |expected: &'static str| ShapeError::InvalidType { field: field.name.clone(), expected };

    match field.field_type {
        FieldType::String => value
            .as_str()
            .map(|s| Bson::String(s.to_string()))
            .ok_or_else(|| invalid("string")),
        FieldType::Number => match value {
            Value::Number(n) => Ok(number_to_bson(n)),
            _ => Err(invalid("number")),
        },
        FieldType::Boolean => value.as_bool().map(Bson::Boolean).ok_or_else(|| invalid("boolean")),
        FieldType::Date => value
            .as_str()
            .and_then(parse_date)
            .map(Bson::DateTime)
            .ok_or_else(|| invalid("date (RFC 3339 or YYYY-MM-DD)")),
        FieldType::Object => value
            .as_object()
            .map(|map| Bson::Document(json_object_to_document(map)))
            .ok_or_else(|| invalid("object")),
        FieldType::Array => match value {
            Value::Array(_) => Ok(json_to_bson(value)),
            _ => Err(invalid("array")),
        },
        FieldType::Relation => parse_reference(value)
            .map(Bson::ObjectId)
            .ok_or_else(|| ShapeError::InvalidRelationId(field.name.clone())),
    }
}

/// Accepts the hex form or an extended-JSON `{"$oid": "..."}`
pub fn parse_reference(value: &Value) -> Option<ObjectId> {
    let hex = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("$oid")?.as_str()?,
        _ => return None,
    };
    ObjectId::parse_str(hex).ok()
}

fn parse_date(value: &str) -> Option<bson::DateTime> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(bson::DateTime::from_chrono(parsed.with_timezone(&Utc)));
    }
    let midnight = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(bson::DateTime::from_chrono(Utc.from_utc_datetime(&midnight)))
}
