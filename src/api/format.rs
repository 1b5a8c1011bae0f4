use bson::{oid::ObjectId, Bson, Document};
use serde_json::{Map, Value};

use crate::database::convert::bson_to_json;
use crate::database::models::Schema;
use crate::services::relations::{PopulationPlan, RelationLookup, StorageShape};

const TIMESTAMPS: [&str; 2] = ["created_at", "updated_at"];

/// Public view of one stored document (or aggregate row).
///
/// Always carries `id` and the timestamps. Public schema fields come from
/// `data`; a relation whose lookup produced a document is replaced by that
/// document's own public view, otherwise the raw id is returned. Private
/// fields never appear.
pub fn project(row: &Document, schema: &Schema, plan: &PopulationPlan, owner_id: ObjectId) -> Map<String, Value> {
    let mut view = Map::new();
    insert_identity(&mut view, row);

    let empty = Document::new();
    let data = row.get_document("data").unwrap_or(&empty);

    for field in schema.fields.iter().filter(|f| f.is_public()) {
        let populated = if field.is_relation() {
            plan.lookup(&field.name).and_then(|lookup| populate(row, lookup, owner_id))
        } else {
            None
        };

        if let Some(value) = populated.or_else(|| data.get(&field.name).map(bson_to_json)) {
            view.insert(field.name.clone(), value);
        }
    }

    view
}

fn insert_identity(view: &mut Map<String, Value>, source: &Document) {
    if let Some(id) = source.get("_id") {
        view.insert("id".to_string(), bson_to_json(id));
    }
    for key in TIMESTAMPS {
        if let Some(value) = source.get(key) {
            view.insert(key.to_string(), bson_to_json(value));
        }
    }
}

fn populate(row: &Document, lookup: &RelationLookup, owner_id: ObjectId) -> Option<Value> {
    let related = row.get_document(lookup.populated_key()).ok()?;
    let hidden = &lookup.target.hidden_fields;
    let mut out = Map::new();

    match lookup.target.shape {
        StorageShape::Wrapped => {
            // Another owner's document never resolves
            if related.get("user_id") != Some(&Bson::ObjectId(owner_id)) {
                return None;
            }
            if let Ok(data) = related.get_document("data") {
                for (key, value) in data {
                    if !hidden.contains(key) {
                        out.insert(key.clone(), bson_to_json(value));
                    }
                }
            }
        }
        StorageShape::Flat => {
            for (key, value) in related {
                if key == "_id" || TIMESTAMPS.contains(&key.as_str()) || is_password_like(key) || hidden.contains(key) {
                    continue;
                }
                out.insert(key.clone(), bson_to_json(value));
            }
        }
    }

    insert_identity(&mut out, related);
    Some(Value::Object(out))
}

pub fn is_password_like(key: &str) -> bool {
    key.to_ascii_lowercase().contains("password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FieldType, SchemaField, Visibility};
    use crate::services::relations::RelationTarget;
    use bson::{doc, DateTime};
    use serde_json::json;

    fn field(name: &str, field_type: FieldType, visibility: Visibility) -> SchemaField {
        SchemaField {
            name: name.into(),
            field_type,
            visibility,
            required: false,
            default: None,
            description: None,
            target: (field_type == FieldType::Relation).then(|| "customers".to_string()),
        }
    }

    fn orders(owner: ObjectId) -> Schema {
        let now = DateTime::now();
        Schema {
            id: ObjectId::new(),
            owner_id: owner,
            collection_name: "orders".into(),
            fields: vec![
                field("total", FieldType::Number, Visibility::Public),
                field("note", FieldType::String, Visibility::Private),
                field("customer", FieldType::Relation, Visibility::Public),
            ],
            auth_config: None,
            endpoint_protection: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn plan(shape: StorageShape, hidden: &[&str]) -> PopulationPlan {
        PopulationPlan {
            lookups: vec![RelationLookup {
                field: "customer".into(),
                target: RelationTarget {
                    collection: "customers".into(),
                    shape,
                    hidden_fields: hidden.iter().map(|s| s.to_string()).collect(),
                },
            }],
        }
    }

    #[test]
    fn test_private_fields_never_projected() {
        let owner = ObjectId::new();
        let id = ObjectId::new();
        let row = doc! {
            "_id": id,
            "user_id": owner,
            "data": { "total": 12.5, "note": "secret" },
            "created_at": DateTime::now(),
            "updated_at": DateTime::now(),
        };
        let view = project(&row, &orders(owner), &PopulationPlan::default(), owner);
        assert_eq!(view["id"], json!(id.to_hex()));
        assert_eq!(view["total"], json!(12.5));
        assert!(!view.contains_key("note"));
        assert!(!view.contains_key("customer"));
        assert!(view.contains_key("created_at"));
    }

    #[test]
    fn test_wrapped_relation_populates_only_for_owner() {
        let owner = ObjectId::new();
        let customer = ObjectId::new();
        let mut row = doc! {
            "_id": ObjectId::new(),
            "user_id": owner,
            "data": { "customer": customer },
            "populated_customer": {
                "_id": customer,
                "user_id": owner,
                "data": { "name": "Ada", "ssn": "123" },
            },
        };

        let view = project(&row, &orders(owner), &plan(StorageShape::Wrapped, &["ssn"]), owner);
        assert_eq!(view["customer"]["name"], json!("Ada"));
        assert_eq!(view["customer"]["id"], json!(customer.to_hex()));
        assert!(view["customer"].get("ssn").is_none());

        row.insert(
            "populated_customer",
            doc! { "_id": customer, "user_id": ObjectId::new(), "data": { "name": "Eve" } },
        );
        let view = project(&row, &orders(owner), &plan(StorageShape::Wrapped, &[]), owner);
        assert_eq!(view["customer"], json!(customer.to_hex()));
    }

    #[test]
    fn test_flat_relation_strips_credentials() {
        let owner = ObjectId::new();
        let customer = ObjectId::new();
        let row = doc! {
            "_id": ObjectId::new(),
            "data": { "customer": customer },
            "populated_customer": {
                "_id": customer,
                "email": "ada@example.com",
                "pwd": "$2b$hash",
                "resetPassword": "token",
            },
        };
        let view = project(&row, &orders(owner), &plan(StorageShape::Flat, &["pwd"]), owner);
        assert_eq!(view["customer"]["email"], json!("ada@example.com"));
        assert!(view["customer"].get("pwd").is_none());
        assert!(view["customer"].get("resetPassword").is_none());
    }
}
