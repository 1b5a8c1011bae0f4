// BSON <-> JSON conversion for documents crossing the HTTP boundary.
// Identifiers render as hex strings and datetimes as RFC 3339.

use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => Value::String(format_datetime(*dt)),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(document) => Value::Object(document_to_json(document)),
        other => other.clone().into_relaxed_extjson(),
    }
}

pub fn document_to_json(document: &Document) -> Map<String, Value> {
    document
        .iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect()
}

pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(json_object_to_document(map)),
    }
}

pub fn json_object_to_document(map: &Map<String, Value>) -> Document {
    map.iter()
        .map(|(key, value)| (key.clone(), json_to_bson(value)))
        .collect()
}

/// Integral numbers are stored as int64, everything else as double
pub fn number_to_bson(number: &Number) -> Bson {
    match number.as_i64() {
        Some(i) => Bson::Int64(i),
        None => Bson::Double(number.as_f64().unwrap_or_default()),
    }
}

pub fn format_datetime(dt: bson::DateTime) -> String {
    dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}
