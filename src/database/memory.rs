use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::manager::{validate_tenant_target, DatabaseError, TenantProvider};
use super::store::{DocumentStore, FindOptions, UpdateOutcome};

/// In-process document store. Understands the filter, update and pipeline
/// subset the service emits, which keeps every component testable without
/// a running MongoDB.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        many: bool,
    ) -> Result<UpdateOutcome, DatabaseError> {
        let mut collections = self.collections.write().await;
        let mut outcome = UpdateOutcome::default();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(outcome);
        };

        for document in documents.iter_mut().filter(|d| matches_filter(d, filter)) {
            outcome.matched += 1;
            if apply_update(document, update)? {
                outcome.modified += 1;
            }
            if !many {
                break;
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|d| matches_filter(d, &filter)))
            .cloned())
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let mut documents: Vec<Document> = collections
            .get(collection)
            .map(|documents| documents.iter().filter(|d| matches_filter(d, &filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort);
        }
        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = options.limit.filter(|l| *l > 0).map_or(usize::MAX, |l| l as usize);
        Ok(documents.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map_or(0, |documents| documents.iter().filter(|d| matches_filter(d, &filter)).count() as u64))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<(), DatabaseError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(document);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError> {
        self.update(collection, &filter, &update, false).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError> {
        self.update(collection, &filter, &update, true).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match documents.iter().position(|d| matches_filter(d, &filter)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let mut rows = collections.get(collection).cloned().unwrap_or_default();
        for stage in &pipeline {
            rows = apply_stage(&collections, rows, stage)?;
        }
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Tenant provider handing out one `MemoryStore` per (uri, database)
#[derive(Debug, Default)]
pub struct MemoryTenants {
    stores: RwLock<HashMap<(String, String), Arc<MemoryStore>>>,
}

impl MemoryTenants {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantProvider for MemoryTenants {
    async fn tenant_store(
        &self,
        connection_uri: &str,
        database_name: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        validate_tenant_target(connection_uri, database_name)?;
        let key = (connection_uri.to_string(), database_name.to_string());
        let mut stores = self.stores.write().await;
        let store = stores.entry(key).or_insert_with(|| Arc::new(MemoryStore::new())).clone();
        Ok(store)
    }
}

fn query_error(message: impl Into<String>) -> DatabaseError {
    DatabaseError::QueryError(message.into())
}

/// Resolve a dotted path such as `data.customer`
pub(crate) fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(child) => child.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" => clauses(condition).any(|clause| matches_filter(document, clause)),
        "$and" => clauses(condition).all(|clause| matches_filter(document, clause)),
        path => matches_condition(lookup_path(document, path), condition),
    })
}

fn clauses(condition: &Bson) -> impl Iterator<Item = &Document> {
    condition.as_array().into_iter().flatten().filter_map(Bson::as_document)
}

fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            operators.iter().all(|(operator, argument)| match operator.as_str() {
                "$eq" => value_equals(value, argument),
                "$ne" => !value_equals(value, argument),
                "$in" => argument
                    .as_array()
                    .is_some_and(|candidates| candidates.iter().any(|c| value_equals(value, c))),
                "$nin" => argument
                    .as_array()
                    .is_some_and(|candidates| !candidates.iter().any(|c| value_equals(value, c))),
                "$exists" => value.is_some() == argument.as_bool().unwrap_or(true),
                _ => false,
            })
        }
        _ => value_equals(value, condition),
    }
}

/// MongoDB equality: a missing field equals null, arrays match any element
fn value_equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_equals(item, expected))
        }
        Some(actual) => bson_equals(actual, expected),
    }
}

fn bson_equals(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) => Some(*f as i64),
        _ => None,
    }
}

/// Apply `$set`, `$unset` and `$inc`. Returns whether anything changed.
fn apply_update(document: &mut Document, update: &Document) -> Result<bool, DatabaseError> {
    let mut changed = false;
    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| query_error(format!("{} expects a document", operator)))?;
        for (path, value) in fields {
            changed |= match operator.as_str() {
                "$set" => set_path(document, path, value.clone()),
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let current = lookup_path(document, path).cloned().unwrap_or(Bson::Int32(0));
                    let next = add_numbers(&current, value)
                        .ok_or_else(|| query_error(format!("cannot $inc non-numeric field {}", path)))?;
                    set_path(document, path, next)
                }
                other => return Err(query_error(format!("unsupported update operator {}", other))),
            };
        }
    }
    Ok(changed)
}

fn add_numbers(current: &Bson, delta: &Bson) -> Option<Bson> {
    match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(Bson::Int32(a + b)),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => Some(Bson::Double(as_f64(current)? + as_f64(delta)?)),
        _ => Some(Bson::Int64(as_i64(current)? + as_i64(delta)?)),
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => {
            let changed = document.get(path) != Some(&value);
            document.insert(path, value);
            changed
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => false,
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => document.remove(path).is_some(),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(child)) => unset_path(child, rest),
            _ => false,
        },
    }
}

fn apply_stage(
    collections: &HashMap<String, Vec<Document>>,
    mut rows: Vec<Document>,
    stage: &Document,
) -> Result<Vec<Document>, DatabaseError> {
    let (name, spec) = stage.iter().next().ok_or_else(|| query_error("empty pipeline stage"))?;
    match name.as_str() {
        "$match" => {
            let filter = spec.as_document().ok_or_else(|| query_error("$match expects a document"))?;
            Ok(rows.into_iter().filter(|row| matches_filter(row, filter)).collect())
        }
        "$lookup" => {
            let spec = spec.as_document().ok_or_else(|| query_error("$lookup expects a document"))?;
            lookup(collections, rows, spec)
        }
        "$unwind" => unwind(rows, spec),
        "$sort" => {
            let sort = spec.as_document().ok_or_else(|| query_error("$sort expects a document"))?;
            sort_documents(&mut rows, sort);
            Ok(rows)
        }
        "$skip" => {
            let skip = as_i64(spec).ok_or_else(|| query_error("$skip expects a number"))?;
            Ok(rows.into_iter().skip(skip.max(0) as usize).collect())
        }
        "$limit" => {
            let limit = as_i64(spec).ok_or_else(|| query_error("$limit expects a number"))?;
            Ok(rows.into_iter().take(limit.max(0) as usize).collect())
        }
        other => Err(query_error(format!("unsupported pipeline stage {}", other))),
    }
}

fn lookup(
    collections: &HashMap<String, Vec<Document>>,
    rows: Vec<Document>,
    spec: &Document,
) -> Result<Vec<Document>, DatabaseError> {
    let field = |key: &str| {
        spec.get_str(key)
            .map_err(|_| query_error(format!("$lookup requires {}", key)))
    };
    let from = field("from")?;
    let local_field = field("localField")?;
    let foreign_field = field("foreignField")?;
    let as_field = field("as")?;

    let foreign = collections.get(from).map(Vec::as_slice).unwrap_or(&[]);
    Ok(rows
        .into_iter()
        .map(|mut row| {
            let local = lookup_path(&row, local_field).cloned().unwrap_or(Bson::Null);
            let matched: Vec<Bson> = foreign
                .iter()
                .filter(|candidate| {
                    let value = lookup_path(candidate, foreign_field);
                    match &local {
                        Bson::Array(items) => items.iter().any(|item| value_equals(value, item)),
                        single => value_equals(value, single),
                    }
                })
                .cloned()
                .map(Bson::Document)
                .collect();
            row.insert(as_field, Bson::Array(matched));
            row
        })
        .collect())
}

fn unwind(rows: Vec<Document>, spec: &Bson) -> Result<Vec<Document>, DatabaseError> {
    let (path, preserve) = match spec {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(options) => (
            options.get_str("path").map_err(|_| query_error("$unwind requires path"))?,
            options.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        ),
        _ => return Err(query_error("$unwind expects a path")),
    };
    let field = path
        .strip_prefix('$')
        .ok_or_else(|| query_error("$unwind path must start with $"))?;

    let mut output = Vec::with_capacity(rows.len());
    for mut row in rows {
        match row.get(field).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut expanded = row.clone();
                    expanded.insert(field, item);
                    output.push(expanded);
                }
            }
            Some(Bson::Array(_)) => {
                if preserve {
                    row.remove(field);
                    output.push(row);
                }
            }
            None | Some(Bson::Null) => {
                if preserve {
                    output.push(row);
                }
            }
            Some(_) => output.push(row),
        }
    }
    Ok(output)
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (key, direction) in sort {
            let ordering = compare_values(lookup_path(a, key), lookup_path(b, key));
            let ordering = if as_i64(direction).unwrap_or(1) < 0 { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
            (Bson::String(x), Bson::String(y)) => x.cmp(y),
            (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
            (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
            _ => match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
    }
}
