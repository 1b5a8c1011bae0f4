use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use std::sync::Arc;

use crate::database::manager::DatabaseError;
use crate::database::models::DynamicData;
use crate::database::store::DocumentStore;

/// Access to owner-defined collections inside one tenant database.
/// Wrapped documents are always scoped by the owning platform account.
#[derive(Clone)]
pub struct DynamicRepository {
    store: Arc<dyn DocumentStore>,
    owner_id: ObjectId,
}

impl DynamicRepository {
    pub fn new(store: Arc<dyn DocumentStore>, owner_id: ObjectId) -> Self {
        Self { store, owner_id }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn owner_filter(&self) -> Document {
        doc! { "user_id": self.owner_id }
    }

    pub fn by_id_filter(&self, id: ObjectId) -> Document {
        doc! { "_id": id, "user_id": self.owner_id }
    }

    pub async fn insert(&self, collection: &str, data: Document) -> Result<DynamicData, DatabaseError> {
        let record = DynamicData::new(self.owner_id, data);
        self.store.insert_one(collection, bson::to_document(&record)?).await?;
        Ok(record)
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DatabaseError> {
        self.store.aggregate(collection, pipeline).await
    }

    pub async fn count(&self, collection: &str) -> Result<u64, DatabaseError> {
        self.store.count(collection, self.owner_filter()).await
    }

    /// `$set` each given field under `data.`, never replacing the whole map.
    /// Returns the new `updated_at` when the document exists.
    pub async fn merge_fields(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
    ) -> Result<Option<DateTime>, DatabaseError> {
        let now = DateTime::now();
        let mut set = doc! { "updated_at": now };
        for (name, value) in fields {
            set.insert(format!("data.{}", name), value);
        }

        let outcome = self
            .store
            .update_one(collection, self.by_id_filter(id), doc! { "$set": set })
            .await?;
        Ok((outcome.matched > 0).then_some(now))
    }

    pub async fn delete(&self, collection: &str, id: ObjectId) -> Result<bool, DatabaseError> {
        Ok(self.store.delete_one(collection, self.by_id_filter(id)).await? > 0)
    }

    /// Auth user records: flat fields, not owner-scoped
    pub async fn find_flat(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError> {
        self.store.find_one(collection, filter).await
    }

    pub async fn insert_flat(&self, collection: &str, fields: Document) -> Result<Document, DatabaseError> {
        let now = DateTime::now();
        let mut record = doc! { "_id": ObjectId::new() };
        for (name, value) in fields {
            record.insert(name, value);
        }
        record.insert("created_at", Bson::DateTime(now));
        record.insert("updated_at", Bson::DateTime(now));

        self.store.insert_one(collection, record.clone()).await?;
        Ok(record)
    }
}
