use bson::Document;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::database::manager::DatabaseError;
use crate::database::store::{DocumentStore, FindOptions, UpdateOutcome};

/// A platform model bound to its collection
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
}

/// Typed access to one platform collection
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter: Document, options: FindOptions) -> Result<Vec<T>, DatabaseError> {
        self.store
            .find(T::COLLECTION, filter, options)
            .await?
            .into_iter()
            .map(|document| bson::from_document(document).map_err(DatabaseError::from))
            .collect()
    }

    pub async fn select_one(&self, filter: Document) -> Result<Option<T>, DatabaseError> {
        match self.store.find_one(T::COLLECTION, filter).await? {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self, filter: Document) -> Result<u64, DatabaseError> {
        self.store.count(T::COLLECTION, filter).await
    }

    pub async fn insert(&self, entity: &T) -> Result<(), DatabaseError> {
        let document = bson::to_document(entity)?;
        self.store.insert_one(T::COLLECTION, document).await
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome, DatabaseError> {
        self.store.update_one(T::COLLECTION, filter, update).await
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateOutcome, DatabaseError> {
        self.store.update_many(T::COLLECTION, filter, update).await
    }

    /// Number of documents removed (0 or 1)
    pub async fn delete_one(&self, filter: Document) -> Result<u64, DatabaseError> {
        self.store.delete_one(T::COLLECTION, filter).await
    }
}
