use async_trait::async_trait;
use bson::Document;

use super::manager::DatabaseError;

/// Sort and window applied to a `find`
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn sorted(sort: Document) -> Self {
        Self { sort: Some(sort), ..Self::default() }
    }

    pub fn window(mut self, skip: u64, limit: u64) -> Self {
        self.skip = Some(skip);
        self.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Collection-level document access shared by the platform database and
/// every tenant database. Filters, updates and pipelines are MongoDB syntax.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError>;

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DatabaseError>;

    async fn count(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError>;

    /// Insert a document. Callers assign `_id` up front.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DatabaseError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError>;

    /// Returns the number of deleted documents (0 or 1)
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError>;

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
