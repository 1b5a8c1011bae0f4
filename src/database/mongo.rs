use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{FindOptions as DriverFindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use std::future::Future;
use std::time::Duration;

use super::manager::DatabaseError;
use super::store::{DocumentStore, FindOptions, UpdateOutcome};

/// `DocumentStore` backed by one MongoDB database
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    operation_timeout: Duration,
}

impl MongoStore {
    pub fn new(database: Database, operation_timeout: Duration) -> Self {
        Self { database, operation_timeout }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Every driver call runs under the configured deadline
    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, mongodb::error::Error>>,
    {
        match tokio::time::timeout(self.operation_timeout, future).await {
            Ok(result) => result.map_err(DatabaseError::from),
            Err(_) => Err(DatabaseError::Timeout(operation)),
        }
    }

    pub async fn ensure_platform_indexes(&self) -> Result<(), DatabaseError> {
        let unique = || IndexOptions::builder().unique(true).build();

        let users = self.collection("users");
        let email = IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build();
        let api_key = IndexModel::builder().keys(doc! { "api_key": 1 }).options(unique()).build();
        self.bounded("create_index", users.create_index(email, None)).await?;
        self.bounded("create_index", users.create_index(api_key, None)).await?;

        let schemas = self.collection("schemas");
        let by_owner = IndexModel::builder()
            .keys(doc! { "user_id": 1, "collection_name": 1, "is_active": 1 })
            .build();
        self.bounded("create_index", schemas.create_index(by_owner, None)).await?;

        for name in ["activities", "notifications"] {
            let recent = IndexModel::builder().keys(doc! { "user_id": 1, "created_at": -1 }).build();
            self.bounded("create_index", self.collection(name).create_index(recent, None)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError> {
        self.bounded("find_one", self.collection(collection).find_one(filter, None)).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DatabaseError> {
        let mut driver_options = DriverFindOptions::default();
        driver_options.sort = options.sort;
        driver_options.skip = options.skip;
        driver_options.limit = options.limit;

        let collection = self.collection(collection);
        self.bounded("find", async move {
            let cursor = collection.find(filter, driver_options).await?;
            cursor.try_collect().await
        })
        .await
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        self.bounded("count", self.collection(collection).count_documents(filter, None)).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DatabaseError> {
        self.bounded("insert_one", self.collection(collection).insert_one(document, None))
            .await
            .map(|_| ())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError> {
        let result = self
            .bounded("update_one", self.collection(collection).update_one(filter, update, None))
            .await?;
        Ok(UpdateOutcome { matched: result.matched_count, modified: result.modified_count })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, DatabaseError> {
        let result = self
            .bounded("update_many", self.collection(collection).update_many(filter, update, None))
            .await?;
        Ok(UpdateOutcome { matched: result.matched_count, modified: result.modified_count })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let result = self
            .bounded("delete_one", self.collection(collection).delete_one(filter, None))
            .await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DatabaseError> {
        let collection = self.collection(collection);
        self.bounded("aggregate", async move {
            let cursor = collection.aggregate(pipeline, None).await?;
            cursor.try_collect().await
        })
        .await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.bounded("ping", self.database.run_command(doc! { "ping": 1 }, None))
            .await
            .map(|_| ())
    }
}
