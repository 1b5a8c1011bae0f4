use bson::{oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

/// Generic document stored in an owner-defined collection.
/// Auth user records are stored flat instead, see `StorageShape`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicData {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "user_id")]
    pub owner_id: ObjectId,
    pub data: Document,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl DynamicData {
    pub fn new(owner_id: ObjectId, data: Document) -> Self {
        let now = DateTime::now();
        Self {
            id: ObjectId::new(),
            owner_id,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}
