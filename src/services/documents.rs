// Dynamic CRUD over one owner's tenant database.
//
// Write path: shaper -> relation existence checks -> store.
// Read path: population pipeline -> visibility projection.

use bson::{oid::ObjectId, DateTime};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::format::project;
use crate::database::{DatabaseError, DocumentStore, DynamicRepository};
use crate::database::models::Schema;
use crate::services::relations::RelationResolver;
use crate::services::shaper::{shape, ShapeError, ShapeMode};
use crate::types::Page;

/// A stored document as returned by create
#[derive(Debug, Clone)]
pub struct CreatedDocument {
    pub id: ObjectId,
    pub created_at: DateTime,
    pub view: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub items: Vec<Map<String, Value>>,
    pub total: u64,
}

#[derive(Clone)]
pub struct DocumentService {
    records: DynamicRepository,
    resolver: RelationResolver,
    owner_id: ObjectId,
}

impl DocumentService {
    pub fn new(platform: Arc<dyn DocumentStore>, tenant: Arc<dyn DocumentStore>, owner_id: ObjectId) -> Self {
        Self {
            records: DynamicRepository::new(tenant, owner_id),
            resolver: RelationResolver::new(platform, owner_id),
            owner_id,
        }
    }

    pub async fn create(&self, schema: &Schema, input: &Map<String, Value>) -> Result<CreatedDocument, ShapeError> {
        let shaped = shape(schema, input, ShapeMode::Create)?;
        self.resolver
            .verify_references(self.records.store(), schema, &shaped.references)
            .await?;

        let record = self.records.insert(&schema.collection_name, shaped.data).await?;
        tracing::debug!("Created document {} in {}", record.id, schema.collection_name);

        let view = match self.get(schema, record.id).await? {
            Some(view) => view,
            None => Map::new(),
        };
        Ok(CreatedDocument { id: record.id, created_at: record.created_at, view })
    }

    pub async fn list(&self, schema: &Schema, page: Page) -> Result<DocumentPage, DatabaseError> {
        let total = self.records.count(&schema.collection_name).await?;
        let plan = self.resolver.build_population_plan(schema).await?;
        let pipeline = plan.paged_pipeline(self.records.owner_filter(), page);

        let rows = self.records.aggregate(&schema.collection_name, pipeline).await?;
        let items = rows.iter().map(|row| project(row, schema, &plan, self.owner_id)).collect();
        Ok(DocumentPage { items, total })
    }

    pub async fn get(&self, schema: &Schema, id: ObjectId) -> Result<Option<Map<String, Value>>, DatabaseError> {
        let (plan, pipeline) = self
            .resolver
            .build_population_pipeline(schema, self.records.by_id_filter(id))
            .await?;

        let rows = self.records.aggregate(&schema.collection_name, pipeline).await?;
        Ok(rows.first().map(|row| project(row, schema, &plan, self.owner_id)))
    }

    /// Partial merge of the present fields. `None` when the document does not exist.
    pub async fn update(
        &self,
        schema: &Schema,
        id: ObjectId,
        input: &Map<String, Value>,
    ) -> Result<Option<DateTime>, ShapeError> {
        let shaped = shape(schema, input, ShapeMode::Update)?;
        self.resolver
            .verify_references(self.records.store(), schema, &shaped.references)
            .await?;

        Ok(self.records.merge_fields(&schema.collection_name, id, shaped.data).await?)
    }

    pub async fn delete(&self, schema: &Schema, id: ObjectId) -> Result<bool, DatabaseError> {
        self.records.delete(&schema.collection_name, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FieldType, SchemaField, Visibility};
    use crate::database::{MemoryStore, Repository};
    use bson::Bson;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType) -> SchemaField {
        SchemaField {
            name: name.into(),
            field_type,
            visibility: Visibility::Public,
            required: false,
            default: None,
            description: None,
            target: None,
        }
    }

    fn schema(owner: ObjectId, name: &str, fields: Vec<SchemaField>) -> Schema {
        let now = DateTime::now();
        Schema {
            id: ObjectId::new(),
            owner_id: owner,
            collection_name: name.into(),
            fields,
            auth_config: None,
            endpoint_protection: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn fixture() -> (DocumentService, Schema, Schema) {
        let owner = ObjectId::new();
        let platform: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let tenant: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

        let customers = schema(owner, "customers", vec![field("name", FieldType::String)]);
        let mut amount = field("amount", FieldType::Number);
        amount.required = true;
        let mut status = field("status", FieldType::String);
        status.default = Some(Bson::String("pending".into()));
        let mut customer = field("customer", FieldType::Relation);
        customer.target = Some("customers".into());
        let mut note = field("note", FieldType::String);
        note.visibility = Visibility::Private;
        let orders = schema(owner, "orders", vec![amount, status, customer, note]);

        let schemas = Repository::<Schema>::new(platform.clone());
        schemas.insert(&customers).await.unwrap();
        schemas.insert(&orders).await.unwrap();

        (DocumentService::new(platform, tenant, owner), customers, orders)
    }

    #[tokio::test]
    async fn test_create_defaults_and_populates() {
        let (service, customers, orders) = fixture().await;
        let ada = service
            .create(&customers, json!({ "name": "Ada" }).as_object().unwrap())
            .await
            .unwrap();

        let input = json!({ "amount": 100, "customer": ada.id.to_hex(), "note": "hidden", "extra": 1 });
        let created = service.create(&orders, input.as_object().unwrap()).await.unwrap();
        assert_eq!(created.view["status"], json!("pending"));

        let view = service.get(&orders, created.id).await.unwrap().unwrap();
        assert_eq!(view["amount"], json!(100));
        assert_eq!(view["customer"]["name"], json!("Ada"));
        assert!(view.get("note").is_none());
        assert!(view.get("extra").is_none());
    }

    #[tokio::test]
    async fn test_dangling_reference_persists_nothing() {
        let (service, _, orders) = fixture().await;
        let input = json!({ "amount": 5, "customer": ObjectId::new().to_hex() });
        let err = service.create(&orders, input.as_object().unwrap()).await.unwrap_err();
        assert!(matches!(err, ShapeError::DanglingReference(ref f) if f == "customer"));
        assert_eq!(service.list(&orders, Page { page: 1, limit: 10 }).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_update_merges_and_list_pages_newest_first() {
        let (service, _, orders) = fixture().await;
        let mut ids = Vec::new();
        for amount in 1..=3 {
            let input = json!({ "amount": amount });
            ids.push(service.create(&orders, input.as_object().unwrap()).await.unwrap().id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let patch = json!({ "status": "shipped" });
        assert!(service.update(&orders, ids[0], patch.as_object().unwrap()).await.unwrap().is_some());
        let view = service.get(&orders, ids[0]).await.unwrap().unwrap();
        assert_eq!(view["status"], json!("shipped"));
        assert_eq!(view["amount"], json!(1));

        let page = service.list(&orders, Page { page: 1, limit: 2 }).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0]["amount"], json!(3));

        assert!(service.delete(&orders, ids[1]).await.unwrap());
        assert!(!service.delete(&orders, ids[1]).await.unwrap());
        assert!(service.update(&orders, ids[1], patch.as_object().unwrap()).await.unwrap().is_none());
    }
}
