// Relation resolver
//
// Turns a schema's relation fields into a population plan. Each relation is
// a one-to-one $lookup + $unwind against the target's physical collection.
// Cardinality is not declared on fields, so a target matching several
// documents collapses to the first one.

use bson::{doc, oid::ObjectId, Document};
use std::sync::Arc;

use crate::database::models::{Schema, SchemaField};
use crate::database::{DatabaseError, DocumentStore, Repository};
use crate::services::shaper::{Reference, ShapeError};
use crate::types::Page;

/// How documents in a relation target collection are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    /// DynamicData: fields under `data`, scoped by `user_id`
    Wrapped,
    /// Auth user record: fields at the top level, not owner-scoped
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationTarget {
    /// Physical collection the lookup runs against
    pub collection: String,
    pub shape: StorageShape,
    /// Target fields never copied into a populated value
    pub hidden_fields: Vec<String>,
}

impl RelationTarget {
    pub fn for_schema(schema: &Schema) -> Self {
        let mut hidden_fields: Vec<String> = schema
            .fields
            .iter()
            .filter(|f| !f.is_public())
            .map(|f| f.name.clone())
            .collect();

        match schema.auth() {
            Some(auth) => {
                hidden_fields.push(auth.password_field.clone());
                Self {
                    collection: auth.user_collection.clone(),
                    shape: StorageShape::Flat,
                    hidden_fields,
                }
            }
            None => Self {
                collection: schema.collection_name.clone(),
                shape: StorageShape::Wrapped,
                hidden_fields,
            },
        }
    }

    /// A target whose schema is gone is read as a plain collection
    pub fn plain(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            shape: StorageShape::Wrapped,
            hidden_fields: Vec::new(),
        }
    }

    pub fn existence_filter(&self, owner_id: ObjectId, id: ObjectId) -> Document {
        match self.shape {
            StorageShape::Wrapped => doc! { "_id": id, "user_id": owner_id },
            StorageShape::Flat => doc! { "_id": id },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationLookup {
    pub field: String,
    pub target: RelationTarget,
}

impl RelationLookup {
    /// Aggregate row key holding the populated document
    pub fn populated_key(&self) -> String {
        format!("populated_{}", self.field)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationPlan {
    pub lookups: Vec<RelationLookup>,
}

impl PopulationPlan {
    pub fn lookup(&self, field: &str) -> Option<&RelationLookup> {
        self.lookups.iter().find(|l| l.field == field)
    }

    /// `$match` followed by one lookup + unwind per relation
    pub fn pipeline(&self, match_filter: Document) -> Vec<Document> {
        self.pipeline_after(vec![doc! { "$match": match_filter }])
    }

    /// Newest first, windowed before any lookup runs
    pub fn paged_pipeline(&self, match_filter: Document, page: Page) -> Vec<Document> {
        let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);
        self.pipeline_after(vec![
            doc! { "$match": match_filter },
            doc! { "$sort": { "created_at": -1, "_id": -1 } },
            doc! { "$skip": page.offset() },
            doc! { "$limit": limit },
        ])
    }

    fn pipeline_after(&self, mut pipeline: Vec<Document>) -> Vec<Document> {
        for lookup in &self.lookups {
            let populated = lookup.populated_key();
            pipeline.push(doc! {
                "$lookup": {
                    "from": lookup.target.collection.clone(),
                    "localField": format!("data.{}", lookup.field),
                    "foreignField": "_id",
                    "as": populated.clone(),
                }
            });
            pipeline.push(doc! {
                "$unwind": {
                    "path": format!("${}", populated),
                    "preserveNullAndEmptyArrays": true,
                }
            });
        }
        pipeline
    }
}

/// Resolves relation targets of one owner's schemas
#[derive(Clone)]
pub struct RelationResolver {
    schemas: Repository<Schema>,
    owner_id: ObjectId,
}

impl RelationResolver {
    pub fn new(platform: Arc<dyn DocumentStore>, owner_id: ObjectId) -> Self {
        Self {
            schemas: Repository::new(platform),
            owner_id,
        }
    }

    pub async fn resolve_target(&self, target: &str) -> Result<RelationTarget, DatabaseError> {
        let schema = self
            .schemas
            .select_one(doc! { "user_id": self.owner_id, "collection_name": target, "is_active": true })
            .await?;
        Ok(match schema {
            Some(schema) => RelationTarget::for_schema(&schema),
            None => RelationTarget::plain(target),
        })
    }

    pub async fn build_population_plan(&self, schema: &Schema) -> Result<PopulationPlan, DatabaseError> {
        let mut plan = PopulationPlan::default();
        for field in schema.relation_fields() {
            let Some(target) = field.target.as_deref() else {
                continue;
            };
            plan.lookups.push(RelationLookup {
                field: field.name.clone(),
                target: self.resolve_target(target).await?,
            });
        }
        Ok(plan)
    }

    pub async fn build_population_pipeline(
        &self,
        schema: &Schema,
        match_filter: Document,
    ) -> Result<(PopulationPlan, Vec<Document>), DatabaseError> {
        let plan = self.build_population_plan(schema).await?;
        let pipeline = plan.pipeline(match_filter);
        Ok((plan, pipeline))
    }

    pub async fn resolve_existence(
        &self,
        tenant: &dyn DocumentStore,
        field: &SchemaField,
        referenced: ObjectId,
    ) -> Result<bool, DatabaseError> {
        let Some(target) = field.target.as_deref() else {
            return Ok(false);
        };
        let target = self.resolve_target(target).await?;
        let found = tenant
            .find_one(&target.collection, target.existence_filter(self.owner_id, referenced))
            .await?;
        Ok(found.is_some())
    }

    /// Fails on the first reference that does not resolve
    pub async fn verify_references(
        &self,
        tenant: &dyn DocumentStore,
        schema: &Schema,
        references: &[Reference],
    ) -> Result<(), ShapeError> {
        for reference in references {
            let Some(field) = schema.field(&reference.field) else {
                continue;
            };
            if !self.resolve_existence(tenant, field, reference.id).await? {
                return Err(ShapeError::DanglingReference(reference.field.clone()));
            }
        }
        Ok(())
    }
}
