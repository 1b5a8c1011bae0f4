use bson::{oid::ObjectId, DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::convert::document_to_json;
use crate::database::repository::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Create,
    Update,
    Delete,
    Api,
    Auth,
    Connect,
    Security,
    Login,
    Logout,
}

/// Audit trail entry for a platform account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "user_id")]
    pub owner_id: ObjectId,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,
    pub created_at: DateTime,
}

impl Entity for Activity {
    const COLLECTION: &'static str = "activities";
}

impl Activity {
    pub fn new(owner_id: ObjectId, activity_type: ActivityType, action: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            owner_id,
            activity_type,
            action: action.into(),
            description: None,
            resource: None,
            resource_id: None,
            user_agent: None,
            metadata: None,
            created_at: DateTime::now(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn on(mut self, resource: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Document) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn to_view(&self) -> ActivityView {
        ActivityView {
            id: self.id.to_hex(),
            activity_type: self.activity_type,
            action: self.action.clone(),
            description: self.description.clone(),
            resource: self.resource.clone(),
            resource_id: self.resource_id.clone(),
            user_agent: self.user_agent.clone(),
            metadata: self.metadata.as_ref().map(document_to_json),
            created_at: self.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: chrono::DateTime<Utc>,
}
