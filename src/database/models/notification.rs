use bson::{oid::ObjectId, DateTime};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::database::repository::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "user_id")]
    pub owner_id: ObjectId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Entity for Notification {
    const COLLECTION: &'static str = "notifications";
}

impl Notification {
    pub fn new(
        owner_id: ObjectId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationType,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: ObjectId::new(),
            owner_id,
            title: title.into(),
            message: message.into(),
            kind,
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_view(&self) -> NotificationView {
        NotificationView {
            id: self.id.to_hex(),
            title: self.title.clone(),
            message: self.message.clone(),
            kind: self.kind,
            is_read: self.is_read,
            created_at: self.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    pub created_at: chrono::DateTime<Utc>,
}
