use async_trait::async_trait;
use bson::oid::ObjectId;
use std::time::Duration;

use crate::database::models::{Activity, Notification};
use crate::observer::error::ObserverError;

/// Side effects produced by request handling
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// One authenticated call on the dynamic API
    ApiCall { user_id: ObjectId, method: String, path: String },
    Activity(Activity),
    Notification(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ApiCall,
    Activity,
    Notification,
}

impl ObserverEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ObserverEvent::ApiCall { .. } => EventKind::ApiCall,
            ObserverEvent::Activity(_) => EventKind::Activity,
            ObserverEvent::Notification(_) => EventKind::Notification,
        }
    }
}

#[async_trait]
pub trait Observer: Send + Sync {
    /// Observer name for logging
    fn name(&self) -> &'static str;

    fn applies_to(&self, kind: EventKind) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn execute(&self, event: &ObserverEvent) -> Result<(), ObserverError>;
}
