use async_trait::async_trait;
use std::sync::Arc;

use crate::database::models::Notification;
use crate::database::{DocumentStore, Repository};
use crate::observer::error::ObserverError;
use crate::observer::traits::{EventKind, Observer, ObserverEvent};

pub struct NotificationObserver {
    notifications: Repository<Notification>,
}

impl NotificationObserver {
    pub fn new(platform: Arc<dyn DocumentStore>) -> Self {
        Self { notifications: Repository::new(platform) }
    }
}

#[async_trait]
impl Observer for NotificationObserver {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn applies_to(&self, kind: EventKind) -> bool {
        kind == EventKind::Notification
    }

    async fn execute(&self, event: &ObserverEvent) -> Result<(), ObserverError> {
        if let ObserverEvent::Notification(notification) = event {
            self.notifications.insert(notification).await?;
        }
        Ok(())
    }
}
