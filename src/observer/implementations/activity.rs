use async_trait::async_trait;
use std::sync::Arc;

use crate::database::models::Activity;
use crate::database::{DocumentStore, Repository};
use crate::observer::error::ObserverError;
use crate::observer::traits::{EventKind, Observer, ObserverEvent};

pub struct ActivityObserver {
    activities: Repository<Activity>,
}

impl ActivityObserver {
    pub fn new(platform: Arc<dyn DocumentStore>) -> Self {
        Self { activities: Repository::new(platform) }
    }
}

#[async_trait]
impl Observer for ActivityObserver {
    fn name(&self) -> &'static str {
        "activity"
    }

    fn applies_to(&self, kind: EventKind) -> bool {
        kind == EventKind::Activity
    }

    async fn execute(&self, event: &ObserverEvent) -> Result<(), ObserverError> {
        if let ObserverEvent::Activity(activity) = event {
            self.activities.insert(activity).await?;
        }
        Ok(())
    }
}
