use async_trait::async_trait;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::{Notification, NotificationType, PlatformUser};
use crate::database::{DocumentStore, Repository};
use crate::observer::error::ObserverError;
use crate::observer::traits::{EventKind, Observer, ObserverEvent};
use crate::services::accounts::AccountService;

/// Counts API calls and raises quota notifications at the warning threshold and at the limit
pub struct UsageObserver {
    accounts: AccountService,
    notifications: Repository<Notification>,
    warning_threshold: i64,
}

impl UsageObserver {
    pub fn new(platform: Arc<dyn DocumentStore>, config: Arc<AppConfig>) -> Self {
        let warning_threshold = config.api.usage_warning_threshold;
        Self {
            accounts: AccountService::new(platform.clone(), config),
            notifications: Repository::new(platform),
            warning_threshold,
        }
    }

    fn quota_notification(&self, user: &PlatformUser) -> Option<Notification> {
        let usage = &user.api_usage;
        if usage.used_this_month == usage.monthly_quota {
            return Some(Notification::new(
                user.id,
                "API Quota Exceeded",
                format!(
                    "Hello {}, you have used all {} API calls for this month. Requests are blocked until the quota resets.",
                    user.name, usage.monthly_quota
                ),
                NotificationType::Error,
            ));
        }
        if usage.used_this_month == self.warning_threshold {
            let percentage = usage.used_this_month as f64 / usage.monthly_quota.max(1) as f64 * 100.0;
            return Some(Notification::new(
                user.id,
                "API Usage Warning",
                format!(
                    "Hello {}, you have made {} API calls this month ({:.1}% of your quota). {} calls remaining.",
                    user.name,
                    usage.used_this_month,
                    percentage,
                    usage.remaining()
                ),
                NotificationType::Warning,
            ));
        }
        None
    }
}

#[async_trait]
impl Observer for UsageObserver {
    fn name(&self) -> &'static str {
        "usage"
    }

    fn applies_to(&self, kind: EventKind) -> bool {
        kind == EventKind::ApiCall
    }

    async fn execute(&self, event: &ObserverEvent) -> Result<(), ObserverError> {
        let ObserverEvent::ApiCall { user_id, method, path } = event else {
            return Ok(());
        };

        let Some(user) = self.accounts.record_api_call(*user_id).await? else {
            return Ok(());
        };
        tracing::debug!("{} {} counted for {} ({} this month)", method, path, user_id, user.api_usage.used_this_month);

        if let Some(notification) = self.quota_notification(&user) {
            self.notifications.insert(&notification).await?;
        }
        Ok(())
    }
}
