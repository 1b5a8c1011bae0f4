// Platform accounts: signup/signin, API keys, tenant connection, usage, feeds.

use bson::{doc, oid::ObjectId, DateTime};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{generate_jwt, generate_secret, hash_password, verify_against_decoy, verify_password, Claims, JwtError};
use crate::config::AppConfig;
use crate::database::models::{next_month_start, Activity, ApiUsage, Notification, PlatformUser};
use crate::database::{DatabaseError, DocumentStore, FindOptions, Repository};
use crate::types::Page;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum PlatformAuthError {
    #[error("Name, email and password are required")]
    MissingFields,

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Deactivated,

    #[error("User not found")]
    NotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Repository<PlatformUser>,
    activities: Repository<Activity>,
    notifications: Repository<Notification>,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(platform: Arc<dyn DocumentStore>, config: Arc<AppConfig>) -> Self {
        Self {
            users: Repository::new(platform.clone()),
            activities: Repository::new(platform.clone()),
            notifications: Repository::new(platform),
            config,
        }
    }

    fn issue_token(&self, user: &PlatformUser) -> Result<String, PlatformAuthError> {
        let claims = Claims::new(user, self.config.security.jwt_expiry_hours);
        Ok(generate_jwt(&claims, &self.config.security)?)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<(PlatformUser, String), PlatformAuthError> {
        let email = request.email.trim().to_lowercase();
        if request.name.trim().is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(PlatformAuthError::MissingFields);
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(PlatformAuthError::WeakPassword);
        }
        if self.users.select_one(doc! { "email": &email }).await?.is_some() {
            return Err(PlatformAuthError::AlreadyExists);
        }

        let is_admin = self.config.security.admin_emails.iter().any(|admin| admin.eq_ignore_ascii_case(&email));
        let now = DateTime::now();
        let user = PlatformUser {
            id: ObjectId::new(),
            name: request.name.trim().to_string(),
            email,
            password: hash_password(&request.password, self.config.security.bcrypt_cost)?,
            api_key: generate_secret(),
            mongodb_uri: None,
            database_name: None,
            is_admin,
            is_active: true,
            api_usage: ApiUsage::new(self.config.api.default_monthly_quota, Utc::now()),
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&user).await?;
        tracing::info!("Registered platform account {}", user.id);

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    pub async fn signin(&self, request: &SigninRequest) -> Result<(PlatformUser, String), PlatformAuthError> {
        let email = request.email.trim().to_lowercase();
        let Some(mut user) = self.users.select_one(doc! { "email": &email }).await? else {
            verify_against_decoy(&request.password, self.config.security.bcrypt_cost);
            return Err(PlatformAuthError::InvalidCredentials);
        };

        if !verify_password(&request.password, &user.password) {
            return Err(PlatformAuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(PlatformAuthError::Deactivated);
        }

        let now = DateTime::now();
        self.users
            .update_one(doc! { "_id": user.id }, doc! { "$set": { "last_login": now } })
            .await?;
        user.last_login = Some(now);

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    pub async fn find(&self, id: ObjectId) -> Result<PlatformUser, PlatformAuthError> {
        self.users
            .select_one(doc! { "_id": id })
            .await?
            .ok_or(PlatformAuthError::NotFound)
    }

    /// Active account owning `api_key`, with its quota window rolled forward if due
    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Option<PlatformUser>, DatabaseError> {
        // Revoked keys are stored empty
        if api_key.is_empty() {
            return Ok(None);
        }
        let Some(mut user) = self.users.select_one(doc! { "api_key": api_key, "is_active": true }).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if user.api_usage.needs_reset(now) {
            let reset_at = DateTime::from_chrono(next_month_start(now));
            self.users
                .update_one(
                    doc! { "_id": user.id },
                    doc! { "$set": { "api_usage.used_this_month": 0_i64, "api_usage.quota_reset_at": reset_at } },
                )
                .await?;
            user.api_usage.used_this_month = 0;
            user.api_usage.quota_reset_at = Some(reset_at);
        }
        Ok(Some(user))
    }

    pub async fn set_connection(&self, id: ObjectId, uri: &str, database: &str) -> Result<(), PlatformAuthError> {
        let outcome = self
            .users
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "mongodb_uri": uri, "database_name": database, "updated_at": DateTime::now() } },
            )
            .await?;
        if outcome.matched == 0 {
            return Err(PlatformAuthError::NotFound);
        }
        Ok(())
    }

    pub async fn regenerate_api_key(&self, id: ObjectId) -> Result<String, PlatformAuthError> {
        let api_key = generate_secret();
        let outcome = self
            .users
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "api_key": &api_key, "updated_at": DateTime::now() } },
            )
            .await?;
        if outcome.matched == 0 {
            return Err(PlatformAuthError::NotFound);
        }
        Ok(api_key)
    }

    /// Count one API call. Returns the account as it stands after the increment.
    pub async fn record_api_call(&self, id: ObjectId) -> Result<Option<PlatformUser>, DatabaseError> {
        self.users
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": { "api_usage.total_requests": 1_i64, "api_usage.used_this_month": 1_i64 },
                    "$set": { "api_usage.last_request": DateTime::now() },
                },
            )
            .await?;
        self.users.select_one(doc! { "_id": id }).await
    }

    pub async fn activities(&self, owner_id: ObjectId, page: Page) -> Result<(Vec<Activity>, u64), DatabaseError> {
        let filter = doc! { "user_id": owner_id };
        let total = self.activities.count(filter.clone()).await?;
        let items = self
            .activities
            .select_any(filter, FindOptions::sorted(doc! { "created_at": -1, "_id": -1 }).window(page.skip(), page.limit))
            .await?;
        Ok((items, total))
    }

    pub async fn notifications(&self, owner_id: ObjectId, page: Page) -> Result<(Vec<Notification>, u64), DatabaseError> {
        let filter = doc! { "user_id": owner_id };
        let total = self.notifications.count(filter.clone()).await?;
        let items = self
            .notifications
            .select_any(filter, FindOptions::sorted(doc! { "created_at": -1, "_id": -1 }).window(page.skip(), page.limit))
            .await?;
        Ok((items, total))
    }

    pub async fn recent_activities(&self, owner_id: ObjectId, limit: u64) -> Result<Vec<Activity>, DatabaseError> {
        self.activities
            .select_any(
                doc! { "user_id": owner_id },
                FindOptions::sorted(doc! { "created_at": -1, "_id": -1 }).window(0, limit),
            )
            .await
    }

    pub async fn record_activity(&self, activity: &Activity) -> Result<(), DatabaseError> {
        self.activities.insert(activity).await
    }

    pub async fn unread_count(&self, owner_id: ObjectId) -> Result<u64, DatabaseError> {
        self.notifications.count(doc! { "user_id": owner_id, "is_read": false }).await
    }

    /// Returns how many notifications changed
    pub async fn mark_all_notifications_read(&self, owner_id: ObjectId) -> Result<u64, DatabaseError> {
        let outcome = self
            .notifications
            .update_many(
                doc! { "user_id": owner_id, "is_read": false },
                doc! { "$set": { "is_read": true, "updated_at": DateTime::now() } },
            )
            .await?;
        Ok(outcome.modified)
    }

    pub async fn delete_notification(&self, owner_id: ObjectId, id: ObjectId) -> Result<(), PlatformAuthError> {
        let removed = self.notifications.delete_one(doc! { "_id": id, "user_id": owner_id }).await?;
        if removed == 0 {
            return Err(PlatformAuthError::NotificationNotFound);
        }
        Ok(())
    }

    pub async fn mark_notification_read(&self, owner_id: ObjectId, id: ObjectId) -> Result<(), PlatformAuthError> {
        let outcome = self
            .notifications
            .update_one(
                doc! { "_id": id, "user_id": owner_id },
                doc! { "$set": { "is_read": true, "updated_at": DateTime::now() } },
            )
            .await?;
        if outcome.matched == 0 {
            return Err(PlatformAuthError::NotificationNotFound);
        }
        Ok(())
    }

    // Administration

    pub async fn list_users(&self, page: Page) -> Result<(Vec<PlatformUser>, u64), DatabaseError> {
        let total = self.users.count(doc! {}).await?;
        let users = self
            .users
            .select_any(doc! {}, FindOptions::sorted(doc! { "created_at": -1, "_id": -1 }).window(page.skip(), page.limit))
            .await?;
        Ok((users, total))
    }

    /// A deactivated account can neither sign in nor use its API key
    pub async fn set_active(&self, id: ObjectId, active: bool) -> Result<(), PlatformAuthError> {
        self.update_user(id, doc! { "is_active": active }).await
    }

    /// Clears the key; the owner can issue a new one with `regenerate_api_key`
    pub async fn revoke_api_key(&self, id: ObjectId) -> Result<(), PlatformAuthError> {
        self.update_user(id, doc! { "api_key": "" }).await
    }

    pub async fn reset_quota(&self, id: ObjectId) -> Result<(), PlatformAuthError> {
        self.update_user(id, doc! { "api_usage.used_this_month": 0_i64 }).await
    }

    async fn update_user(&self, id: ObjectId, mut fields: bson::Document) -> Result<(), PlatformAuthError> {
        fields.insert("updated_at", DateTime::now());
        let outcome = self.users.update_one(doc! { "_id": id }, doc! { "$set": fields }).await?;
        if outcome.matched == 0 {
            return Err(PlatformAuthError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NotificationType;
    use crate::database::MemoryStore;

    fn service() -> AccountService {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        AccountService::new(Arc::new(MemoryStore::new()), Arc::new(config))
    }

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest { name: "Ada".into(), email: email.into(), password: "correct horse".into() }
    }

    #[tokio::test]
    async fn test_signup_then_signin() {
        let service = service();
        let (user, token) = service.signup(&signup_request("Ada@Example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.api_key.len(), 64);
        assert_eq!(user.api_usage.monthly_quota, 1000);
        assert!(!token.is_empty());

        assert!(matches!(
            service.signup(&signup_request("ada@example.com")).await,
            Err(PlatformAuthError::AlreadyExists)
        ));

        let signin = SigninRequest { email: "ada@example.com".into(), password: "correct horse".into() };
        let (user, _) = service.signin(&signin).await.unwrap();
        assert!(user.last_login.is_some());

        let wrong = SigninRequest { email: "ada@example.com".into(), password: "nope".into() };
        assert!(matches!(service.signin(&wrong).await, Err(PlatformAuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_api_key_lookup_and_usage() {
        let service = service();
        let (user, _) = service.signup(&signup_request("b@example.com")).await.unwrap();

        let found = service.find_by_api_key(&user.api_key).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(service.find_by_api_key("unknown").await.unwrap().is_none());

        service.record_api_call(user.id).await.unwrap();
        let usage = service.record_api_call(user.id).await.unwrap().unwrap().api_usage;
        assert_eq!(usage.used_this_month, 2);
        assert_eq!(usage.total_requests, 2);
        assert!(usage.last_request.is_some());

        let key = service.regenerate_api_key(user.id).await.unwrap();
        assert!(service.find_by_api_key(&user.api_key).await.unwrap().is_none());
        assert!(service.find_by_api_key(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_admin_controls() {
        let service = service();
        let (user, _) = service.signup(&signup_request("c@example.com")).await.unwrap();
        assert!(!user.is_admin);

        service.record_api_call(user.id).await.unwrap();
        service.reset_quota(user.id).await.unwrap();
        assert_eq!(service.find(user.id).await.unwrap().api_usage.used_this_month, 0);

        service.revoke_api_key(user.id).await.unwrap();
        assert!(service.find_by_api_key(&user.api_key).await.unwrap().is_none());
        assert!(service.find_by_api_key("").await.unwrap().is_none());

        service.set_active(user.id, false).await.unwrap();
        let signin = SigninRequest { email: "c@example.com".into(), password: "correct horse".into() };
        assert!(matches!(service.signin(&signin).await, Err(PlatformAuthError::Deactivated)));

        assert!(matches!(service.set_active(ObjectId::new(), true).await, Err(PlatformAuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_listed_admin_email_is_admin() {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        config.security.admin_emails = vec!["root@example.com".into()];
        let service = AccountService::new(Arc::new(MemoryStore::new()), Arc::new(config));

        let (user, _) = service.signup(&signup_request("Root@Example.com")).await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_notification_housekeeping() {
        let service = service();
        let owner = ObjectId::new();
        let first = Notification::new(owner, "One", "first", NotificationType::Info);
        let second = Notification::new(owner, "Two", "second", NotificationType::Info);
        service.notifications.insert(&first).await.unwrap();
        service.notifications.insert(&second).await.unwrap();
        assert_eq!(service.unread_count(owner).await.unwrap(), 2);

        service.delete_notification(owner, first.id).await.unwrap();
        assert!(matches!(
            service.delete_notification(ObjectId::new(), second.id).await,
            Err(PlatformAuthError::NotificationNotFound)
        ));

        assert_eq!(service.mark_all_notifications_read(owner).await.unwrap(), 1);
        assert_eq!(service.unread_count(owner).await.unwrap(), 0);
    }
}
