use bson::{oid::ObjectId, DateTime};
use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::database::repository::Entity;

/// Monthly request accounting for one platform account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub total_requests: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<DateTime>,
    pub monthly_quota: i64,
    #[serde(default)]
    pub used_this_month: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_reset_at: Option<DateTime>,
}

impl ApiUsage {
    pub fn new(monthly_quota: i64, now: chrono::DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            last_request: None,
            monthly_quota,
            used_this_month: 0,
            quota_reset_at: Some(DateTime::from_chrono(next_month_start(now))),
        }
    }

    pub fn needs_reset(&self, now: chrono::DateTime<Utc>) -> bool {
        self.quota_reset_at.map_or(true, |reset| now >= reset.to_chrono())
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_this_month >= self.monthly_quota
    }

    pub fn remaining(&self) -> i64 {
        (self.monthly_quota - self.used_this_month).max(0)
    }
}

/// First instant of the month after `now`
pub fn next_month_start(now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().unwrap_or(now)
}

fn default_true() -> bool {
    true
}

/// Platform account: owns schemas, an API key and a tenant database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongodb_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub api_usage: ApiUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Entity for PlatformUser {
    const COLLECTION: &'static str = "users";
}

impl PlatformUser {
    /// Connection coordinates of the owner's database, when both are set
    pub fn tenant_target(&self) -> Option<(&str, &str)> {
        let uri = self.mongodb_uri.as_deref().filter(|s| !s.is_empty())?;
        let database = self.database_name.as_deref().filter(|s| !s.is_empty())?;
        Some((uri, database))
    }

    pub fn to_view(&self) -> PlatformUserView {
        PlatformUserView {
            id: self.id.to_hex(),
            name: self.name.clone(),
            email: self.email.clone(),
            api_key: self.api_key.clone(),
            mongodb_configured: self.tenant_target().is_some(),
            database_name: self.database_name.clone(),
            is_admin: self.is_admin,
            is_active: self.is_active,
            api_usage: ApiUsageView::from(&self.api_usage),
            last_login: self.last_login.map(|d| d.to_chrono()),
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub api_key: String,
    pub mongodb_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub api_usage: ApiUsageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiUsageView {
    pub total_requests: i64,
    pub used_this_month: i64,
    pub monthly_quota: i64,
    pub remaining: i64,
    pub quota_reset_at: Option<chrono::DateTime<Utc>>,
    pub last_request: Option<chrono::DateTime<Utc>>,
}

impl From<&ApiUsage> for ApiUsageView {
    fn from(usage: &ApiUsage) -> Self {
        Self {
            total_requests: usage.total_requests,
            used_this_month: usage.used_this_month,
            monthly_quota: usage.monthly_quota,
            remaining: usage.remaining(),
            quota_reset_at: usage.quota_reset_at.map(|d| d.to_chrono()),
            last_request: usage.last_request.map(|d| d.to_chrono()),
        }
    }
}
