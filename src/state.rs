use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::PlatformUser;
use crate::database::{DatabaseError, DocumentStore, MemoryStore, MemoryTenants, TenantProvider};
use crate::observer::ObserverDispatcher;
use crate::services::accounts::AccountService;
use crate::services::schema_service::SchemaService;
use crate::types::{Page, PageQuery};

/// Shared handles cloned into every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Platform users, schemas, activities and notifications
    pub platform: Arc<dyn DocumentStore>,
    pub tenants: Arc<dyn TenantProvider>,
    pub observers: ObserverDispatcher,
}

impl AppState {
    /// Spawns the observer worker, so this must run inside a tokio runtime
    pub fn new(config: Arc<AppConfig>, platform: Arc<dyn DocumentStore>, tenants: Arc<dyn TenantProvider>) -> Self {
        let observers = ObserverDispatcher::for_platform(platform.clone(), config.clone());
        Self { config, platform, tenants, observers }
    }

    /// Everything in process memory. Used by tests and `--in-memory`.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(config), Arc::new(MemoryStore::new()), Arc::new(MemoryTenants::new()))
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.platform.clone(), self.config.clone())
    }

    pub fn schemas(&self) -> SchemaService {
        SchemaService::new(self.platform.clone())
    }

    /// The owner's tenant database
    pub async fn tenant_store(&self, owner: &PlatformUser) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        let (uri, database) = owner.tenant_target().ok_or(DatabaseError::NotConfigured)?;
        self.tenants.tenant_store(uri, database).await
    }

    pub fn page(&self, query: PageQuery) -> Page {
        Page::resolve(query, self.config.api.default_page_size, self.config.api.max_page_size)
    }
}
