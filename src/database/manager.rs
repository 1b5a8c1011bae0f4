use async_trait::async_trait;
use bson::doc;
use mongodb::{options::ClientOptions, Client};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use super::mongo::MongoStore;
use super::store::DocumentStore;
use crate::config::DatabaseConfig;

/// Errors from the document stores and the connection manager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Tenant database is not configured")]
    NotConfigured,

    #[error("Invalid connection URI: {0}")]
    InvalidConnectionUri(String),

    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    #[error("Database unreachable: {0}")]
    Unreachable(String),

    #[error("Database operation timed out: {0}")]
    Timeout(&'static str),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Serialize(#[from] bson::ser::Error),

    #[error(transparent)]
    Deserialize(#[from] bson::de::Error),

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

impl DatabaseError {
    /// True when the failure is caused by the owner's own connection settings
    pub fn is_tenant_configuration(&self) -> bool {
        matches!(
            self,
            DatabaseError::NotConfigured
                | DatabaseError::InvalidConnectionUri(_)
                | DatabaseError::InvalidDatabaseName(_)
                | DatabaseError::Unreachable(_)
        )
    }
}

/// Routes dynamic operations to the physical database of an owner
#[async_trait]
pub trait TenantProvider: Send + Sync {
    async fn tenant_store(
        &self,
        connection_uri: &str,
        database_name: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError>;

    /// Resolve and ping, used when an owner saves new connection settings
    async fn test_connection(&self, connection_uri: &str, database_name: &str) -> Result<(), DatabaseError> {
        self.tenant_store(connection_uri, database_name).await?.ping().await
    }
}

/// Check the owner-supplied coordinates before any connection attempt
pub fn validate_tenant_target(connection_uri: &str, database_name: &str) -> Result<(), DatabaseError> {
    if connection_uri.trim().is_empty() || database_name.trim().is_empty() {
        return Err(DatabaseError::NotConfigured);
    }
    if !(connection_uri.starts_with("mongodb://") || connection_uri.starts_with("mongodb+srv://")) {
        return Err(DatabaseError::InvalidConnectionUri(
            "connection string must start with mongodb:// or mongodb+srv://".to_string(),
        ));
    }
    if !DatabaseManager::is_valid_db_name(database_name) {
        return Err(DatabaseError::InvalidDatabaseName(database_name.to_string()));
    }
    Ok(())
}

/// MongoDB client cache for the platform database and every tenant database
pub struct DatabaseManager {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    connect_timeout: Duration,
    operation_timeout: Duration,
}

impl DatabaseManager {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
        }
    }

    /// Connect the platform database and make sure its indexes exist
    pub async fn platform_store(&self, config: &DatabaseConfig) -> Result<MongoStore, DatabaseError> {
        if config.platform_uri.is_empty() {
            return Err(DatabaseError::ConfigMissing("MONGODB_URI"));
        }
        if !Self::is_valid_db_name(&config.platform_database) {
            return Err(DatabaseError::InvalidDatabaseName(config.platform_database.clone()));
        }

        let client = self.get_client(&config.platform_uri).await?;
        let store = MongoStore::new(client.database(&config.platform_database), self.operation_timeout);
        store.ensure_platform_indexes().await?;
        Ok(store)
    }

    /// Get a cached client or connect lazily. Keys are URI digests so
    /// credentials are never held as map keys.
    async fn get_client(&self, connection_uri: &str) -> Result<Client, DatabaseError> {
        let key = Self::cache_key(connection_uri);

        // Fast path: try read lock
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let mut options = ClientOptions::parse(connection_uri)
            .await
            .map_err(|e| DatabaseError::InvalidConnectionUri(e.to_string()))?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        options.app_name = Some("schemacraft-api".to_string());

        let client = Client::with_options(options)?;

        // Only reachable deployments are cached
        let admin = client.database("admin");
        let ping = admin.run_command(doc! { "ping": 1 }, None);
        match tokio::time::timeout(self.connect_timeout, ping).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(DatabaseError::Unreachable(e.to_string())),
            Err(_) => return Err(DatabaseError::Unreachable("connection attempt timed out".to_string())),
        }

        {
            let mut clients = self.clients.write().await;
            clients.entry(key.clone()).or_insert_with(|| client.clone());
        }

        info!("Created MongoDB client {}", &key[..12]);
        Ok(client)
    }

    fn cache_key(connection_uri: &str) -> String {
        hex::encode(Sha256::digest(connection_uri.as_bytes()))
    }

    /// MongoDB database names: 1..=63 chars, none of `/\. "$*<>:|?`
    pub fn is_valid_db_name(name: &str) -> bool {
        const FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?'];
        !name.is_empty() && name.len() <= 63 && !name.contains(FORBIDDEN)
    }
}

#[async_trait]
impl TenantProvider for DatabaseManager {
    async fn tenant_store(
        &self,
        connection_uri: &str,
        database_name: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        validate_tenant_target(connection_uri, database_name)?;
        let client = self.get_client(connection_uri).await?;
        Ok(Arc::new(MongoStore::new(client.database(database_name), self.operation_timeout)))
    }
}
