use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string of the platform database (accounts, schemas, activity)
    pub platform_uri: String,
    pub platform_database: String,
    pub connect_timeout_secs: u64,
    /// Deadline applied to every individual store operation
    pub operation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_monthly_quota: i64,
    pub usage_warning_threshold: i64,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub require_https: bool,
    /// Signing key for platform account tokens
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    /// Accounts registered with one of these emails get admin rights
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

/// Overwrite `slot` when `key` is set and parses; malformed values keep the preset.
fn parse_into<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring malformed {}={}", key, raw),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty()).map(String::from).collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        let server = &mut self.server;
        if let Ok(host) = env::var("SERVER_HOST") {
            server.host = host;
        }
        parse_into("PORT", &mut server.port);

        let database = &mut self.database;
        if let Ok(uri) = env::var("MONGODB_URI") {
            database.platform_uri = uri;
        }
        if let Ok(name) = env::var("MONGODB_DATABASE") {
            database.platform_database = name;
        }
        parse_into("DATABASE_CONNECT_TIMEOUT_SECS", &mut database.connect_timeout_secs);
        parse_into("DATABASE_OPERATION_TIMEOUT_SECS", &mut database.operation_timeout_secs);

        let api = &mut self.api;
        parse_into("API_DEFAULT_MONTHLY_QUOTA", &mut api.default_monthly_quota);
        parse_into("API_USAGE_WARNING_THRESHOLD", &mut api.usage_warning_threshold);
        parse_into("API_DEFAULT_PAGE_SIZE", &mut api.default_page_size);
        parse_into("API_MAX_PAGE_SIZE", &mut api.max_page_size);
        parse_into("API_MAX_REQUEST_SIZE_BYTES", &mut api.max_request_size_bytes);

        let security = &mut self.security;
        if let Ok(secret) = env::var("JWT_SECRET") {
            security.jwt_secret = secret;
        }
        if let Ok(origins) = env::var("SECURITY_CORS_ORIGINS") {
            security.cors_origins = split_list(&origins);
        }
        if let Ok(emails) = env::var("ADMIN_EMAILS") {
            security.admin_emails = split_list(&emails.to_lowercase());
        }
        parse_into("SECURITY_ENABLE_CORS", &mut security.enable_cors);
        parse_into("SECURITY_REQUIRE_HTTPS", &mut security.require_https);
        parse_into("SECURITY_JWT_EXPIRY_HOURS", &mut security.jwt_expiry_hours);
        parse_into("SECURITY_BCRYPT_COST", &mut security.bcrypt_cost);

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                platform_uri: "mongodb://localhost:27017".to_string(),
                platform_database: "schemacraft".to_string(),
                connect_timeout_secs: 10,
                operation_timeout_secs: 10,
            },
            api: ApiConfig {
                default_monthly_quota: 1000,
                usage_warning_threshold: 500,
                default_page_size: 10,
                max_page_size: 100,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                require_https: false,
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 10,
                admin_emails: Vec::new(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                platform_uri: "mongodb://localhost:27017".to_string(),
                platform_database: "schemacraft_staging".to_string(),
                connect_timeout_secs: 10,
                operation_timeout_secs: 10,
            },
            api: ApiConfig {
                default_monthly_quota: 1000,
                usage_warning_threshold: 500,
                default_page_size: 10,
                max_page_size: 100,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: bcrypt::DEFAULT_COST,
                admin_emails: Vec::new(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                platform_uri: "mongodb://localhost:27017".to_string(),
                platform_database: "schemacraft".to_string(),
                connect_timeout_secs: 5,
                operation_timeout_secs: 10,
            },
            api: ApiConfig {
                default_monthly_quota: 1000,
                usage_warning_threshold: 500,
                default_page_size: 10,
                max_page_size: 100,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: bcrypt::DEFAULT_COST,
                admin_emails: Vec::new(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
