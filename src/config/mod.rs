use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::database::models::tenant::ConnectionProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub tenancy: TenancyConfig,
    pub database: DatabaseConfig,
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

/// Tenant resolution and routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Request header carrying the tenant id. Blank disables the header strategy.
    pub header_name: String,
    /// Query parameter carrying the tenant id. Blank disables the parameter strategy.
    pub query_param: String,
    pub subdomain_enabled: bool,
    /// Reserved path prefix, `/tenant/` by default. `None` disables the path strategy.
    pub path_prefix: Option<String>,
    pub default_tenant: Option<String>,
    /// Path prefixes on which the default tenant may be applied.
    pub default_tenant_paths: Vec<String>,
    /// Tenant-agnostic path prefixes that bypass the pipeline entirely.
    pub excluded_paths: Vec<String>,
    /// Pre-build pools for every active tenant at startup.
    pub warm_pools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Profile behind the primary source and the tenant directory.
    pub default_profile: ConnectionProfile,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tenant resolution has no strategy enabled and no default tenant configured")]
    NoResolutionStrategy,

    #[error("invalid tenant header name: {0}")]
    InvalidHeaderName(String),

    #[error("default tenant id must not be blank")]
    BlankDefaultTenant,

    #[error("tenant path prefix must start and end with '/': {0}")]
    InvalidPathPrefix(String),
}

impl TenancyConfig {
    /// Startup check. Request-time resolution assumes a config that passed this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(default) = &self.default_tenant {
            if default.trim().is_empty() {
                return Err(ConfigError::BlankDefaultTenant);
            }
        }
        if !self.header_name.trim().is_empty()
            && axum::http::HeaderName::from_bytes(self.header_name.trim().as_bytes()).is_err()
        {
            return Err(ConfigError::InvalidHeaderName(self.header_name.clone()));
        }
        if let Some(prefix) = &self.path_prefix {
            if !prefix.starts_with('/') || !prefix.ends_with('/') || prefix.len() < 3 {
                return Err(ConfigError::InvalidPathPrefix(prefix.clone()));
            }
        }

        let any_strategy = !self.header_name.trim().is_empty()
            || !self.query_param.trim().is_empty()
            || self.subdomain_enabled
            || self.path_prefix.is_some()
            || self.default_tenant.is_some();
        if !any_strategy {
            return Err(ConfigError::NoResolutionStrategy);
        }
        Ok(())
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Tenant-ID".to_string(),
            query_param: "tenantId".to_string(),
            subdomain_enabled: true,
            path_prefix: Some("/tenant/".to_string()),
            default_tenant: None,
            default_tenant_paths: vec!["/".to_string()],
            excluded_paths: [
                "/api/master",
                "/health",
                "/metrics",
                "/docs",
                "/swagger-ui",
                "/static",
                "/error",
                "/favicon.ico",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            warm_pools: false,
        }
    }
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

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("SERVER_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANT_HEADER_NAME") {
            self.tenancy.header_name = v;
        }
        if let Ok(v) = env::var("TENANT_QUERY_PARAM") {
            self.tenancy.query_param = v;
        }
        if let Ok(v) = env::var("TENANT_SUBDOMAIN_ENABLED") {
            self.tenancy.subdomain_enabled = v.parse().unwrap_or(self.tenancy.subdomain_enabled);
        }
        if let Ok(v) = env::var("TENANT_PATH_PREFIX") {
            self.tenancy.path_prefix = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("TENANT_DEFAULT") {
            self.tenancy.default_tenant = Some(v);
        }
        if let Ok(v) = env::var("TENANT_DEFAULT_PATHS") {
            self.tenancy.default_tenant_paths = split_list(&v);
        }
        if let Ok(v) = env::var("TENANT_EXCLUDED_PATHS") {
            self.tenancy.excluded_paths = split_list(&v);
        }
        if let Ok(v) = env::var("TENANT_WARM_POOLS") {
            self.tenancy.warm_pools = v.parse().unwrap_or(self.tenancy.warm_pools);
        }

        // Database overrides
        let profile = &mut self.database.default_profile;
        if let Ok(v) = env::var("DATABASE_URL") {
            profile.url = v;
        }
        if let Ok(v) = env::var("DATABASE_USERNAME") {
            profile.username = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_PASSWORD") {
            profile.password = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_DRIVER") {
            profile.driver = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_POOL_SIZE") {
            profile.max_pool_size = v.parse().unwrap_or(profile.max_pool_size);
        }
        if let Ok(v) = env::var("DATABASE_MIN_IDLE") {
            profile.min_idle = v.parse().unwrap_or(profile.min_idle);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                profile.connect_timeout = Duration::from_secs(secs);
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            tenancy: TenancyConfig {
                default_tenant: Some("public".to_string()),
                ..TenancyConfig::default()
            },
            database: DatabaseConfig {
                default_profile: ConnectionProfile {
                    url: "postgres://localhost:5432/schoolbus_master".to_string(),
                    max_pool_size: 10,
                    min_idle: 1,
                    connect_timeout: Duration::from_secs(30),
                    ..ConnectionProfile::default()
                },
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            tenancy: TenancyConfig::default(),
            database: DatabaseConfig {
                default_profile: ConnectionProfile {
                    url: "postgres://localhost:5432/schoolbus_master".to_string(),
                    connect_timeout: Duration::from_secs(10),
                    ..ConnectionProfile::default()
                },
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            tenancy: TenancyConfig {
                warm_pools: true,
                ..TenancyConfig::default()
            },
            database: DatabaseConfig {
                default_profile: ConnectionProfile {
                    url: "postgres://localhost:5432/schoolbus_master".to_string(),
                    max_pool_size: 50,
                    connect_timeout: Duration::from_secs(5),
                    ..ConnectionProfile::default()
                },
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
