use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::tenancy::TenantId;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 20;
pub const DEFAULT_MIN_IDLE: u32 = 5;

/// Parameters for building one pooled connection source
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(serialize_with = "serialize_redacted")]
    pub url: String,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub driver: String,
    pub max_pool_size: u32,
    pub min_idle: u32,
    pub connect_timeout: Duration,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: None,
            password: None,
            driver: "postgres".to_string(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            min_idle: DEFAULT_MIN_IDLE,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("url", &redact_url(&self.url))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("driver", &self.driver)
            .field("max_pool_size", &self.max_pool_size)
            .field("min_idle", &self.min_idle)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Masks any password embedded in a connection URL.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        // Unparseable: drop any userinfo rather than risk echoing a password
        Err(_) => match (raw.find("://"), raw.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &raw[..scheme_end], &raw[at..])
            }
            _ => raw.to_string(),
        },
    }
}

fn serialize_redacted<S: serde::Serializer>(url: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_url(url))
}

/// Tenant as known to the central directory. Read-only to the routing core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRecord {
    pub tenant_id: TenantId,
    pub name: String,
    pub active: bool,
    pub connection: ConnectionProfile,
}

/// Row shape of the master `tenants` table
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub tenant_id: String,
    pub name: String,
    pub active: bool,
    pub db_url: String,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub driver: Option<String>,
    pub max_pool_size: Option<i32>,
    pub min_idle: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TenantRow {
    /// `None` when the stored id is blank.
    pub fn into_record(self) -> Option<TenantRecord> {
        let tenant_id = TenantId::parse(&self.tenant_id)?;
        let defaults = ConnectionProfile::default();
        Some(TenantRecord {
            tenant_id,
            name: self.name,
            active: self.active,
            connection: ConnectionProfile {
                url: self.db_url,
                username: self.db_username,
                password: self.db_password,
                driver: self.driver.unwrap_or(defaults.driver),
                max_pool_size: size_or(self.max_pool_size, DEFAULT_MAX_POOL_SIZE),
                min_idle: size_or(self.min_idle, DEFAULT_MIN_IDLE),
                connect_timeout: defaults.connect_timeout,
            },
        })
    }
}

// Stored sizing wins, zero included. Missing or negative values take the default.
fn size_or(value: Option<i32>, fallback: u32) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(fallback)
}
