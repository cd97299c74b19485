use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::database::models::tenant::{redact_url, ConnectionProfile};
use crate::database::registry::{RegistryError, SourceFactory};

/// Builds Postgres pools. Tenant pools are eager: construction fails fast when the
/// database is unreachable so the caller can reject the request instead of holding
/// a dead pool. The primary pool is the exception, see `create_primary`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgSourceFactory;

#[async_trait]
impl SourceFactory for PgSourceFactory {
    type Source = PgPool;

    async fn create(&self, profile: &ConnectionProfile) -> Result<PgPool, RegistryError> {
        let options = connect_options(profile)?;
        let pool = pool_options(profile).connect_with(options).await?;
        Ok(pool)
    }

    /// The master pool connects on first use, so the service can start (and
    /// report itself unhealthy) while the master database is down.
    async fn create_primary(&self, profile: &ConnectionProfile) -> Result<PgPool, RegistryError> {
        let options = connect_options(profile)?;
        Ok(pool_options(profile).connect_lazy_with(options))
    }

    async fn close(&self, source: &PgPool) {
        source.close().await;
    }

    async fn ping(&self, source: &PgPool) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1").execute(source).await?;
        Ok(())
    }
}

/// Pool sizing from a profile. A pool always allows at least one connection.
pub fn pool_options(profile: &ConnectionProfile) -> PgPoolOptions {
    let max = profile.max_pool_size.max(1);
    PgPoolOptions::new()
        .max_connections(max)
        .min_connections(profile.min_idle.min(max))
        .acquire_timeout(profile.connect_timeout)
}

/// Connect options for a profile, with explicit credentials overriding the URL's.
pub fn connect_options(profile: &ConnectionProfile) -> Result<PgConnectOptions, RegistryError> {
    match profile.driver.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => {}
        _ => return Err(RegistryError::UnsupportedDriver(profile.driver.clone())),
    }

    let mut options = PgConnectOptions::from_str(&profile.url)
        .map_err(|_| RegistryError::InvalidUrl(redact_url(&profile.url)))?;

    if let Some(username) = &profile.username {
        options = options.username(username);
    }
    if let Some(password) = &profile.password {
        options = options.password(password);
    }
    Ok(options)
}
